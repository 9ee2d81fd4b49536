use crate::error::{Result, VideoError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 标记文件，只有带此标记（或已有分镜文件、或为空）的目录才允许清空
const MARKER: &str = ".dark-studio";

/// 会话临时目录，集中管理所有中间文件的命名
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// 打开工作目录；`resume` 为 false 时先清空再重建
    pub async fn prepare(root: impl Into<PathBuf>, resume: bool) -> Result<Self> {
        let root = root.into();

        let existed = exists(&root).await;
        let owned = !existed || is_session_dir(&root).await?;
        if !resume && existed {
            if !owned {
                return Err(VideoError::InvalidArgument(format!(
                    "{} is not empty and was not created by dark-studio, refusing to purge it",
                    root.display()
                )));
            }
            info!("Purging previous session in {}", root.display());
            tokio::fs::remove_dir_all(&root).await?;
        }
        tokio::fs::create_dir_all(&root).await?;
        if owned {
            tokio::fs::write(root.join(MARKER), b"").await?;
        } else {
            warn!("Resuming in {} without a session marker", root.display());
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn storyboard(&self) -> PathBuf {
        self.root.join("storyboard.json")
    }

    /// 第 `index` 个分镜的图片（文件名从 01 开始编号）
    pub fn scene_image(&self, index: usize) -> PathBuf {
        self.root.join(format!("scene_{:02}.jpg", index + 1))
    }

    pub fn scene_voice(&self, index: usize) -> PathBuf {
        self.root.join(format!("voice_{:02}.mp3", index + 1))
    }

    pub fn segment(&self, index: usize) -> PathBuf {
        self.root.join(format!("segment_{:02}.mp4", index + 1))
    }

    pub fn caption(&self, index: usize) -> PathBuf {
        self.root.join(format!("caption_{:02}.txt", index + 1))
    }

    pub fn frame(&self, index: usize) -> PathBuf {
        self.root.join(format!("frame_{:02}.png", index + 1))
    }

    pub fn narration(&self) -> PathBuf {
        self.root.join("narration.mp3")
    }

    pub fn music(&self) -> PathBuf {
        self.root.join("music.mp3")
    }

    pub fn final_video(&self) -> PathBuf {
        self.root.join("final.mp4")
    }
}

pub async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

async fn is_session_dir(root: &Path) -> Result<bool> {
    if exists(&root.join(MARKER)).await || exists(&root.join("storyboard.json")).await {
        return Ok(true);
    }
    let mut entries = tokio::fs::read_dir(root).await?;
    Ok(entries.next_entry().await?.is_none())
}

fn is_inside(root: &Path, path: &Path) -> bool {
    match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

/// 用户输入文件；位于待清空的工作目录内时先读入内存，重建目录后再写回
#[derive(Debug)]
pub struct HeldInput {
    path: PathBuf,
    bytes: Option<Vec<u8>>,
}

impl HeldInput {
    pub async fn hold(work_dir: &Path, resume: bool, path: PathBuf) -> Result<Self> {
        let bytes = if !resume && is_inside(work_dir, &path) {
            info!("Holding {} across the workspace purge", path.display());
            Some(tokio::fs::read(&path).await?)
        } else {
            None
        };
        Ok(Self { path, bytes })
    }

    /// 写回工作目录，文件名为 `name` 加原扩展名；未暂存时返回原路径
    pub async fn restore(self, workspace: &Workspace, name: &str) -> Result<PathBuf> {
        let Some(bytes) = self.bytes else {
            return Ok(self.path);
        };
        let file_name = match self.path.extension() {
            Some(ext) => format!("{}.{}", name, ext.to_string_lossy()),
            None => name.to_string(),
        };
        let restored = workspace.root().join(file_name);
        tokio::fs::write(&restored, bytes).await?;
        Ok(restored)
    }
}
