pub mod pacing;
pub mod script;

use crate::config::Format;
use crate::error::{Result, VideoError};
use pacing::Pacing;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// 表示一个场景/分镜
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 场景序号（从 0 开始）
    pub index: usize,
    /// 用于获取图片的画面描述
    pub visual_prompt: String,
    /// 对应的旁白文本
    pub voiceover_text: String,
    /// 图片路径
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    /// 该场景的时长（秒），渲染前为 0
    #[serde(default)]
    pub duration: f64,
}

impl Scene {
    pub fn new(index: usize, visual_prompt: String, voiceover_text: String) -> Self {
        Self {
            index,
            visual_prompt,
            voiceover_text,
            image_path: None,
            duration: 0.0,
        }
    }
}

/// 一次会话的分镜工程
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub topic: String,
    pub format: Format,
    pub pacing: Pacing,
    pub scenes: Vec<Scene>,
}

impl Project {
    pub fn new(topic: String, format: Format, pacing: Pacing, scenes: Vec<Scene>) -> Self {
        Self {
            topic,
            format,
            pacing,
            scenes,
        }
    }

    /// 手动替换某个分镜的图片，`scene_number` 从 1 开始
    pub fn replace_image(&mut self, scene_number: usize, path: PathBuf) -> Result<()> {
        let count = self.scenes.len();
        let scene = scene_number
            .checked_sub(1)
            .and_then(|i| self.scenes.get_mut(i))
            .ok_or_else(|| {
                VideoError::InvalidArgument(format!(
                    "scene {} does not exist (project has {} scenes)",
                    scene_number, count
                ))
            })?;
        info!("Scene {} image replaced by {}", scene_number, path.display());
        scene.image_path = Some(path);
        Ok(())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!("Storyboard saved to: {}", path.display());
        Ok(())
    }

    /// 读取用户编辑过的分镜文件，序号按文件中的顺序重新编排
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let mut project: Project = serde_json::from_str(&json)?;
        if project.scenes.is_empty() {
            return Err(VideoError::MissingPrecondition(format!(
                "storyboard {} has no scenes",
                path.display()
            )));
        }
        for (i, scene) in project.scenes.iter_mut().enumerate() {
            scene.index = i;
        }
        info!(
            "Loaded storyboard with {} scenes from {}",
            project.scenes.len(),
            path.display()
        );
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> Project {
        let scenes = vec![
            Scene::new(0, "a dark sea".into(), "The ocean waits.".into()),
            Scene::new(1, "a trench".into(), "  Deeper still.  ".into()),
            Scene::new(2, "a light".into(), "".into()),
        ];
        Project::new(
            "The Deep Ocean".into(),
            Format::Vertical,
            Pacing::new(30.0, 3),
            scenes,
        )
    }

    #[test]
    fn test_replace_image_bounds() {
        let mut project = sample_project();
        assert!(project.replace_image(0, "x.jpg".into()).is_err());
        assert!(project.replace_image(4, "x.jpg".into()).is_err());
        project.replace_image(2, "mine.jpg".into()).unwrap();
        assert_eq!(project.scenes[1].image_path, Some(PathBuf::from("mine.jpg")));
    }

    #[tokio::test]
    async fn test_storyboard_save_and_load_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyboard.json");
        let mut project = sample_project();
        project.scenes.swap(0, 2);
        project.save(&path).await.unwrap();

        let loaded = Project::load(&path).await.unwrap();
        assert_eq!(loaded.topic, "The Deep Ocean");
        assert_eq!(loaded.scenes.len(), 3);
        assert_eq!(loaded.scenes[0].visual_prompt, "a light");
        assert!(loaded.scenes.iter().enumerate().all(|(i, s)| s.index == i));
    }

    #[tokio::test]
    async fn test_empty_storyboard_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyboard.json");
        let mut project = sample_project();
        project.scenes.clear();
        project.save(&path).await.unwrap();
        assert!(matches!(
            Project::load(&path).await,
            Err(VideoError::MissingPrecondition(_))
        ));
    }
}
