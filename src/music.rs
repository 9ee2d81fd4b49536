use crate::api::http;
use crate::error::{Result, VideoError};
use crate::workspace::{self, Workspace};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// 背景音乐来源
#[derive(Debug, Clone, PartialEq)]
pub enum MusicSource {
    File(PathBuf),
    Url(String),
}

/// 准备背景音乐；音乐是可选的，失败时只记录警告
pub async fn prepare_music(source: Option<&MusicSource>, workspace: &Workspace) -> Option<PathBuf> {
    let source = source?;
    match fetch(source, workspace).await {
        Ok(path) => {
            info!("Background music ready: {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Background music unavailable, rendering without it: {}", e);
            None
        }
    }
}

async fn fetch(source: &MusicSource, workspace: &Workspace) -> Result<PathBuf> {
    match source {
        MusicSource::File(path) => {
            if !workspace::exists(path).await {
                return Err(VideoError::MissingPrecondition(format!(
                    "music file not found: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        MusicSource::Url(url) => {
            let target = workspace.music();
            if workspace::exists(&target).await {
                return Ok(target);
            }
            info!("Downloading background music from: {}", url);
            let client = http::build_client(Duration::from_secs(30))?;
            let bytes = http::download(&client, url, false).await?;
            if bytes.is_empty() {
                return Err(VideoError::ApiError("music download was empty".to_string()));
            }
            tokio::fs::write(&target, bytes).await?;
            Ok(target)
        }
    }
}
