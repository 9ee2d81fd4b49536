use crate::api::SpeechClient;
use crate::error::{Result, VideoError};
use crate::scene::Scene;
use crate::video::ffmpeg;
use crate::workspace::{self, Workspace};
use std::path::PathBuf;
use tracing::{info, warn};

/// 旁白合成：整段一次合成，或逐分镜合成后拼接
pub struct NarrationSynthesizer {
    client: SpeechClient,
    voice: String,
}

impl NarrationSynthesizer {
    pub fn new(client: SpeechClient, voice: String) -> Self {
        Self { client, voice }
    }

    pub async fn synthesize(
        &self,
        scenes: &mut [Scene],
        workspace: &Workspace,
        per_scene: bool,
        resume: bool,
    ) -> Result<PathBuf> {
        let audio_path = workspace.narration();
        if resume && workspace::exists(&audio_path).await {
            info!("Audio file already exists, skipping speech generation...");
            return Ok(audio_path);
        }

        if per_scene {
            if scenes.iter().all(|s| !s.voiceover_text.trim().is_empty()) {
                return self.synthesize_per_scene(scenes, workspace).await;
            }
            warn!("Some scenes have no narration text, synthesizing the script as one track");
        }

        let full_text = full_script(scenes);
        self.client
            .synthesize(&full_text, &self.voice, &audio_path)
            .await?;
        Ok(audio_path)
    }

    /// 逐分镜合成，分镜时长取各自音频长度
    async fn synthesize_per_scene(&self, scenes: &mut [Scene], workspace: &Workspace) -> Result<PathBuf> {
        info!("Synthesizing narration per scene ({} clips)", scenes.len());

        let mut clips = Vec::with_capacity(scenes.len());
        for scene in scenes.iter_mut() {
            let clip = workspace.scene_voice(scene.index);
            self.client
                .synthesize(&scene.voiceover_text, &self.voice, &clip)
                .await?;
            scene.duration = ffmpeg::probe_duration(&clip).await?;
            info!("Scene {} narration: {:.2}s", scene.index + 1, scene.duration);
            clips.push(clip.canonicalize()?);
        }

        let manifest = workspace.root().join("voice_concat.txt");
        tokio::fs::write(&manifest, ffmpeg::concat_manifest(&clips)).await?;
        let audio_path = workspace.narration();
        let result = ffmpeg::run(
            &ffmpeg::concat_args(&manifest, &audio_path),
            "FFmpeg narration concat failed",
        )
        .await;
        tokio::fs::remove_file(&manifest).await.ok();
        result?;

        info!("Narration saved to: {}", audio_path.display());
        Ok(audio_path)
    }
}

/// 整段旁白文本
pub fn full_script(scenes: &[Scene]) -> String {
    scenes
        .iter()
        .map(|s| s.voiceover_text.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 空脚本视为缺少前置条件
pub fn ensure_script(scenes: &[Scene]) -> Result<()> {
    if full_script(scenes).is_empty() {
        return Err(VideoError::MissingPrecondition(
            "the storyboard has no narration text".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SpeechClient {
        SpeechClient::new(None, "http://127.0.0.1:9".into(), "tts-1".into()).unwrap()
    }

    #[tokio::test]
    async fn test_resume_reuses_existing_narration() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::prepare(dir.path().join("w"), false).await.unwrap();
        tokio::fs::write(workspace.narration(), b"ID3").await.unwrap();

        let synthesizer = NarrationSynthesizer::new(client(), "onyx".into());
        let mut scenes = vec![Scene::new(0, "v".into(), "hello there".into())];
        let path = synthesizer
            .synthesize(&mut scenes, &workspace, false, true)
            .await
            .unwrap();
        assert_eq!(path, workspace.narration());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::prepare(dir.path().join("w"), false).await.unwrap();
        let synthesizer = NarrationSynthesizer::new(client(), "onyx".into());
        let mut scenes = vec![Scene::new(0, "v".into(), "hello there".into())];
        let result = synthesizer.synthesize(&mut scenes, &workspace, false, false).await;
        assert!(matches!(result, Err(VideoError::HttpError(_))));
        assert!(!workspace::exists(&workspace.narration()).await);
    }

    #[test]
    fn test_full_script_joins_in_order() {
        let scenes = vec![
            Scene::new(0, "a".into(), "The ocean waits.".into()),
            Scene::new(1, "b".into(), "  Deeper still.  ".into()),
            Scene::new(2, "c".into(), "".into()),
        ];
        assert_eq!(full_script(&scenes), "The ocean waits. Deeper still.");
    }

    #[test]
    fn test_ensure_script() {
        let empty = vec![Scene::new(0, "v".into(), "  ".into())];
        assert!(matches!(ensure_script(&empty), Err(VideoError::MissingPrecondition(_))));
        let ok = vec![Scene::new(0, "v".into(), "words".into())];
        assert!(ensure_script(&ok).is_ok());
    }
}
