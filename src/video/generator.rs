use super::caption::{drawtext_filter, wrap_text};
use super::ffmpeg::{self, MusicMix};
use super::frame::{frame_count, load_frame, zoom_frame};
use crate::config::RenderOptions;
use crate::error::{Result, VideoError};
use crate::scene::pacing::split_duration;
use crate::scene::Scene;
use crate::workspace::{self, Workspace};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// 逐分镜时长之和与旁白总长的最大相对偏差
const DURATION_TOLERANCE: f64 = 0.05;

pub struct VideoGenerator {
    workspace: Workspace,
    options: RenderOptions,
}

impl VideoGenerator {
    pub fn new(workspace: Workspace, options: RenderOptions) -> Self {
        Self { workspace, options }
    }

    /// 合成最终视频，返回旁白（即成片）时长
    pub async fn generate_video(
        &self,
        scenes: &mut [Scene],
        audio_path: &Path,
        music_path: Option<&Path>,
        output_path: &Path,
    ) -> Result<f64> {
        if scenes.is_empty() {
            return Err(VideoError::MissingPrecondition(
                "no scenes to render".to_string(),
            ));
        }
        if !workspace::exists(audio_path).await {
            return Err(VideoError::MissingPrecondition(format!(
                "narration track not found: {}",
                audio_path.display()
            )));
        }

        info!("Starting video generation...");
        let total = ffmpeg::probe_duration(audio_path).await?;
        assign_durations(scenes, total);
        info!(
            "Narration is {:.2}s, {} scenes at {:.2}s each",
            total,
            scenes.len(),
            total / scenes.len() as f64
        );

        let durations: Vec<f64> = scenes.iter().map(|s| s.duration).collect();
        let fade = if self.options.crossfade > 0.0 && scenes.len() > 1 {
            ffmpeg::effective_fade(&durations, self.options.crossfade)
        } else {
            0.0
        };

        // 为每个分镜生成视频片段
        let lengths = ffmpeg::crossfade_lengths(&durations, fade);
        let mut segment_paths = Vec::with_capacity(scenes.len());
        for (i, (scene, length)) in scenes.iter().zip(lengths).enumerate() {
            let segment_path = self.workspace.segment(scene.index);
            self.create_video_segment(scene, length, &segment_path).await?;
            segment_paths.push(segment_path);
            info!("Rendered scene {}/{}", i + 1, scenes.len());
        }

        // 拼接所有片段
        let merged_video = self.workspace.root().join("merged.mp4");
        if fade > 0.0 {
            info!("Joining {} segments with {:.2}s cross-fades", segment_paths.len(), fade);
            let args = ffmpeg::crossfade_args(
                &segment_paths,
                &durations,
                fade,
                self.options.fps,
                &merged_video,
            );
            ffmpeg::run(&args, "FFmpeg cross-fade failed").await?;
        } else {
            self.concat_videos(&segment_paths, &merged_video).await?;
        }

        // 添加旁白与背景音乐
        info!("Adding audio to video...");
        let music = music_path.map(|path| MusicMix {
            path: path.to_path_buf(),
            volume: self.options.music_volume,
            fade_out: self.options.music_fade_out,
        });
        let args = ffmpeg::mux_args(&merged_video, audio_path, music.as_ref(), total, output_path);
        ffmpeg::run(&args, "FFmpeg audio merge failed").await?;

        info!("Video generation completed: {}", output_path.display());

        // 清理临时文件
        tokio::fs::remove_file(&merged_video).await.ok();
        for (scene, segment) in scenes.iter().zip(&segment_paths) {
            tokio::fs::remove_file(segment).await.ok();
            tokio::fs::remove_file(self.workspace.caption(scene.index)).await.ok();
            tokio::fs::remove_file(self.workspace.frame(scene.index)).await.ok();
        }

        Ok(total)
    }

    async fn create_video_segment(&self, scene: &Scene, length: f64, output_path: &Path) -> Result<()> {
        let (width, height) = (self.options.width, self.options.height);
        let base = load_frame(scene.image_path.as_deref(), width, height);

        let filter = if self.options.captions {
            self.caption_filter(scene).await?
        } else {
            None
        };

        if self.options.zoom {
            let args = ffmpeg::piped_segment_args(
                width,
                height,
                self.options.fps,
                length,
                filter.as_deref(),
                output_path,
            );
            let mut child = ffmpeg::spawn_piped(&args)?;
            let mut stdin = child.stdin.take().ok_or_else(|| {
                VideoError::VideoGenerationError("FFmpeg stdin unavailable".to_string())
            })?;

            for n in 0..frame_count(length, self.options.fps) {
                let t = n as f64 / self.options.fps as f64;
                let frame = zoom_frame(&base, t, self.options.zoom_rate);
                if let Err(e) = stdin.write_all(frame.as_raw()).await {
                    // FFmpeg 提前退出时以其 stderr 为准
                    warn!("FFmpeg stopped reading frames: {}", e);
                    break;
                }
            }
            drop(stdin);
            ffmpeg::finish_piped(child, "FFmpeg zoom segment failed").await?;
        } else {
            let frame_path = self.workspace.frame(scene.index);
            base.save(&frame_path)?;
            let args = ffmpeg::still_segment_args(
                &frame_path,
                length,
                self.options.fps,
                filter.as_deref(),
                output_path,
            );
            ffmpeg::run(&args, "FFmpeg segment creation failed").await?;
        }

        Ok(())
    }

    /// 写入折行后的字幕文件，返回对应的 drawtext 滤镜
    async fn caption_filter(&self, scene: &Scene) -> Result<Option<String>> {
        let lines = wrap_text(&scene.voiceover_text, self.options.caption_width);
        if lines.is_empty() {
            return Ok(None);
        }

        let caption_path = self.workspace.caption(scene.index);
        tokio::fs::write(&caption_path, lines.join("\n")).await?;
        Ok(Some(drawtext_filter(
            &caption_path,
            self.options.font_file.as_deref(),
            self.options.font_size,
        )))
    }

    async fn concat_videos(&self, segments: &[PathBuf], output_path: &Path) -> Result<()> {
        info!("Concatenating {} video segments...", segments.len());

        let concat_file = self.workspace.root().join("concat.txt");
        let absolute: Vec<PathBuf> = segments
            .iter()
            .map(|p| p.canonicalize())
            .collect::<std::io::Result<_>>()?;
        tokio::fs::write(&concat_file, ffmpeg::concat_manifest(&absolute)).await?;

        let args = ffmpeg::concat_args(&concat_file, output_path);
        let result = ffmpeg::run(&args, "FFmpeg concat failed").await;
        tokio::fs::remove_file(&concat_file).await.ok();
        result?;

        info!("Concatenated video: {}", output_path.display());
        Ok(())
    }
}

/// 逐分镜时长与旁白总长接近时按比例校正，否则平均切分
pub fn assign_durations(scenes: &mut [Scene], total: f64) {
    let sum: f64 = scenes.iter().map(|s| s.duration).sum();
    let all_set = scenes.iter().all(|s| s.duration > 0.0);
    if all_set && total > 0.0 && ((sum - total) / total).abs() <= DURATION_TOLERANCE {
        let factor = total / sum;
        for scene in scenes.iter_mut() {
            scene.duration *= factor;
        }
        return;
    }

    let parts = split_duration(total, scenes.len());
    for (scene, duration) in scenes.iter_mut().zip(parts) {
        scene.duration = duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Format;

    fn scenes(n: usize) -> Vec<Scene> {
        (0..n)
            .map(|i| Scene::new(i, format!("visual {}", i), format!("line {}", i)))
            .collect()
    }

    #[test]
    fn test_equal_split_sums_to_narration() {
        let mut scenes = scenes(7);
        assign_durations(&mut scenes, 31.4);
        let sum: f64 = scenes.iter().map(|s| s.duration).sum();
        assert!((sum - 31.4).abs() < 1e-9);
        assert!(scenes.iter().all(|s| (s.duration - 31.4 / 7.0).abs() < 1e-12));
    }

    #[test]
    fn test_per_scene_durations_are_kept() {
        let mut scenes = scenes(3);
        for (scene, d) in scenes.iter_mut().zip([2.0, 5.0, 3.1]) {
            scene.duration = d;
        }
        assign_durations(&mut scenes, 10.0);
        let sum: f64 = scenes.iter().map(|s| s.duration).sum();
        assert!((sum - 10.0).abs() < 1e-9);
        assert!((scenes[1].duration - 5.0 * 10.0 / 10.1).abs() < 1e-9);
        assert!(scenes[1].duration > scenes[2].duration);
    }

    #[test]
    fn test_stale_durations_are_replaced() {
        let mut scenes = scenes(2);
        scenes[0].duration = 9.0;
        assign_durations(&mut scenes, 4.0);
        assert_eq!(scenes[0].duration, 2.0);
        assert_eq!(scenes[1].duration, 2.0);
    }

    #[tokio::test]
    async fn test_zero_scenes_abort() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::prepare(dir.path().join("w"), false).await.unwrap();
        let generator = VideoGenerator::new(
            workspace.clone(),
            RenderOptions::for_format(Format::Vertical, true),
        );
        let result = generator
            .generate_video(&mut [], &workspace.narration(), None, &workspace.final_video())
            .await;
        assert!(matches!(result, Err(VideoError::MissingPrecondition(_))));
    }

    #[tokio::test]
    async fn test_missing_narration_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::prepare(dir.path().join("w"), false).await.unwrap();
        let generator = VideoGenerator::new(
            workspace.clone(),
            RenderOptions::for_format(Format::Horizontal, true),
        );
        let mut scenes = scenes(2);
        let result = generator
            .generate_video(&mut scenes, &workspace.narration(), None, &workspace.final_video())
            .await;
        assert!(matches!(result, Err(VideoError::MissingPrecondition(_))));
    }
}
