use crate::error::{Result, VideoError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const VIDEO_CODEC: [&str; 6] = ["-c:v", "libx264", "-preset", "ultrafast", "-pix_fmt", "yuv420p"];

fn base_args() -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostats".into(),
    ]
}

fn push_args(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn push_encoder(args: &mut Vec<String>, fps: u32, filter: Option<&str>) {
    if let Some(filter) = filter {
        args.push("-vf".into());
        args.push(filter.to_string());
    }
    args.extend(VIDEO_CODEC.iter().map(|s| s.to_string()));
    args.push("-r".into());
    args.push(fps.to_string());
}

/// 静态图片片段：循环单帧图片 `duration` 秒
pub fn still_segment_args(
    image: &Path,
    duration: f64,
    fps: u32,
    filter: Option<&str>,
    output: &Path,
) -> Vec<String> {
    let mut args = base_args();
    push_args(
        &mut args,
        &[
            "-loop",
            "1",
            "-framerate",
            &fps.to_string(),
            "-i",
            &path_arg(image),
            "-t",
            &format!("{:.3}", duration),
        ],
    );
    push_encoder(&mut args, fps, filter);
    args.push(path_arg(output));
    args
}

/// 从标准输入读取原始 RGB 帧的片段
pub fn piped_segment_args(
    width: u32,
    height: u32,
    fps: u32,
    duration: f64,
    filter: Option<&str>,
    output: &Path,
) -> Vec<String> {
    let mut args = base_args();
    push_args(
        &mut args,
        &[
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", width, height),
            "-framerate",
            &fps.to_string(),
            "-i",
            "-",
            "-t",
            &format!("{:.3}", duration),
        ],
    );
    push_encoder(&mut args, fps, filter);
    args.push(path_arg(output));
    args
}

/// concat 清单，每行 `file '<path>'`
pub fn concat_manifest(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'", p.to_string_lossy().replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 用 concat 分离器无损拼接（视频片段与音频都适用）
pub fn concat_args(manifest: &Path, output: &Path) -> Vec<String> {
    let mut args = base_args();
    push_args(
        &mut args,
        &[
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &path_arg(manifest),
            "-c",
            "copy",
            &path_arg(output),
        ],
    );
    args
}

/// 交叉淡化时每个片段的实际长度：除最后一个外都延长 `fade`
pub fn crossfade_lengths(durations: &[f64], fade: f64) -> Vec<f64> {
    let last = durations.len().saturating_sub(1);
    durations
        .iter()
        .enumerate()
        .map(|(i, d)| if i < last { d + fade } else { *d })
        .collect()
}

/// 第 k 个 xfade 的起点：前 k 个分镜原始时长之和
pub fn crossfade_offsets(durations: &[f64]) -> Vec<f64> {
    durations
        .iter()
        .scan(0.0, |acc, d| {
            *acc += d;
            Some(*acc)
        })
        .take(durations.len().saturating_sub(1))
        .collect()
}

/// 淡化时长不超过最短分镜的一半
pub fn effective_fade(durations: &[f64], fade: f64) -> f64 {
    let shortest = durations.iter().cloned().fold(f64::INFINITY, f64::min);
    if !shortest.is_finite() || fade <= 0.0 {
        return 0.0;
    }
    fade.min(shortest / 2.0)
}

pub fn crossfade_args(segments: &[PathBuf], durations: &[f64], fade: f64, fps: u32, output: &Path) -> Vec<String> {
    let mut args = base_args();
    for segment in segments {
        args.push("-i".into());
        args.push(path_arg(segment));
    }

    let offsets = crossfade_offsets(durations);
    let mut filter = String::new();
    let mut previous = "0:v".to_string();
    for (k, offset) in offsets.iter().enumerate() {
        let label = format!("x{}", k + 1);
        if !filter.is_empty() {
            filter.push(';');
        }
        filter.push_str(&format!(
            "[{}][{}:v]xfade=transition=fade:duration={:.3}:offset={:.3}[{}]",
            previous,
            k + 1,
            fade,
            offset,
            label
        ));
        previous = label;
    }

    if filter.is_empty() {
        push_args(&mut args, &["-map", "0:v"]);
    } else {
        push_args(
            &mut args,
            &["-filter_complex", &filter, "-map", &format!("[{}]", previous)],
        );
    }
    push_encoder(&mut args, fps, None);
    args.push(path_arg(output));
    args
}

/// 背景音乐混音参数
#[derive(Debug, Clone)]
pub struct MusicMix {
    pub path: PathBuf,
    pub volume: f64,
    pub fade_out: f64,
}

/// 视频配上旁白（以及循环的背景音乐），时长截到旁白长度
pub fn mux_args(
    video: &Path,
    narration: &Path,
    music: Option<&MusicMix>,
    duration: f64,
    output: &Path,
) -> Vec<String> {
    let mut args = base_args();
    push_args(
        &mut args,
        &["-i", &path_arg(video), "-i", &path_arg(narration)],
    );

    match music {
        Some(mix) => {
            let fade = mix.fade_out.min(duration).max(0.0);
            let fade_start = (duration - fade).max(0.0);
            let filter = format!(
                "[2:a]volume={:.3},afade=t=out:st={:.3}:d={:.3}[bg];[1:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
                mix.volume, fade_start, fade
            );
            push_args(
                &mut args,
                &[
                    "-stream_loop",
                    "-1",
                    "-i",
                    &path_arg(&mix.path),
                    "-filter_complex",
                    &filter,
                    "-map",
                    "0:v:0",
                    "-map",
                    "[aout]",
                ],
            );
        }
        None => {
            push_args(&mut args, &["-map", "0:v:0", "-map", "1:a:0"]);
        }
    }

    push_args(
        &mut args,
        &[
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-t",
            &format!("{:.3}", duration),
            "-movflags",
            "+faststart",
            &path_arg(output),
        ],
    );
    args
}

fn failure(context: &str, stderr: &[u8]) -> VideoError {
    let error = String::from_utf8_lossy(stderr);
    VideoError::FfmpegError(format!("{}: {}", context, error.trim()))
}

pub async fn run(args: &[String], context: &str) -> Result<()> {
    debug!("ffmpeg {}", args.join(" "));

    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| VideoError::FfmpegError(format!("Failed to run FFmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(failure(context, &output.stderr));
    }
    Ok(())
}

/// 启动一个从标准输入读帧的 FFmpeg 进程
pub fn spawn_piped(args: &[String]) -> Result<tokio::process::Child> {
    debug!("ffmpeg {}", args.join(" "));

    Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| VideoError::FfmpegError(format!("Failed to run FFmpeg: {}", e)))
}

pub async fn finish_piped(child: tokio::process::Child, context: &str) -> Result<()> {
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(failure(context, &output.stderr));
    }
    Ok(())
}

/// 用 ffprobe 读取媒体时长（秒）
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let output = tokio::time::timeout(
        Duration::from_secs(10),
        Command::new("ffprobe")
            .kill_on_drop(true)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output(),
    )
    .await
    .map_err(|_| VideoError::FfmpegError("ffprobe duration check timed out".to_string()))?
    .map_err(|e| VideoError::FfmpegError(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(failure("ffprobe failed", &output.stderr));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        VideoError::FfmpegError(format!("Could not read duration of {}", path.display()))
    })
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
