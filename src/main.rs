mod acquire;
mod api;
mod config;
mod error;
mod music;
mod narration;
mod scene;
mod video;
mod workspace;

use acquire::ImageAcquirer;
use anyhow::Context;
use api::{GeminiClient, ImageGenClient, ImageSearchClient, SpeechClient};
use clap::{Parser, ValueEnum};
use config::{ApiSettings, Format, ImageStrategy, RenderOptions, RetryPolicy, StudioConfig};
use error::Result;
use music::MusicSource;
use narration::NarrationSynthesizer;
use scene::pacing::Pacing;
use scene::script::ScriptGenerator;
use scene::Project;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use video::VideoGenerator;
use workspace::{HeldInput, Workspace};

/// `--zoom-rate` 上限（每秒放大比例）
const MAX_ZOOM_RATE: f64 = 1.0;

/// 执行到哪个阶段为止
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Script,
    Images,
    Voice,
    Render,
}

#[derive(Parser, Debug)]
#[command(name = "dark-studio")]
#[command(about = "Turn a topic into a short narrated slideshow video", long_about = None)]
struct Args {
    /// Topic of the video
    #[arg(short, long, default_value = "The Mystery of the Deep Ocean")]
    topic: String,

    /// Number of scenes
    #[arg(short = 'n', long, default_value_t = 6)]
    scenes: usize,

    /// Target duration in seconds (drives the narration word budget)
    #[arg(short, long, default_value_t = 30.0)]
    duration: f64,

    /// Output orientation
    #[arg(long, value_enum, default_value_t = Format::Vertical)]
    format: Format,

    /// Image sources in the order they are tried
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [ImageStrategy::Generative, ImageStrategy::Search, ImageStrategy::Placeholder]
    )]
    sources: Vec<ImageStrategy>,

    /// Apply a slow continuous zoom to every scene
    #[arg(long)]
    zoom: bool,

    /// Zoom speed k, the scale factor is 1 + k·t
    #[arg(long, default_value_t = 0.04)]
    zoom_rate: f64,

    /// Burn the narration into the video as captions
    #[arg(long)]
    captions: bool,

    /// Maximum caption line width in characters
    #[arg(long, default_value_t = 30)]
    caption_width: usize,

    /// Font file for captions (fontconfig default when omitted)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Cross-fade between scenes in seconds (0 disables)
    #[arg(long, default_value_t = 0.0)]
    crossfade: f64,

    /// Background music file
    #[arg(long, conflicts_with = "music_url")]
    music: Option<PathBuf>,

    /// Background music URL
    #[arg(long)]
    music_url: Option<String>,

    /// Background music volume under the narration
    #[arg(long, default_value_t = 0.1)]
    music_volume: f64,

    /// TTS voice identifier
    #[arg(long, default_value = "onyx")]
    voice: String,

    /// Synthesize narration per scene for tighter image/voice sync
    #[arg(long)]
    per_scene_voice: bool,

    /// Edited storyboard JSON to use instead of generating a script
    #[arg(long)]
    storyboard: Option<PathBuf>,

    /// Replace a scene image, e.g. `--replace-image 3=./my.jpg` (scenes start at 1)
    #[arg(long = "replace-image", value_parser = parse_replacement)]
    replace_image: Vec<(usize, PathBuf)>,

    /// Stop after this stage
    #[arg(long, value_enum, default_value_t = Stage::Render)]
    stage: Stage,

    /// Keep the working directory and reuse existing assets
    #[arg(long)]
    resume: bool,

    /// Randomize browser headers on image requests
    #[arg(long)]
    stealth: bool,

    /// Render at 720p instead of 1080p
    #[arg(long)]
    safe_resolution: bool,

    /// Attempts per network image source
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Fixed delay between attempts in milliseconds
    #[arg(long, default_value_t = 2000)]
    retry_delay_ms: u64,

    /// Output frame rate
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Working directory for temporary files
    #[arg(short = 'w', long, default_value = "./studio")]
    work_dir: PathBuf,

    /// Output video file path
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// Text-generation API key
    #[arg(long)]
    api_key: Option<String>,

    /// TTS API key
    #[arg(long)]
    tts_api_key: Option<String>,
}

fn parse_replacement(value: &str) -> std::result::Result<(usize, PathBuf), String> {
    let (scene, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SCENE=PATH, got '{}'", value))?;
    let scene: usize = scene
        .trim()
        .parse()
        .map_err(|_| format!("invalid scene number '{}'", scene))?;
    if scene == 0 {
        return Err("scene numbers start at 1".to_string());
    }
    if path.trim().is_empty() {
        return Err("image path is empty".to_string());
    }
    Ok((scene, PathBuf::from(path.trim())))
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn build_config(args: &Args) -> anyhow::Result<StudioConfig> {
    if args.scenes == 0 {
        anyhow::bail!("--scenes must be at least 1");
    }
    if !(args.duration.is_finite() && args.duration > 0.0) {
        anyhow::bail!("--duration must be a positive number of seconds");
    }
    if args.fps == 0 {
        anyhow::bail!("--fps must be at least 1");
    }

    // 命令行参数优先，其次环境变量
    let defaults = ApiSettings::default();
    let api = ApiSettings {
        gemini_api_key: args
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty()),
        gemini_base_url: env_or("GEMINI_BASE_URL", defaults.gemini_base_url),
        gemini_model: env_or("GEMINI_MODEL", defaults.gemini_model),
        image_gen_base_url: env_or("IMAGE_GEN_BASE_URL", defaults.image_gen_base_url),
        search_base_url: env_or("IMAGE_SEARCH_BASE_URL", defaults.search_base_url),
        tts_api_key: args
            .tts_api_key
            .clone()
            .or_else(|| std::env::var("TTS_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty()),
        tts_base_url: env_or("TTS_BASE_URL", defaults.tts_base_url),
        tts_model: env_or("TTS_MODEL", defaults.tts_model),
    };

    let mut render = RenderOptions::for_format(args.format, args.safe_resolution);
    render.fps = args.fps;
    render.zoom = args.zoom;
    render.zoom_rate = args.zoom_rate.clamp(0.0, MAX_ZOOM_RATE);
    render.captions = args.captions;
    render.caption_width = args.caption_width.max(1);
    render.font_file = args.font.clone();
    render.crossfade = args.crossfade.max(0.0);
    render.music_volume = args.music_volume.clamp(0.0, 1.0);

    let music = match (&args.music, &args.music_url) {
        (Some(path), _) => Some(MusicSource::File(path.clone())),
        (None, Some(url)) => Some(MusicSource::Url(url.clone())),
        (None, None) => None,
    };

    Ok(StudioConfig {
        topic: args.topic.clone(),
        scene_count: args.scenes,
        duration: args.duration,
        format: args.format,
        voice: args.voice.clone(),
        sources: args.sources.clone(),
        retry: RetryPolicy {
            attempts: args.retries.max(1),
            delay: Duration::from_millis(args.retry_delay_ms),
            stealth: args.stealth,
        },
        per_scene_voice: args.per_scene_voice,
        music,
        work_dir: args.work_dir.clone(),
        resume: args.resume,
        api,
        render,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 加载环境变量
    dotenvy::dotenv().ok();

    // 解析命令行参数
    let args = Args::parse();
    let config = build_config(&args)?;

    let inputs = gather_inputs(&args, &config).await?;

    info!("Starting dark-studio session for topic: {}", config.topic);

    if let Err(e) = run_generation(&config, inputs, args.stage, &args.output).await {
        error!("Video generation failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 工作目录清空前读入的用户输入
struct SessionInputs {
    storyboard: Option<Project>,
    replacements: Vec<(usize, HeldInput)>,
    music: Option<HeldInput>,
}

/// 工作目录会被清空，先读入分镜文件和位于其中的替换图片、背景音乐
async fn gather_inputs(args: &Args, config: &StudioConfig) -> anyhow::Result<SessionInputs> {
    let storyboard = match &args.storyboard {
        Some(path) => Some(
            Project::load(path)
                .await
                .with_context(|| format!("Failed to read storyboard: {}", path.display()))?,
        ),
        None => None,
    };

    let mut replacements = Vec::with_capacity(args.replace_image.len());
    for (scene_number, path) in &args.replace_image {
        let held = HeldInput::hold(&config.work_dir, config.resume, path.clone())
            .await
            .with_context(|| format!("Failed to read replacement image: {}", path.display()))?;
        replacements.push((*scene_number, held));
    }

    let music = match &config.music {
        Some(MusicSource::File(path)) => Some(
            HeldInput::hold(&config.work_dir, config.resume, path.clone())
                .await
                .with_context(|| format!("Failed to read music file: {}", path.display()))?,
        ),
        _ => None,
    };

    Ok(SessionInputs {
        storyboard,
        replacements,
        music,
    })
}

async fn run_generation(
    config: &StudioConfig,
    inputs: SessionInputs,
    stage: Stage,
    output_path: &Path,
) -> Result<()> {
    let SessionInputs {
        storyboard,
        replacements,
        music: music_input,
    } = inputs;
    let workspace = Workspace::prepare(&config.work_dir, config.resume).await?;
    let music_source = match music_input {
        Some(input) => Some(MusicSource::File(input.restore(&workspace, "music_input").await?)),
        None => config.music.clone(),
    };
    let pacing = Pacing::new(config.duration, config.scene_count);
    info!(
        "Pacing: {:.1}s per scene, ~{} words of narration",
        pacing.seconds_per_scene, pacing.word_budget
    );

    // 1. 分镜脚本
    info!("Step 1/4: Writing the script...");
    let storyboard = match storyboard {
        Some(project) => Some(project),
        None if config.resume && workspace::exists(&workspace.storyboard()).await => {
            Some(Project::load(&workspace.storyboard()).await?)
        }
        None => None,
    };
    let mut project = match storyboard {
        Some(project) => {
            info!("Using storyboard with {} scenes", project.scenes.len());
            project
        }
        None => {
            let client = match &config.api.gemini_api_key {
                Some(key) => Some(GeminiClient::new(
                    key.clone(),
                    config.api.gemini_base_url.clone(),
                    config.api.gemini_model.clone(),
                )?),
                None => None,
            };
            let scenes = ScriptGenerator::new(client)
                .generate(&config.topic, config.scene_count, &pacing, config.format)
                .await;
            Project::new(config.topic.clone(), config.format, pacing, scenes)
        }
    };
    if project.format != config.format {
        warn!(
            "Storyboard was written for {} format, rendering as {}",
            project.format.label(),
            config.format.label()
        );
    }
    for (scene_number, input) in replacements {
        let path = input
            .restore(&workspace, &format!("replace_{:02}", scene_number))
            .await?;
        project.replace_image(scene_number, path)?;
    }
    project.save(&workspace.storyboard()).await?;
    if stage == Stage::Script {
        info!("Script ready, edit {} and rerun with --storyboard", workspace.storyboard().display());
        return Ok(());
    }

    // 2. 图片
    info!("Step 2/4: Acquiring images for {} scenes...", project.scenes.len());
    let acquirer = ImageAcquirer::new(
        &config.sources,
        ImageGenClient::new(config.api.image_gen_base_url.clone())?,
        ImageSearchClient::new(config.api.search_base_url.clone())?,
        config.retry.clone(),
        config.format,
        (config.render.width, config.render.height),
    )
    .with_label_font(acquire::placeholder::load_label_font(
        config.render.font_file.as_deref(),
    ));
    acquirer
        .acquire_all(&mut project.scenes, &workspace, config.resume)
        .await?;
    project.save(&workspace.storyboard()).await?;
    if stage == Stage::Images {
        return Ok(());
    }

    // 3. 旁白
    info!("Step 3/4: Generating speech...");
    narration::ensure_script(&project.scenes)?;
    if config.api.tts_api_key.is_none() {
        warn!("No TTS API key configured, the speech endpoint may reject the request");
    }
    let synthesizer = NarrationSynthesizer::new(
        SpeechClient::new(
            config.api.tts_api_key.clone(),
            config.api.tts_base_url.clone(),
            config.api.tts_model.clone(),
        )?,
        config.voice.clone(),
    );
    let audio_path = synthesizer
        .synthesize(&mut project.scenes, &workspace, config.per_scene_voice, config.resume)
        .await?;
    project.save(&workspace.storyboard()).await?;
    if stage == Stage::Voice {
        return Ok(());
    }

    // 4. 合成视频
    info!("Step 4/4: Rendering final video...");
    let music = music::prepare_music(music_source.as_ref(), &workspace).await;
    let generator = VideoGenerator::new(workspace.clone(), config.render.clone());
    let final_video = workspace.final_video();
    let duration = generator
        .generate_video(&mut project.scenes, &audio_path, music.as_deref(), &final_video)
        .await?;
    project.save(&workspace.storyboard()).await?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(&final_video, output_path).await?;
    info!(
        "Video ready: {} ({:.1}s, {} scenes)",
        output_path.display(),
        duration,
        project.scenes.len()
    );

    Ok(())
}
