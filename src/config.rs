use crate::music::MusicSource;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_IMAGE_GEN_BASE_URL: &str = "https://image.pollinations.ai";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://duckduckgo.com";
pub const DEFAULT_TTS_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// 画面方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// 9:16 竖屏
    Vertical,
    /// 16:9 横屏
    Horizontal,
}

impl Format {
    /// 目标分辨率，`safe` 时使用 720p 级别
    pub fn resolution(self, safe: bool) -> (u32, u32) {
        match (self, safe) {
            (Format::Vertical, false) => (1080, 1920),
            (Format::Vertical, true) => (720, 1280),
            (Format::Horizontal, false) => (1920, 1080),
            (Format::Horizontal, true) => (1280, 720),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Format::Vertical => "vertical",
            Format::Horizontal => "horizontal",
        }
    }
}

/// 图片获取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageStrategy {
    /// 生成式图片接口
    Generative,
    /// 图片搜索
    Search,
    /// 纯色占位图
    Placeholder,
}

/// 去重并保证占位图始终是最后的兜底策略
pub fn normalize_sources(sources: &[ImageStrategy]) -> Vec<ImageStrategy> {
    let mut ordered = Vec::with_capacity(sources.len() + 1);
    for source in sources {
        if *source != ImageStrategy::Placeholder && !ordered.contains(source) {
            ordered.push(*source);
        }
    }
    ordered.push(ImageStrategy::Placeholder);
    ordered
}

/// 外部服务地址与密钥
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub image_gen_base_url: String,
    pub search_base_url: String,
    pub tts_api_key: Option<String>,
    pub tts_base_url: String,
    pub tts_model: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            image_gen_base_url: DEFAULT_IMAGE_GEN_BASE_URL.to_string(),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            tts_api_key: None,
            tts_base_url: DEFAULT_TTS_BASE_URL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
        }
    }
}

/// 网络请求的重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub stealth: bool,
}

/// 渲染参数
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub zoom: bool,
    /// 每秒放大比例，缩放系数为 1 + k·t
    pub zoom_rate: f64,
    pub captions: bool,
    /// 字幕每行最大字符数
    pub caption_width: usize,
    pub font_size: u32,
    pub font_file: Option<PathBuf>,
    /// 转场交叉淡化时长（秒），0 表示直接拼接
    pub crossfade: f64,
    pub music_volume: f64,
    pub music_fade_out: f64,
}

impl RenderOptions {
    pub fn for_format(format: Format, safe_resolution: bool) -> Self {
        let (width, height) = format.resolution(safe_resolution);
        Self {
            width,
            height,
            font_size: width.min(height) / 22,
            ..Self::default()
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 24,
            zoom: false,
            zoom_rate: 0.04,
            captions: false,
            caption_width: 30,
            font_size: 48,
            font_file: None,
            crossfade: 0.0,
            music_volume: 0.1,
            music_fade_out: 2.0,
        }
    }
}

/// 一次会话的完整配置
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub topic: String,
    pub scene_count: usize,
    /// 目标总时长（秒）
    pub duration: f64,
    pub format: Format,
    pub voice: String,
    pub sources: Vec<ImageStrategy>,
    pub retry: RetryPolicy,
    pub per_scene_voice: bool,
    pub music: Option<MusicSource>,
    pub work_dir: PathBuf,
    pub resume: bool,
    pub api: ApiSettings,
    pub render: RenderOptions,
}
