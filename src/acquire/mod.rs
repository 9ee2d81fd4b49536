pub mod placeholder;

use crate::api::image_search::search_keywords;
use crate::api::{ImageGenClient, ImageSearchClient};
use crate::config::{normalize_sources, Format, ImageStrategy, RetryPolicy};
use crate::error::{Result, VideoError};
use crate::scene::Scene;
use crate::workspace::{self, Workspace};
use fontdue::Font;
use image::{DynamicImage, ImageFormat};
use placeholder::placeholder_image;
use std::future::Future;
use std::path::Path;
use tracing::{info, warn};

/// 每次搜索最多尝试的结果数
const SEARCH_RESULTS: usize = 5;

/// 图片最终来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Existing,
    Generated,
    Searched,
    Placeholder,
}

pub struct ImageAcquirer {
    sources: Vec<ImageStrategy>,
    generator: ImageGenClient,
    search: ImageSearchClient,
    retry: RetryPolicy,
    format: Format,
    width: u32,
    height: u32,
    label_font: Option<Font>,
}

impl ImageAcquirer {
    pub fn new(
        sources: &[ImageStrategy],
        generator: ImageGenClient,
        search: ImageSearchClient,
        retry: RetryPolicy,
        format: Format,
        (width, height): (u32, u32),
    ) -> Self {
        Self {
            sources: normalize_sources(sources),
            generator,
            search,
            retry,
            format,
            width,
            height,
            label_font: None,
        }
    }

    /// 占位图上标注分镜序号所用的字体
    pub fn with_label_font(mut self, font: Option<Font>) -> Self {
        self.label_font = font;
        self
    }

    /// 为每个分镜准备一张可用图片；已有（手动替换或断点续传）的图片会被复用
    pub async fn acquire_all(
        &self,
        scenes: &mut [Scene],
        workspace: &Workspace,
        resume: bool,
    ) -> Result<Vec<ImageOrigin>> {
        let total = scenes.len();
        let mut origins = Vec::with_capacity(total);

        for (n, scene) in scenes.iter_mut().enumerate() {
            if let Some(path) = scene.image_path.as_deref() {
                if is_valid_image(path).await {
                    info!("Scene {} uses provided image {}", scene.index + 1, path.display());
                    origins.push(ImageOrigin::Existing);
                    continue;
                }
                warn!(
                    "Scene {} image {} is not a valid image, acquiring a new one",
                    scene.index + 1,
                    path.display()
                );
            }

            let target = workspace.scene_image(scene.index);
            if resume && is_valid_image(&target).await {
                info!("Scene {} image already exists, skipping...", scene.index + 1);
                scene.image_path = Some(target);
                origins.push(ImageOrigin::Existing);
                continue;
            }

            let origin = self.acquire(scene.index, &scene.visual_prompt, &target).await?;
            scene.image_path = Some(target);
            info!(
                "Scene {} image ready via {:?} ({}/{})",
                scene.index + 1,
                origin,
                n + 1,
                total
            );
            origins.push(origin);
        }

        Ok(origins)
    }

    /// 按策略顺序获取一张图片并保存为 JPEG
    pub async fn acquire(&self, index: usize, prompt: &str, output_path: &Path) -> Result<ImageOrigin> {
        for strategy in &self.sources {
            let (image, origin) = match strategy {
                ImageStrategy::Generative => (self.try_generative(prompt).await, ImageOrigin::Generated),
                ImageStrategy::Search => (self.try_search(prompt).await, ImageOrigin::Searched),
                ImageStrategy::Placeholder => (
                    Some(DynamicImage::ImageRgb8(placeholder_image(
                        index,
                        self.width,
                        self.height,
                        self.label_font.as_ref(),
                    ))),
                    ImageOrigin::Placeholder,
                ),
            };

            if let Some(image) = image {
                save_jpeg(&image, output_path)?;
                return Ok(origin);
            }
            warn!("Scene {}: {:?} source exhausted", index + 1, strategy);
        }

        Err(VideoError::VideoGenerationError(format!(
            "no image source produced an image for scene {}",
            index + 1
        )))
    }

    async fn try_generative(&self, prompt: &str) -> Option<DynamicImage> {
        self.with_retries("generative", || async move {
            let bytes = self
                .generator
                .generate(prompt, self.width, self.height, self.retry.stealth)
                .await?;
            decode_image(&bytes)
        })
        .await
    }

    async fn try_search(&self, prompt: &str) -> Option<DynamicImage> {
        let keywords = search_keywords(prompt, self.format.label());
        let keywords = keywords.as_str();
        self.with_retries("search", || async move {
            let urls = self
                .search
                .search(keywords, SEARCH_RESULTS, self.retry.stealth)
                .await?;

            for url in &urls {
                match crate::api::http::download(self.search.client(), url, self.retry.stealth)
                    .await
                    .and_then(|bytes| decode_image(&bytes))
                {
                    Ok(image) => return Ok(image),
                    Err(e) => warn!("Search result {} rejected: {}", url, e),
                }
            }

            Err(VideoError::ApiError(format!(
                "none of {} search results was a valid image",
                urls.len()
            )))
        })
        .await
    }

    /// 固定间隔重试，全部失败时返回 None
    async fn with_retries<F, Fut>(&self, label: &str, mut attempt: F) -> Option<DynamicImage>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<DynamicImage>>,
    {
        let attempts = self.retry.attempts.max(1);
        for n in 1..=attempts {
            match attempt().await {
                Ok(image) => return Some(image),
                Err(e) => {
                    warn!("{} image attempt {}/{} failed: {}", label, n, attempts, e);
                    if n < attempts && !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
        None
    }
}

/// 下载内容必须能解码成图片才算成功
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(VideoError::ApiError("downloaded image is empty".to_string()));
    }
    Ok(image)
}

async fn is_valid_image(path: &Path) -> bool {
    if !workspace::exists(path).await {
        return false;
    }
    match tokio::fs::read(path).await {
        Ok(bytes) => decode_image(&bytes).is_ok(),
        Err(_) => false,
    }
}

fn save_jpeg(image: &DynamicImage, path: &Path) -> Result<()> {
    image.to_rgb8().save_with_format(path, ImageFormat::Jpeg)?;
    Ok(())
}
