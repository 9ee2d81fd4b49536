use crate::error::{Result, VideoError};
use reqwest::Client;
use std::time::Duration;
use tracing::info;
use url::Url;

/// 生成式图片接口：`GET /prompt/<text>?width&height&seed&nologo`
#[derive(Debug, Clone)]
pub struct ImageGenClient {
    base_url: String,
    client: Client,
}

impl ImageGenClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = super::http::build_client(Duration::from_secs(90))?;
        Ok(Self { base_url, client })
    }

    pub fn image_url(&self, prompt: &str, width: u32, height: u32, seed: u32) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| {
                VideoError::ApiError(format!("invalid image endpoint: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("prompt")
            .push(prompt);
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("seed", &seed.to_string())
            .append_pair("nologo", "true");
        Ok(url)
    }

    /// 以随机种子请求一张图片，返回原始字节
    pub async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        stealth: bool,
    ) -> Result<Vec<u8>> {
        let seed = rand::random::<u32>() % 1_000_000;
        let url = self.image_url(prompt, width, height, seed)?;
        info!("Generating image (seed {}) for prompt: {}", seed, prompt);
        super::http::download(&self.client, url.as_str(), stealth).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_percent_encoded_in_path() {
        let client = ImageGenClient::new("https://img.example.com".into()).unwrap();
        let url = client
            .image_url("a ship / in the storm?", 1080, 1920, 42)
            .unwrap();
        assert_eq!(url.path(), "/prompt/a%20ship%20%2F%20in%20the%20storm%3F");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("width".into(), "1080".into())));
        assert!(query.contains(&("height".into(), "1920".into())));
        assert!(query.contains(&("seed".into(), "42".into())));
        assert!(query.contains(&("nologo".into(), "true".into())));
    }

    #[test]
    fn test_base_path_is_kept() {
        let client = ImageGenClient::new("http://127.0.0.1:9/api/".into()).unwrap();
        let url = client.image_url("fog", 10, 20, 1).unwrap();
        assert_eq!(url.path(), "/api/prompt/fog");
    }
}
