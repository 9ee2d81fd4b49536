use crate::error::{Result, VideoError};
use reqwest::header::REFERER;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// DuckDuckGo 图片搜索：先取 vqd 令牌，再请求 `i.js`
#[derive(Debug, Clone)]
pub struct ImageSearchClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    image: Option<String>,
}

impl ImageSearchClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = super::http::build_client(Duration::from_secs(10))?;
        Ok(Self { base_url, client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// 返回最多 `max_results` 个图片地址
    pub async fn search(&self, keywords: &str, max_results: usize, stealth: bool) -> Result<Vec<String>> {
        info!("Searching images for: {}", keywords);

        let token_page = super::http::decorate(self.client.get(format!("{}/", self.base())), stealth)
            .query(&[("q", keywords)])
            .send()
            .await?;
        if !token_page.status().is_success() {
            return Err(VideoError::ApiError(format!(
                "Image search token request failed with HTTP {}",
                token_page.status()
            )));
        }
        let html = token_page.text().await?;
        let vqd = extract_vqd(&html)
            .ok_or_else(|| VideoError::ApiError("Image search token not found".to_string()))?;
        debug!("Image search token: {}", vqd);

        let response = super::http::decorate(self.client.get(format!("{}/i.js", self.base())), stealth)
            .header(REFERER, format!("{}/", self.base()))
            .query(&[
                ("l", "us-en"),
                ("o", "json"),
                ("q", keywords),
                ("vqd", vqd.as_str()),
                ("f", ",,,,,"),
                ("p", "1"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VideoError::ApiError(format!(
                "Image search failed with HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(image_urls(body, max_results))
    }
}

fn image_urls(body: SearchResponse, max_results: usize) -> Vec<String> {
    body.results
        .into_iter()
        .filter_map(|r| r.image)
        .filter(|u| u.starts_with("http"))
        .take(max_results)
        .collect()
}

/// 从搜索页 HTML 中取出 vqd 令牌
pub fn extract_vqd(html: &str) -> Option<String> {
    for (marker, terminator) in [("vqd=\"", '"'), ("vqd='", '\''), ("vqd=", '&')] {
        if let Some(start) = html.find(marker) {
            let rest = &html[start + marker.len()..];
            let token: String = rest
                .chars()
                .take_while(|c| *c != terminator && !c.is_whitespace() && *c != '"' && *c != '\'')
                .collect();
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
    None
}

/// 与场景描述对应的搜索关键词
pub fn search_keywords(prompt: &str, orientation: &str) -> String {
    let head: String = prompt.chars().take(20).collect();
    format!(
        "cinematic concept art {} {} wallpaper 4k dark moody",
        head.trim(),
        orientation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_vqd_variants() {
        assert_eq!(
            extract_vqd(r#"<script>vqd="4-1234567890";</script>"#).as_deref(),
            Some("4-1234567890")
        );
        assert_eq!(extract_vqd("x vqd='4-abc' y").as_deref(), Some("4-abc"));
        assert_eq!(
            extract_vqd("/d.js?q=ocean&vqd=4-999&p=1").as_deref(),
            Some("4-999")
        );
        assert_eq!(extract_vqd("<html>nothing here</html>"), None);
    }

    #[test]
    fn test_image_urls_filters_and_limits() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"results":[{"image":"https://a/1.jpg"},{"title":"no image"},{"image":"data:xyz"},
                {"image":"http://b/2.png"},{"image":"https://c/3.jpg"}]}"#,
        )
        .unwrap();
        assert_eq!(
            image_urls(body, 2),
            vec!["https://a/1.jpg".to_string(), "http://b/2.png".to_string()]
        );
    }

    #[test]
    fn test_keywords_use_first_twenty_chars() {
        let keywords = search_keywords("Ancient sunken cathedral beneath the waves", "vertical");
        assert_eq!(
            keywords,
            "cinematic concept art Ancient sunken cathe vertical wallpaper 4k dark moody"
        );
        // 多字节字符按字符截断
        let keywords = search_keywords("深海中的巨大乌贼在黑暗里游动，闪着微光，向镜头靠近", "horizontal");
        assert!(keywords.contains("horizontal wallpaper"));
    }
}
