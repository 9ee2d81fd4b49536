use crate::error::{Result, VideoError};
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// OpenAI 兼容的语音合成接口（`POST /audio/speech`）
#[derive(Debug, Clone)]
pub struct SpeechClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: Client,
}

impl SpeechClient {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Result<Self> {
        let client = super::http::build_client(Duration::from_secs(120))?;

        Ok(Self {
            api_key,
            base_url,
            model,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }

    /// 生成语音并写入 `output_path`（mp3）
    pub async fn synthesize(&self, text: &str, voice: &str, output_path: &Path) -> Result<()> {
        if text.trim().is_empty() {
            return Err(VideoError::MissingPrecondition(
                "nothing to narrate: script text is empty".to_string(),
            ));
        }

        info!("Generating speech ({} chars) with voice {}", text.len(), voice);

        let request_body = json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            "response_format": "mp3"
        });

        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(VideoError::ApiError(format!("TTS API error: {}", error_text)));
        }

        let audio_data = response.bytes().await?;
        if audio_data.is_empty() {
            return Err(VideoError::ApiError("TTS API returned no audio".to_string()));
        }
        tokio::fs::write(output_path, audio_data).await?;

        info!("Speech saved to: {}", output_path.display());
        Ok(())
    }
}
