use crate::error::{Result, VideoError};
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// 隐身模式下随机挑选浏览器请求头
pub fn decorate(request: RequestBuilder, stealth: bool) -> RequestBuilder {
    if !stealth {
        return request;
    }
    let agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);
    request
        .header(USER_AGENT, agent)
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
}

/// 下载任意资源，非 2xx 视为失败
pub async fn download(client: &Client, url: &str, stealth: bool) -> Result<Vec<u8>> {
    let response = decorate(client.get(url), stealth).send().await?;

    if !response.status().is_success() {
        return Err(VideoError::ApiError(format!(
            "download of {} failed with HTTP {}",
            url,
            response.status()
        )));
    }

    Ok(response.bytes().await?.to_vec())
}
