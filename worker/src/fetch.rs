//! 页面抓取

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.75 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// 遇到这些状态码时重试
const RETRY_STATUSES: [StatusCode; 2] = [StatusCode::BAD_REQUEST, StatusCode::INTERNAL_SERVER_ERROR];

/// 给定URL，返回页面内容
///
/// 实现自己负责超时，返回的future必须在有限时间内结束。
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// 基于reqwest的抓取实现
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retries: u32,
    retry_interval: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self {
            client,
            retries: config.retries,
            retry_interval: config.retry_interval,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) if RETRY_STATUSES.contains(&resp.status()) && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "抓取 {} 返回 {}，{} 秒后第 {} 次重试",
                        url,
                        resp.status(),
                        self.retry_interval.as_secs(),
                        attempt
                    );
                }
                Ok(resp) => {
                    let resp = resp
                        .error_for_status()
                        .map_err(|e| Error::Fetch(Box::new(e)))?;
                    let body = resp.text().await.map_err(|e| Error::Fetch(Box::new(e)))?;
                    info!("URL: {}，页面大小: {} 字节", url, body.len());
                    return Ok(body);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "抓取 {} 出错: {}，{} 秒后第 {} 次重试",
                        url,
                        e,
                        self.retry_interval.as_secs(),
                        attempt
                    );
                }
                Err(e) => return Err(Error::Fetch(Box::new(e))),
            }
            sleep(self.retry_interval).await;
        }
    }
}
