//! 单个任务的执行：校验、抓取、组装结果、写回

use crate::clock::LocalClock;
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::session::ResponseWriter;
use common::token::TokenCheck;
use common::{TaskRequest, TaskResponse};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub struct TaskExecutor<F> {
    fetcher: F,
    token: TokenCheck,
    clock: LocalClock,
    require_tag: bool,
}

impl<F: Fetcher> TaskExecutor<F> {
    pub fn new(config: &WorkerConfig, fetcher: F) -> Self {
        Self {
            fetcher,
            token: config.token.clone(),
            clock: LocalClock::new(config.utc_offset),
            require_tag: config.require_tag,
        }
    }

    /// 检查任务是否应该执行
    pub fn accept(&self, request: &TaskRequest) -> Result<()> {
        if !self.token.validate(&request.token) {
            return Err(Error::Auth);
        }

        if request.url.is_empty() {
            return Err(Error::InvalidTask("URL为空".into()));
        }
        match url::Url::parse(&request.url) {
            Ok(parsed) if parsed.has_host() => {}
            Ok(_) => return Err(Error::InvalidTask(format!("URL缺少主机: {}", request.url))),
            Err(e) => return Err(Error::InvalidTask(format!("URL无效 {}: {}", request.url, e))),
        }

        if self.require_tag && !has_tag(request.extra.tag.as_ref()) {
            return Err(Error::InvalidTask("TAG为空".into()));
        }

        Ok(())
    }

    /// 抓取并组装结果，抓取失败记为 `success: false`
    pub async fn execute(&self, request: TaskRequest) -> TaskResponse {
        let start_time = self.clock.now_formatted();
        let started = Instant::now();
        let fetched = self.fetcher.fetch(&request.url).await;
        let runtime = started.elapsed().as_secs();

        match fetched {
            Ok(body) => {
                info!("抓取完成: {}，耗时 {} 秒", request.url, runtime);
                TaskResponse::completed(request, body, runtime, start_time)
            }
            Err(e) => {
                warn!("{}: {}", request.url, e);
                TaskResponse::failed(request, runtime, start_time)
            }
        }
    }

    /// 处理一个任务并把结果写回会话
    ///
    /// 校验不通过时不写回任何帧。
    pub async fn handle(&self, request: TaskRequest, writer: &ResponseWriter) {
        match self.accept(&request) {
            Ok(()) => {}
            Err(Error::Auth) => {
                debug!("收到无效的Token，忽略任务");
                return;
            }
            Err(e) => {
                warn!("{}，忽略任务", e);
                return;
            }
        }

        let response = self.execute(request).await;
        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("结果编码失败: {}", e);
                return;
            }
        };

        match writer.send(payload).await {
            Ok(()) => debug!("结果已写回: {}，success={}", response.url, response.success),
            Err(e) => error!("{}: {}", response.url, e),
        }
    }
}

/// 空字符串不算TAG
fn has_tag(tag: Option<&Value>) -> bool {
    match tag {
        Some(Value::String(tag)) => !tag.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}
