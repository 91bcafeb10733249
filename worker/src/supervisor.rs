//! 连接Dashboard、运行会话、断线重连

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::executor::TaskExecutor;
use crate::fetch::Fetcher;
use crate::session::Session;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument};

/// 建立到Dashboard的连接
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn dial(&self) -> Result<Self::Stream>;
}

/// 通过TCP连接 `host:port`
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> Result<TcpStream> {
        let connected = timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "连接超时")));
        let stream = connected.map_err(|source| Error::Dial {
            addr: self.addr.clone(),
            source,
        })?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("设置TCP_NODELAY失败: {}", e);
        }
        Ok(stream)
    }
}

/// 退出信号
///
/// `stop` 停止拉取新任务并等待已有任务完成，`abort` 取消还在执行的任务。
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    pub stop: CancellationToken,
    pub abort: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Dialing,
    Running,
    Backoff,
    Stopped,
}

pub struct Supervisor<D, F> {
    worker_id: String,
    dialer: D,
    executor: Arc<TaskExecutor<F>>,
    retry_interval: Duration,
    max_frame_size: u32,
    tracker: TaskTracker,
    shutdown: Shutdown,
    state: watch::Sender<SupervisorState>,
}

impl<D: Dialer, F: Fetcher> Supervisor<D, F> {
    pub fn new(
        worker_id: impl Into<String>,
        dialer: D,
        executor: TaskExecutor<F>,
        config: &WorkerConfig,
        shutdown: Shutdown,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        Self {
            worker_id: worker_id.into(),
            dialer,
            executor: Arc::new(executor),
            retry_interval: config.retry_interval,
            max_frame_size: config.max_frame_size,
            tracker: TaskTracker::new(),
            shutdown,
            state,
        }
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// 一直运行，直到收到 `stop` 信号并且所有任务都已结束
    pub async fn run(self) {
        let span = info_span!("worker", id = %self.worker_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) {
        let stop = self.shutdown.stop.clone();
        let mut sessions: u64 = 0;

        loop {
            if stop.is_cancelled() {
                break;
            }

            self.state.send_replace(SupervisorState::Dialing);
            let dialed = tokio::select! {
                _ = stop.cancelled() => break,
                dialed = self.dialer.dial() => dialed,
            };

            match dialed {
                Ok(stream) => {
                    sessions += 1;
                    self.state.send_replace(SupervisorState::Running);
                    info!("已连接Dashboard，第 {} 个会话", sessions);

                    let session = Session::new(
                        stream,
                        Arc::clone(&self.executor),
                        self.tracker.clone(),
                        self.shutdown.clone(),
                        self.max_frame_size,
                    );
                    session.run().await;
                }
                Err(e) => {
                    self.state.send_replace(SupervisorState::Backoff);
                    warn!("{}，在 {} 秒后重试...", e, self.retry_interval.as_secs_f32());
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = sleep(self.retry_interval) => {}
                    }
                }
            }
        }

        self.tracker.close();
        info!("停止获取新任务，等待 {} 个未完成的任务...", self.tracker.len());
        self.tracker.wait().await;
        self.state.send_replace(SupervisorState::Stopped);
        info!("Worker已停止");
    }
}
