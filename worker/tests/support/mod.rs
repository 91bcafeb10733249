//! 测试用的假抓取器、假拨号器和会话脚手架

#![allow(dead_code)]

use async_trait::async_trait;
use common::codec::{self, DEFAULT_MAX_FRAME_SIZE};
use common::token::TokenCheck;
use common::{TaskRequest, TaskResponse};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::task::TaskTracker;
use worker::{
    Dialer, Error, Fetcher, Session, SessionEnd, SessionState, Shutdown, TaskExecutor,
    WorkerConfig,
};

pub const TOKEN: &str = "good";

pub fn config() -> WorkerConfig {
    WorkerConfig::new("127.0.0.1:0", TokenCheck::Plain(TOKEN.to_string()))
}

#[derive(Clone)]
struct Page {
    delay: Duration,
    body: Option<String>,
}

/// 按URL返回预设页面的抓取器
#[derive(Clone, Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Page>,
    calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, delay: Duration, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                delay,
                body: Some(body.to_string()),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str, delay: Duration) -> Self {
        self.pages.insert(url.to_string(), Page { delay, body: None });
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> worker::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(page) = self.pages.get(url).cloned() else {
            return Err(Error::Fetch(format!("no page for {url}").into()));
        };
        sleep(page.delay).await;
        page.body
            .ok_or_else(|| Error::Fetch("page unavailable".into()))
    }
}

/// 前`refusals`次拨号失败，之后依次交出预先准备好的流
pub struct FakeDialer {
    refusals: AtomicUsize,
    streams: Mutex<VecDeque<DuplexStream>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl FakeDialer {
    pub fn new(refusals: usize, streams: Vec<DuplexStream>) -> Self {
        Self {
            refusals: AtomicUsize::new(refusals),
            streams: Mutex::new(streams.into()),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn attempts(&self) -> Arc<Mutex<Vec<Instant>>> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    type Stream = DuplexStream;

    async fn dial(&self) -> worker::Result<DuplexStream> {
        self.attempts.lock().unwrap().push(Instant::now());

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let stream = if refused {
            None
        } else {
            self.streams.lock().unwrap().pop_front()
        };

        stream.ok_or_else(|| Error::Dial {
            addr: "fake".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        })
    }
}

/// 一个在内存流上运行的会话，测试代码扮演Dashboard
pub struct Harness {
    pub dashboard: DuplexStream,
    pub session: JoinHandle<SessionEnd>,
    pub state: watch::Receiver<SessionState>,
    pub tracker: TaskTracker,
    pub shutdown: Shutdown,
}

impl Harness {
    pub fn start(fetcher: FakeFetcher) -> Self {
        Self::start_with(config(), fetcher)
    }

    pub fn start_with(config: WorkerConfig, fetcher: FakeFetcher) -> Self {
        let (dashboard, worker_side) = tokio::io::duplex(64 * 1024);
        let tracker = TaskTracker::new();
        let shutdown = Shutdown::new();
        let executor = Arc::new(TaskExecutor::new(&config, fetcher));
        let session = Session::new(
            worker_side,
            executor,
            tracker.clone(),
            shutdown.clone(),
            config.max_frame_size,
        );
        let state = session.subscribe();
        let session = tokio::spawn(session.run());

        Self {
            dashboard,
            session,
            state,
            tracker,
            shutdown,
        }
    }

    pub async fn send(&mut self, request: &TaskRequest) {
        codec::write_message(&mut self.dashboard, request)
            .await
            .unwrap();
    }

    pub async fn recv(&mut self) -> TaskResponse {
        codec::read_message(&mut self.dashboard, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap()
    }

    /// 停止会话并等待所有任务写完
    pub async fn drain(&mut self) {
        self.shutdown.stop.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

pub fn request(url: &str) -> TaskRequest {
    TaskRequest::new(TOKEN, url)
}
