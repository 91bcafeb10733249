//! 一条TCP连接上的会话
//!
//! 读循环独占读半边，把每一帧解析成任务后交给独立的执行协程；写半边只属于
//! 一个写协程，所有执行协程通过 [`ResponseWriter`] 排队写回，保证帧不会交错。

use crate::error::{Error, Result};
use crate::executor::TaskExecutor;
use crate::fetch::Fetcher;
use crate::supervisor::Shutdown;
use common::codec::{self, FrameError};
use common::TaskRequest;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// 会话结束的原因
#[derive(Debug)]
pub enum SessionEnd {
    /// 对端在帧边界处关闭了连接
    PeerClosed,
    /// 读取帧失败
    Frame(FrameError),
    /// 写协程因写失败退出
    WriterClosed,
    /// 收到退出信号
    Shutdown,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "Dashboard关闭了连接"),
            Self::Frame(e) => write!(f, "读取帧失败: {e}"),
            Self::WriterClosed => write!(f, "写回结果失败"),
            Self::Shutdown => write!(f, "收到退出信号"),
        }
    }
}

struct Outgoing {
    payload: Vec<u8>,
    ack: oneshot::Sender<std::result::Result<(), FrameError>>,
}

/// 向会话写协程提交结果帧的句柄
#[derive(Clone)]
pub struct ResponseWriter {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl ResponseWriter {
    /// 提交一帧payload，等待写协程真正写出
    pub async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Outgoing { payload, ack })
            .map_err(|_| Error::WriterClosed)?;
        match done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Write(e)),
            Err(_) => Err(Error::WriterClosed),
        }
    }
}

pub struct Session<S, F> {
    stream: S,
    executor: Arc<TaskExecutor<F>>,
    tracker: TaskTracker,
    shutdown: Shutdown,
    max_frame_size: u32,
    state: watch::Sender<SessionState>,
}

impl<S, F> Session<S, F>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    F: Fetcher,
{
    pub fn new(
        stream: S,
        executor: Arc<TaskExecutor<F>>,
        tracker: TaskTracker,
        shutdown: Shutdown,
        max_frame_size: u32,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            stream,
            executor,
            tracker,
            shutdown,
            max_frame_size,
            state,
        }
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// 运行读循环直到连接不可用
    ///
    /// 因连接错误结束时，写协程立即停止并关闭写半边，排队中的结果全部丢弃。
    /// 只有收到退出信号时，写协程才会等正在执行的任务写完再关闭。
    pub async fn run(self) -> SessionEnd {
        let (mut reader, writer) = tokio::io::split(self.stream);
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = self.shutdown.abort.child_token();
        let mut writer_task = self.tracker.spawn(writer_loop(writer, rx, closed.clone()));
        let responses = ResponseWriter { tx };

        self.state.send_replace(SessionState::Open);
        debug!("会话已建立");

        let end = loop {
            tokio::select! {
                _ = self.shutdown.stop.cancelled() => break SessionEnd::Shutdown,
                _ = &mut writer_task => break SessionEnd::WriterClosed,
                frame = codec::read_frame(&mut reader, self.max_frame_size) => match frame {
                    Ok(payload) => dispatch(
                        &self.executor,
                        &self.tracker,
                        &self.shutdown,
                        &payload,
                        &responses,
                    ),
                    Err(FrameError::ConnectionClosed) => break SessionEnd::PeerClosed,
                    Err(e) => break SessionEnd::Frame(e),
                },
            }
        };

        match &end {
            SessionEnd::Shutdown => info!("会话结束: {}", end),
            SessionEnd::PeerClosed => {
                closed.cancel();
                info!("会话结束: {}", end);
            }
            SessionEnd::Frame(_) | SessionEnd::WriterClosed => {
                closed.cancel();
                warn!("会话结束: {}", end);
            }
        }
        self.state.send_replace(SessionState::Closed);
        end
    }
}

fn dispatch<F: Fetcher>(
    executor: &Arc<TaskExecutor<F>>,
    tracker: &TaskTracker,
    shutdown: &Shutdown,
    payload: &[u8],
    responses: &ResponseWriter,
) {
    let request: TaskRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!("丢弃一帧: {}", Error::Decode(e));
            return;
        }
    };

    debug!("收到任务: {}", request.url);
    let executor = Arc::clone(executor);
    let responses = responses.clone();
    let abort = shutdown.abort.clone();
    tracker.spawn(async move {
        let url = request.url.clone();
        tokio::select! {
            _ = abort.cancelled() => warn!("任务被强制取消: {}", url),
            _ = executor.handle(request, &responses) => {}
        }
    });
}

/// 唯一的写者：按提交顺序把结果帧写到socket
///
/// `closed` 被取消后不再写出任何帧。
async fn writer_loop<S>(
    mut writer: WriteHalf<S>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite,
{
    loop {
        let outgoing = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            outgoing = rx.recv() => match outgoing {
                Some(outgoing) => outgoing,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            result = codec::write_frame(&mut writer, &outgoing.payload) => result,
        };

        if let Err(e) = &result {
            error!("写回结果失败: {}", e);
            let _ = outgoing.ack.send(result);
            return;
        }
        let _ = outgoing.ack.send(result);
    }

    // 丢弃排队中的结果，对应的执行协程收到 WriterClosed
    drop(rx);
    let _ = writer.shutdown().await;
}
