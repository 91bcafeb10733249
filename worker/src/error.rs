//! Worker错误类型

use common::codec::FrameError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 无法连接Dashboard，由Supervisor按固定间隔重连
    #[error("无法连接Dashboard {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 帧完整但内容不是合法的任务，只丢弃这一帧
    #[error("无法解析任务: {0}")]
    Decode(#[source] serde_json::Error),

    /// Token无效，任务被静默丢弃
    #[error("无效的Token")]
    Auth,

    /// URL或TAG不合法
    #[error("无效的任务: {0}")]
    InvalidTask(String),

    /// 抓取失败，体现为 `success: false`
    #[error("抓取失败: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 写回结果失败
    #[error("写回结果失败: {0}")]
    Write(#[source] FrameError),

    /// 会话的写协程已经退出
    #[error("会话已关闭，结果无法写回")]
    WriterClosed,

    /// 启动配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
