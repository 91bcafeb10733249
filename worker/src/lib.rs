//! Worker节点 - 分布式爬虫的TCP边缘节点
//!
//! 功能：
//! - 连接Dashboard，断线后按固定间隔重连
//! - 在同一条TCP连接上接收任务、写回结果（长度前缀JSON帧）
//! - 每个任务独立并发执行，写回统一经过单一写协程
//! - 优雅退出（ctrl+c）

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod session;
pub mod supervisor;

pub use config::{Config, FetchConfig, WorkerConfig};
pub use error::{Error, Result};
pub use executor::TaskExecutor;
pub use fetch::{Fetcher, HttpFetcher};
pub use session::{ResponseWriter, Session, SessionEnd, SessionState};
pub use supervisor::{Dialer, Shutdown, Supervisor, SupervisorState, TcpDialer};
