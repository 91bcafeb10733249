//! Worker配置
//!
//! 命令行参数（或环境变量）只在启动时解析一次，随后转换成不可变的
//! [`WorkerConfig`] 传给Supervisor。

use crate::error::{Error, Result};
use chrono::FixedOffset;
use clap::Parser;
use common::codec::DEFAULT_MAX_FRAME_SIZE;
use common::token::TokenCheck;
use std::time::Duration;

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "分布式爬虫 - TCP Worker节点", long_about = None)]
pub struct Config {
    /// 爬虫校验的Token
    #[arg(short = 't', long, env = "WORKER_TOKEN")]
    pub token: Option<String>,

    /// Token的SHA-256摘要（十六进制），与 --token 二选一
    #[arg(long, env = "WORKER_TOKEN_SHA256", conflicts_with = "token")]
    pub token_sha256: Option<String>,

    /// 主控的IP地址
    #[arg(short = 'H', long, env = "WORKER_HOST")]
    pub host: String,

    /// 主控的通信端口
    #[arg(short = 'p', long, env = "WORKER_PORT")]
    pub port: u16,

    /// 连接失败后的重连间隔（秒）
    #[arg(short = 'r', long, default_value = "6")]
    pub retry_interval: u64,

    /// 建立TCP连接的超时（秒）
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// 单次抓取的超时（秒）
    #[arg(long, default_value = "10")]
    pub fetch_timeout: u64,

    /// 抓取失败时的重试次数
    #[arg(long, default_value = "3")]
    pub fetch_retries: u32,

    /// 抓取重试间隔（秒）
    #[arg(long, default_value = "6")]
    pub fetch_retry_interval: u64,

    /// 单帧最大字节数
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: u32,

    /// start_time 使用的UTC偏移（小时），默认北京时间
    #[arg(long, default_value = "8", allow_hyphen_values = true)]
    pub utc_offset_hours: i32,

    /// 丢弃没有TAG的任务
    #[arg(long)]
    pub require_tag: bool,
}

/// 抓取相关配置
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_interval: Duration::from_secs(6),
        }
    }
}

/// 校验过的Worker配置
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Dashboard地址 `host:port`
    pub addr: String,
    pub token: TokenCheck,
    pub retry_interval: Duration,
    pub connect_timeout: Duration,
    pub max_frame_size: u32,
    pub utc_offset: FixedOffset,
    pub require_tag: bool,
    pub fetch: FetchConfig,
}

impl WorkerConfig {
    /// 测试和嵌入场景下使用的默认值
    pub fn new(addr: impl Into<String>, token: TokenCheck) -> Self {
        Self {
            addr: addr.into(),
            token,
            retry_interval: Duration::from_secs(6),
            connect_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            utc_offset: beijing(),
            require_tag: false,
            fetch: FetchConfig::default(),
        }
    }
}

impl TryFrom<Config> for WorkerConfig {
    type Error = Error;

    fn try_from(config: Config) -> Result<Self> {
        let token = match (config.token, config.token_sha256) {
            (Some(token), _) if !token.is_empty() => TokenCheck::Plain(token),
            (_, Some(digest)) if !digest.trim().is_empty() => TokenCheck::sha256(&digest),
            _ => return Err(Error::Config("未提供Token（--token 或 --token-sha256）".into())),
        };

        if config.host.is_empty() {
            return Err(Error::Config("未提供主控地址（--host）".into()));
        }

        let utc_offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Config(format!("无效的UTC偏移: {}", config.utc_offset_hours))
            })?;

        if config.max_frame_size == 0 {
            return Err(Error::Config("max_frame_size 必须大于0".into()));
        }

        Ok(Self {
            addr: format!("{}:{}", config.host, config.port),
            token,
            retry_interval: Duration::from_secs(config.retry_interval),
            connect_timeout: Duration::from_secs(config.connect_timeout),
            max_frame_size: config.max_frame_size,
            utc_offset,
            require_tag: config.require_tag,
            fetch: FetchConfig {
                timeout: Duration::from_secs(config.fetch_timeout),
                retries: config.fetch_retries,
                retry_interval: Duration::from_secs(config.fetch_retry_interval),
            },
        })
    }
}

fn beijing() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 是合法的偏移")
}
