use clap::Parser;
use tracing::{error, info, warn};
use worker::{
    Config, HttpFetcher, Shutdown, Supervisor, TaskExecutor, TcpDialer, WorkerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 解析命令行参数
    let config = WorkerConfig::try_from(Config::parse())?;

    // 生成Worker ID
    let worker_id = uuid::Uuid::new_v4().to_string();
    info!("启动Worker节点，ID: {}", worker_id);
    info!("Dashboard地址: {}", config.addr);
    info!("重连间隔: {} 秒", config.retry_interval.as_secs());
    info!("抓取超时: {} 秒", config.fetch.timeout.as_secs());

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let executor = TaskExecutor::new(&config, fetcher);
    let dialer = TcpDialer::new(config.addr.clone(), config.connect_timeout);

    // 设置 ctrl+c 信号处理
    let shutdown = Shutdown::new();
    tokio::spawn(setup_signal_handler(shutdown.clone()));

    Supervisor::new(worker_id, dialer, executor, &config, shutdown.clone())
        .run()
        .await;

    if shutdown.abort.is_cancelled() {
        return Err("强制退出".into());
    }

    info!("Worker已优雅退出");
    Ok(())
}

/// 设置信号处理器
async fn setup_signal_handler(shutdown: Shutdown) {
    let mut first_signal = true;

    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听ctrl+c信号: {}", e);
            return;
        }

        if first_signal {
            first_signal = false;
            info!("收到第一次 ctrl+c，停止接收任务，等待已有任务完成...");
            info!("再次按 ctrl+c 将强制退出并放弃未完成的任务");
            shutdown.stop.cancel();
        } else {
            warn!("收到第二次 ctrl+c，强制退出！");
            shutdown.abort.cancel();
            return;
        }
    }
}
