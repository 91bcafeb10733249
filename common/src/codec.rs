//! 长度前缀帧编解码
//!
//! 线上格式: `[u32 BE length][JSON payload]`，长度只计算payload本身，
//! 不包含4字节的头。

use serde::{de::DeserializeOwned, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 长度前缀的字节数
pub const HEADER_LEN: usize = 4;

/// 默认的单帧上限: 16 MiB
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

/// 帧读写过程中的错误
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// 底层I/O错误
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// 帧超过允许的大小
    #[error("frame too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// 流在一帧完整到达之前结束
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    /// 对端在帧边界处关闭了连接
    #[error("connection closed")]
    ConnectionClosed,

    /// JSON序列化/反序列化错误
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 给payload加上4字节大端长度前缀
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        size: payload.len() as u64,
        max: u64::from(u32::MAX),
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// 读取下一帧的payload
///
/// 一次`read`不一定返回整帧，这里循环直到长度头和`n`字节payload都收齐。
/// 在帧边界处遇到EOF返回 [`FrameError::ConnectionClosed`]，帧中间遇到EOF返回
/// [`FrameError::Truncated`]。长度超过`max_frame_size`时不读取payload直接报错。
pub async fn read_frame<R>(reader: &mut R, max_frame_size: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                received: filled,
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_size {
        return Err(FrameError::TooLarge {
            size: u64::from(len),
            max: u64::from(max_frame_size),
        });
    }

    // 按实际收到的字节增长缓冲区，长度头本身不决定分配多少内存
    let expected = len as usize;
    let mut payload = Vec::with_capacity(expected.min(READ_CHUNK));
    (&mut *reader)
        .take(u64::from(len))
        .read_to_end(&mut payload)
        .await?;
    if payload.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            received: payload.len(),
        });
    }

    Ok(payload)
}

/// 写出一帧并flush
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// 把一个消息序列化成JSON后按帧写出
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = serde_json::to_vec(msg)?;
    write_frame(writer, &data).await
}

/// 读取一帧并反序列化成消息
pub async fn read_message<R, T>(reader: &mut R, max_frame_size: u32) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame(reader, max_frame_size).await?;
    Ok(serde_json::from_slice(&payload)?)
}
