//! # 错误类型模块
//!
//! 采集会话和位图头解析可能产生的错误。

use std::io;
use thiserror::Error;

/// 一次采集会话的失败原因。
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 串口无法打开。
    #[error("Port open failed: {port}: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// 接收图像数据期间，在不活动超时内没有收到任何字节。
    #[error("Read timed out after {received} of {expected} image bytes")]
    Timeout { received: usize, expected: usize },

    /// 底层传输故障。
    #[error("Stream error: {0}")]
    Stream(#[source] io::Error),

    /// 写入输出文件失败。
    #[error("Output error: {0}")]
    Output(#[source] io::Error),

    /// 分帧器无法按该几何参数填满像素数据区。
    #[error("Unsupported image geometry: {width} x {height} at {depth} bits per pixel")]
    UnsupportedGeometry { width: u32, height: u32, depth: u16 },

    /// 操作员取消了采集。
    #[error("Capture interrupted by operator")]
    Interrupted,
}

/// 读取位图头时遇到的问题。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitmapError {
    #[error("Bitmap is too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },

    #[error("Missing 'BM' signature")]
    BadSignature,

    #[error("Unsupported info header size: {0}")]
    UnsupportedInfoHeader(u32),

    #[error("Implausible dimensions: {width} x {height} at {depth} bits per pixel")]
    ImplausibleDimensions { width: u32, height: u32, depth: u16 },
}
