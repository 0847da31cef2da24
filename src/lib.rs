//! # fpgrab 库
//!
//! 本库包含指纹图像采集工具的核心逻辑：从串口字节流中分离出图像数据，
//! 并将其组装为 BMP 文件。

// 声明库包含的所有模块。

pub mod bitmap;
pub mod cli;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod framer;
pub mod handler;
pub mod logging;
pub mod session;
pub mod stream;
