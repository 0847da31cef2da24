//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use crate::bitmap::ExpansionRule;
use crate::logging::{LogFormat, LogLevel};
use clap::Parser;
use std::path::PathBuf;

/// 从串口连接的指纹传感器读取图像，并保存为 BMP 文件。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "从串口连接的指纹传感器读取图像，并保存为 BMP 文件。设备发送的诊断文本会实时显示。"
)]
pub struct Cli {
    /// 日志级别。
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// 日志格式。
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令：capture (采集)、ports (列出串口) 和 inspect (检查位图)。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 扫描指纹并保存图像。
    Capture(CaptureArgs),

    /// 列出本机可用的串口。
    Ports,

    /// 检查已保存的位图文件头，并用标准解码器打开它。
    Inspect(InspectArgs),
}

/// 'capture' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// 串口名称 (如 COM3 或 /dev/ttyACM1)。
    pub port: String,

    /// 波特率 (如 57600)。
    pub baud_rate: u32,

    /// 输出图像路径。未指定时为 fingerprint.bmp，没有扩展名时自动添加 .bmp。
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,

    /// 图像数据起始标记，可用十进制或 0x 开头的十六进制。
    #[arg(long, value_parser = parse_marker, default_value = "0xAA")]
    pub marker: u8,

    /// 数据字节展开为像素的方式。
    #[arg(long, value_enum, default_value_t = ExpansionRule::Duplicate)]
    pub expansion: ExpansionRule,

    /// 接收图像数据时每个字节的超时 (毫秒)。
    #[arg(long, default_value_t = 1000)]
    pub payload_timeout_ms: u64,

    /// 打开串口后等待开发板复位的时间 (毫秒)。
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,

    /// 不写入灰度调色板。
    #[arg(long)]
    pub no_palette: bool,
}

/// 'inspect' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// 要检查的位图文件路径。
    pub image: PathBuf,
}

/// 解析 `0xAA`、`170` 这样的字节值。
pub fn parse_marker(value: &str) -> Result<u8, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid marker byte '{value}': {e}"))
}
