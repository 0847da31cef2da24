//! # 诊断输出模块
//!
//! 设备在图像数据前后发送的可读文本，以及采集过程中的状态行，
//! 都通过 [`Diagnostics`] 交给调用方。输出通道和格式由调用方决定。

use colored::Colorize;
use std::io::Write;

/// 诊断信息的接收方。
pub trait Diagnostics {
    /// 设备发来的一段文本，原样输出，不附加换行。
    fn device_text(&mut self, text: &str);

    /// 一行采集状态 (开始提取、保存位置、失败原因等)。
    fn status(&mut self, line: &str);
}

/// 将诊断信息实时打印到标准输出。
#[derive(Debug, Default)]
pub struct ConsoleDiagnostics;

impl Diagnostics for ConsoleDiagnostics {
    fn device_text(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}", text);
        let _ = stdout.flush();
    }

    fn status(&mut self, line: &str) {
        println!("{}", line.cyan().bold());
    }
}

/// 在内存中收集诊断信息。
#[derive(Debug, Default, Clone)]
pub struct CollectedDiagnostics {
    pub text: String,
    pub statuses: Vec<String>,
}

impl Diagnostics for CollectedDiagnostics {
    fn device_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn status(&mut self, line: &str) {
        self.statuses.push(line.to_owned());
    }
}

/// 将逐字节到达的数据尽力解码为 UTF-8 文本。
///
/// 不完整的多字节序列会被暂存，无效的字节被丢弃。
#[derive(Debug, Default)]
pub struct TextDecoder {
    pending: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一个字节，返回当前可以输出的文本 (可能为空)。
    pub fn push(&mut self, byte: u8) -> String {
        self.pending.push(byte);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to 之前的部分已验证为 UTF-8
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// 丢弃暂存的不完整序列。
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
