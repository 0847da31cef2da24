//! # 采集会话模块
//!
//! 一次采集会话负责打开串口、创建输出文件、写入位图头和调色板，
//! 然后交给分帧器提取图像。串口和文件在会话返回前都会被关闭。

use crate::config::CaptureConfig;
use crate::diagnostics::Diagnostics;
use crate::error::CaptureError;
use crate::framer::{CaptureSummary, extract_image};
use crate::stream::ByteStream;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::info;

/// 按给定配置执行采集。
#[derive(Debug)]
pub struct CaptureSession {
    config: CaptureConfig,
    cancel: Arc<AtomicBool>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// 置位后，会话在下一次读取前放弃采集并返回 [`CaptureError::Interrupted`]。
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// 打开配置中的串口并采集一幅图像，保存到 `output`。
    ///
    /// 串口无法打开时不会创建输出文件。
    ///
    /// # Errors
    ///
    /// 返回 [`CaptureError`] 中的任一种失败原因；失败原因同时以一行
    /// 状态信息报告给 `diagnostics`。
    pub fn capture(
        &self,
        output: &Path,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<CaptureSummary, CaptureError> {
        let port = match self.open_port() {
            Ok(port) => port,
            Err(e) => {
                diagnostics.status(&e.to_string());
                return Err(e);
            }
        };

        // 打开串口会复位开发板
        if !self.config.settle_delay.is_zero() {
            std::thread::sleep(self.config.settle_delay);
        }

        self.capture_from(port, output, diagnostics)
    }

    /// 使用已经打开的字节流采集一幅图像，保存到 `output`。
    pub fn capture_from<S: ByteStream>(
        &self,
        stream: S,
        output: &Path,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<CaptureSummary, CaptureError> {
        let result = self.run(stream, output, diagnostics);
        match &result {
            Ok(summary) => {
                info!(
                    output = %output.display(),
                    raster_bytes = summary.raster_bytes,
                    "image saved"
                );
                diagnostics.status(&format!("[Image saved to {}]", output.display()));
            }
            Err(e) => diagnostics.status(&e.to_string()),
        }
        result
    }

    fn open_port(&self) -> Result<Box<dyn serialport::SerialPort>, CaptureError> {
        info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            "opening serial port"
        );
        serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.framing.sync_poll)
            .open()
            .map_err(|source| CaptureError::PortUnavailable {
                port: self.config.port.clone(),
                source,
            })
    }

    fn run<S: ByteStream>(
        &self,
        stream: S,
        output: &Path,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<CaptureSummary, CaptureError> {
        let file = File::create(output).map_err(CaptureError::Output)?;
        let mut sink = BufWriter::new(file);
        sink.write_all(&self.config.header().to_bytes())
            .map_err(CaptureError::Output)?;

        extract_image(
            stream,
            sink,
            &self.config.framing,
            diagnostics,
            &self.cancel,
        )
    }
}
