//! # 分帧模块
//!
//! 从混合了诊断文本和二进制图像数据的字节流中提取图像：
//!
//! 1. `AwaitingSync`：逐字节读取并输出诊断文本，直到读到起始标记。
//!    此阶段没有总时限，操作员按压手指的时间不受限制。
//! 2. `Capturing`：读取固定数量的数据字节，每个字节受不活动超时约束，
//!    展开为像素后写入输出。
//! 3. `Draining`：尽力输出剩余的诊断文本，直到流超时。此阶段的失败
//!    不影响已经取得的成功。

use crate::config::{FramingOptions, ImageGeometry};
use crate::constants::{IMAGE_DEPTH, PIXELS_PER_PAYLOAD_BYTE};
use crate::diagnostics::{Diagnostics, TextDecoder};
use crate::error::CaptureError;
use crate::stream::{ByteStream, read_byte};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// 8 位像素行最多需要 3 字节填充 (行宽向上取整到 4 字节)。
const ROW_PADDING: [u8; 3] = [0; 3];

/// 分帧器的状态。`Done` 和 `Failed` 为终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    AwaitingSync,
    Capturing,
    Draining,
    Done,
    Failed,
}

/// 一次成功提取的统计信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSummary {
    /// 起始标记之前的诊断字节数。
    pub diagnostic_bytes: usize,
    pub payload_bytes: usize,
    /// 写入输出的像素数据字节数 (含行填充)。
    pub raster_bytes: usize,
    /// 图像数据之后的诊断字节数。
    pub trailing_bytes: usize,
}

/// 从 `stream` 中提取图像数据，展开后写入 `sink`。
///
/// `sink` 应当已经写入了位图头和调色板。函数返回时 `stream` 和 `sink`
/// 都已被释放，无论成功还是失败。超时失败时已写入的部分数据保留在
/// `sink` 中。
///
/// # Errors
///
/// * [`CaptureError::Timeout`] - 接收图像数据时某个字节在超时内没有到达。
/// * [`CaptureError::Stream`] - 读取或配置字节流失败。
/// * [`CaptureError::Output`] - 写入 `sink` 失败。
/// * [`CaptureError::Interrupted`] - `cancel` 被置位。
/// * [`CaptureError::UnsupportedGeometry`] - 几何参数不是 8 位灰度，或像素总数
///   不能被每字节的像素数整除。此时不会读取字节流。
pub fn extract_image<S: ByteStream, W: Write>(
    stream: S,
    sink: W,
    options: &FramingOptions,
    diagnostics: &mut dyn Diagnostics,
    cancel: &AtomicBool,
) -> Result<CaptureSummary, CaptureError> {
    check_geometry(&options.geometry)?;

    let mut framer = Framer {
        stream,
        sink,
        options,
        diagnostics,
        cancel,
        state: FramerState::AwaitingSync,
        decoder: TextDecoder::new(),
        summary: CaptureSummary::default(),
        column: 0,
    };

    let result = framer.run();
    match &result {
        Ok(()) => framer.transition(FramerState::Done),
        Err(e) => {
            warn!(state = ?framer.state, error = %e, "image extraction failed");
            let _ = framer.sink.flush();
            framer.transition(FramerState::Failed);
        }
    }

    result.map(|()| framer.summary)
}

/// 每个数据字节展开为两个 8 位像素，因此只支持 8 位深度和偶数像素总数。
fn check_geometry(geometry: &ImageGeometry) -> Result<(), CaptureError> {
    let pixels = u64::from(geometry.width) * u64::from(geometry.height);
    if geometry.depth != IMAGE_DEPTH
        || pixels == 0
        || pixels % PIXELS_PER_PAYLOAD_BYTE as u64 != 0
    {
        warn!(?geometry, "unsupported image geometry");
        return Err(CaptureError::UnsupportedGeometry {
            width: geometry.width,
            height: geometry.height,
            depth: geometry.depth,
        });
    }
    Ok(())
}

struct Framer<'a, S, W, D: ?Sized> {
    stream: S,
    sink: W,
    options: &'a FramingOptions,
    diagnostics: &'a mut D,
    cancel: &'a AtomicBool,
    state: FramerState,
    decoder: TextDecoder,
    summary: CaptureSummary,
    /// 当前像素行中已写入的像素数。
    column: usize,
}

impl<S: ByteStream, W: Write, D: Diagnostics + ?Sized> Framer<'_, S, W, D> {
    fn run(&mut self) -> Result<(), CaptureError> {
        self.await_sync()?;
        self.capture_payload()?;
        self.sink.flush().map_err(CaptureError::Output)?;
        self.drain();
        Ok(())
    }

    fn transition(&mut self, next: FramerState) {
        debug!(from = ?self.state, to = ?next, "framer state");
        self.state = next;
    }

    fn check_cancel(&self) -> Result<(), CaptureError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(CaptureError::Interrupted);
        }
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), CaptureError> {
        self.stream
            .set_inactivity_timeout(timeout)
            .map_err(CaptureError::Stream)
    }

    fn echo(&mut self, byte: u8) {
        let text = self.decoder.push(byte);
        if !text.is_empty() {
            self.diagnostics.device_text(&text);
        }
    }

    fn await_sync(&mut self) -> Result<(), CaptureError> {
        self.set_timeout(self.options.sync_poll)?;

        loop {
            self.check_cancel()?;
            match read_byte(&mut self.stream).map_err(CaptureError::Stream)? {
                None => continue,
                Some(byte) if byte == self.options.start_marker => break,
                Some(byte) => {
                    self.summary.diagnostic_bytes += 1;
                    self.echo(byte);
                }
            }
        }

        self.decoder.reset();
        self.transition(FramerState::Capturing);
        self.diagnostics.status("Extracting image...");
        Ok(())
    }

    fn capture_payload(&mut self) -> Result<(), CaptureError> {
        self.set_timeout(self.options.payload_timeout)?;

        let geometry = self.options.geometry;
        let expected = geometry.payload_byte_count();
        let width = geometry.width as usize;
        let padding = geometry.header().row_stride().saturating_sub(width);

        for received in 0..expected {
            self.check_cancel()?;
            let Some(byte) = read_byte(&mut self.stream).map_err(CaptureError::Stream)? else {
                warn!(received, expected, "payload read timed out");
                return Err(CaptureError::Timeout { received, expected });
            };

            for pixel in self.options.expansion.expand(byte) {
                self.sink.write_all(&[pixel]).map_err(CaptureError::Output)?;
                self.summary.raster_bytes += 1;
                self.column += 1;
                if self.column == width {
                    self.sink
                        .write_all(&ROW_PADDING[..padding])
                        .map_err(CaptureError::Output)?;
                    self.summary.raster_bytes += padding;
                    self.column = 0;
                }
            }
            self.summary.payload_bytes += 1;
        }

        Ok(())
    }

    fn drain(&mut self) {
        self.transition(FramerState::Draining);
        if let Err(e) = self.stream.set_inactivity_timeout(self.options.drain_timeout) {
            debug!(error = %e, "skipping drain");
            return;
        }

        while !self.cancel.load(Ordering::SeqCst) {
            match read_byte(&mut self.stream) {
                Ok(Some(byte)) => {
                    self.summary.trailing_bytes += 1;
                    self.echo(byte);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "drain stopped");
                    break;
                }
            }
        }
    }
}
