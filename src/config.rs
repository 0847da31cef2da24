//! # 采集配置模块
//!
//! 串口参数和分帧参数作为普通的值传入采集会话，不存在全局可变状态。

use crate::bitmap::{BitmapHeader, ExpansionRule};
use crate::constants::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_PAYLOAD_TIMEOUT, DEFAULT_SETTLE_DELAY, DEFAULT_START_MARKER,
    DEFAULT_SYNC_POLL, IMAGE_DEPTH, IMAGE_HEIGHT, IMAGE_WIDTH, PIXELS_PER_PAYLOAD_BYTE,
};
use std::time::Duration;

/// 图像的几何参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
    pub depth: u16,
}

impl ImageGeometry {
    /// 传感器需要发送的数据字节数 (每字节两个像素)。
    pub fn payload_byte_count(&self) -> usize {
        self.width as usize * self.height as usize / PIXELS_PER_PAYLOAD_BYTE
    }

    pub fn header(&self) -> BitmapHeader {
        BitmapHeader::new(self.width, self.height, self.depth)
    }
}

impl Default for ImageGeometry {
    fn default() -> Self {
        Self {
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            depth: IMAGE_DEPTH,
        }
    }
}

/// 分帧器的参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingOptions {
    pub geometry: ImageGeometry,
    pub start_marker: u8,
    pub expansion: ExpansionRule,
    /// 等待起始标记时单次读取的超时；等待本身没有总时限。
    pub sync_poll: Duration,
    /// 接收图像数据时每个字节的不活动超时。
    pub payload_timeout: Duration,
    /// 读取剩余诊断文本时的超时。
    pub drain_timeout: Duration,
}

impl Default for FramingOptions {
    fn default() -> Self {
        Self {
            geometry: ImageGeometry::default(),
            start_marker: DEFAULT_START_MARKER,
            expansion: ExpansionRule::default(),
            sync_poll: DEFAULT_SYNC_POLL,
            payload_timeout: DEFAULT_PAYLOAD_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// 一次采集会话的完整配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub port: String,
    pub baud_rate: u32,
    /// 打开串口后等待开发板复位的时间。
    pub settle_delay: Duration,
    pub include_palette: bool,
    pub framing: FramingOptions,
}

impl CaptureConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            settle_delay: DEFAULT_SETTLE_DELAY,
            include_palette: true,
            framing: FramingOptions::default(),
        }
    }

    /// 写在像素数据之前的位图头。行顺序为采集顺序 (从上到下)。
    pub fn header(&self) -> BitmapHeader {
        self.framing
            .geometry
            .header()
            .with_palette(self.include_palette)
    }
}
