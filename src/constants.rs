use std::time::Duration;

/// 传感器图像宽度 (像素)。
pub const IMAGE_WIDTH: u32 = 256;

/// 传感器图像高度 (像素)。
pub const IMAGE_HEIGHT: u32 = 288;

/// 输出位图的位深度 (8 位灰度)。
pub const IMAGE_DEPTH: u16 = 8;

/// 传感器每个传输字节打包的像素数。
pub const PIXELS_PER_PAYLOAD_BYTE: usize = 2;

/// 标志着诊断文本结束、二进制图像数据开始的字节。
pub const DEFAULT_START_MARKER: u8 = 0xAA;

/// BMP 文件头 (14 字节) 与 BITMAPINFOHEADER (40 字节) 的总大小。
pub const BMP_HEADER_SIZE: usize = 54;

/// BITMAPINFOHEADER 的大小 (字节)。
pub const INFO_HEADER_SIZE: u32 = 40;

/// 每个调色板条目的字节数 (B, G, R, 保留)。
pub const PALETTE_ENTRY_SIZE: usize = 4;

/// 约 72 DPI，位图的常规默认分辨率。
pub const PIXELS_PER_METER: u32 = 2835;

/// 等待起始标记时，单次读取的轮询间隔。
pub const DEFAULT_SYNC_POLL: Duration = Duration::from_millis(100);

/// 接收图像数据时，单字节读取的不活动超时。
pub const DEFAULT_PAYLOAD_TIMEOUT: Duration = Duration::from_millis(1000);

/// 图像接收完毕后，读取剩余诊断文本的超时。
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// 打开串口后等待开发板复位的时间。
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// 未指定输出路径时使用的文件名。
pub const DEFAULT_OUTPUT_FILE: &str = "fingerprint.bmp";
