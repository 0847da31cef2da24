//! # 位图组装模块
//!
//! 构造未压缩 BMP 文件的文件头、信息头和灰度调色板，并定义
//! 传感器数据字节到像素字节的展开规则。
//!
//! 所有多字节字段均为小端序。文件大小和像素数据偏移量总是根据
//! 实际写入的字节数计算得出。

use crate::constants::{
    BMP_HEADER_SIZE, INFO_HEADER_SIZE, PALETTE_ENTRY_SIZE, PIXELS_PER_METER,
};
use crate::error::BitmapError;
use clap::ValueEnum;

/// 带调色板的最大位深度；更高位深度的像素直接存储颜色。
const MAX_PALETTE_DEPTH: u16 = 8;

/// 像素行在文件中的存放顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// 从上到下，高度字段以负数存储。行按采集顺序写入，无需翻转。
    #[default]
    TopDown,
    /// BMP 默认的从下到上顺序，高度字段为正数。
    BottomUp,
}

/// 单个传感器数据字节展开为两个像素字节的方式。
///
/// 每个数据字节代表两个相邻像素。`Duplicate` 将原始字节写两次，
/// `HighNibble` 只保留高 4 位 (`& 0xF0`) 再写两次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExpansionRule {
    #[default]
    Duplicate,
    HighNibble,
}

impl ExpansionRule {
    pub fn expand(self, byte: u8) -> [u8; 2] {
        let pixel = match self {
            ExpansionRule::Duplicate => byte,
            ExpansionRule::HighNibble => byte & 0xF0,
        };
        [pixel, pixel]
    }
}

/// 每行像素数据的字节数，向上填充到 4 字节边界。
pub fn row_stride(width: u32, depth: u16) -> usize {
    (depth as usize * width as usize).div_ceil(32) * 4
}

/// 像素数据区的总字节数。
pub fn image_size(width: u32, height: u32, depth: u16) -> usize {
    row_stride(width, depth) * height as usize
}

/// 按文件中读到的字段计算像素数据区大小，溢出时返回 `None`。
pub fn checked_image_size(width: u32, height: u32, depth: u16) -> Option<usize> {
    let row_bits = u64::from(depth).checked_mul(u64::from(width))?;
    let stride = row_bits.div_ceil(32).checked_mul(4)?;
    let size = stride.checked_mul(u64::from(height))?;
    usize::try_from(size).ok()
}

/// 调色板的字节数；不包含调色板时为 0。
///
/// 只有位深度不超过 8 时才有调色板，更高位深度总是返回 0。
pub fn palette_size(depth: u16, include_palette: bool) -> usize {
    if include_palette && depth <= MAX_PALETTE_DEPTH {
        PALETTE_ENTRY_SIZE << depth
    } else {
        0
    }
}

/// 生成线性灰度调色板：第 `i` 个条目的四个字节都等于 `i`。
///
/// 位深度超过 8 时没有调色板，返回空序列。
pub fn grayscale_palette(depth: u16) -> Vec<u8> {
    if depth > MAX_PALETTE_DEPTH {
        return Vec::new();
    }
    let entries = 1usize << depth;
    (0..entries)
        .flat_map(|index| [index as u8; PALETTE_ENTRY_SIZE])
        .collect()
}

/// 构造 54 字节的位图头，必要时在其后附加灰度调色板。
///
/// 返回的字节序列后面接上恰好 [`image_size`] 字节的像素数据，
/// 即构成一个可直接打开的 BMP 文件。行顺序为从上到下。
pub fn build_header(width: u32, height: u32, depth: u16, include_palette: bool) -> Vec<u8> {
    BitmapHeader::new(width, height, depth)
        .with_palette(include_palette)
        .to_bytes()
}

/// 位图头的参数，以及由其派生的各项尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapHeader {
    pub width: u32,
    pub height: u32,
    pub depth: u16,
    pub include_palette: bool,
    pub row_order: RowOrder,
}

impl BitmapHeader {
    /// 位深度不超过 8 时默认附带调色板。
    pub fn new(width: u32, height: u32, depth: u16) -> Self {
        Self {
            width,
            height,
            depth,
            include_palette: depth <= MAX_PALETTE_DEPTH,
            row_order: RowOrder::default(),
        }
    }

    pub fn with_palette(mut self, include_palette: bool) -> Self {
        self.include_palette = include_palette;
        self
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    pub fn row_stride(&self) -> usize {
        row_stride(self.width, self.depth)
    }

    pub fn image_size(&self) -> usize {
        image_size(self.width, self.height, self.depth)
    }

    pub fn palette_size(&self) -> usize {
        palette_size(self.depth, self.include_palette)
    }

    /// 像素数据在文件中的起始偏移量。
    pub fn raster_offset(&self) -> usize {
        BMP_HEADER_SIZE + self.palette_size()
    }

    /// 完整文件的字节数。
    pub fn file_size(&self) -> usize {
        self.raster_offset() + self.image_size()
    }

    /// 序列化文件头、信息头和 (可选的) 调色板。
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.raster_offset());

        let stored_height = match self.row_order {
            RowOrder::TopDown => -(self.height as i32),
            RowOrder::BottomUp => self.height as i32,
        };

        // BITMAPFILEHEADER
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(self.file_size() as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(self.raster_offset() as u32).to_le_bytes());

        // BITMAPINFOHEADER
        out.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
        out.extend_from_slice(&(self.width as i32).to_le_bytes());
        out.extend_from_slice(&stored_height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&self.depth.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
        out.extend_from_slice(&(self.image_size() as u32).to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        if self.palette_size() > 0 {
            out.extend(grayscale_palette(self.depth));
        }

        out
    }
}

/// 从已有文件中读回的位图头字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub file_size: u32,
    pub raster_offset: u32,
    pub info_header_size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub depth: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_meter: u32,
    pub y_pixels_per_meter: u32,
    pub colors_used: u32,
    pub colors_important: u32,
}

impl HeaderFields {
    /// 解析 54 字节的位图头。仅支持 BITMAPINFOHEADER (40 字节)。
    pub fn parse(bytes: &[u8]) -> Result<Self, BitmapError> {
        if bytes.len() < BMP_HEADER_SIZE {
            return Err(BitmapError::TooShort {
                needed: BMP_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if &bytes[0..2] != b"BM" {
            return Err(BitmapError::BadSignature);
        }

        let u16_at = |off: usize| u16::from_le_bytes([bytes[off], bytes[off + 1]]);
        let u32_at = |off: usize| {
            u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
        };

        let info_header_size = u32_at(14);
        if info_header_size != INFO_HEADER_SIZE {
            return Err(BitmapError::UnsupportedInfoHeader(info_header_size));
        }

        Ok(Self {
            file_size: u32_at(2),
            raster_offset: u32_at(10),
            info_header_size,
            width: u32_at(18) as i32,
            height: u32_at(22) as i32,
            planes: u16_at(26),
            depth: u16_at(28),
            compression: u32_at(30),
            image_size: u32_at(34),
            x_pixels_per_meter: u32_at(38),
            y_pixels_per_meter: u32_at(42),
            colors_used: u32_at(46),
            colors_important: u32_at(50),
        })
    }

    pub fn row_order(&self) -> RowOrder {
        if self.height < 0 {
            RowOrder::TopDown
        } else {
            RowOrder::BottomUp
        }
    }

    /// 按宽度、高度和位深度计算出的像素数据字节数。
    pub fn expected_image_size(&self) -> Result<usize, BitmapError> {
        let width = self.width.unsigned_abs();
        let height = self.height.unsigned_abs();
        checked_image_size(width, height, self.depth).ok_or(
            BitmapError::ImplausibleDimensions {
                width,
                height,
                depth: self.depth,
            },
        )
    }
}
