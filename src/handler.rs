//! # 命令处理逻辑模块
//!
//! 包含处理 `capture`、`ports` 和 `inspect` 子命令的高级业务逻辑。
//! 本模块负责把命令行参数转换为采集配置、调用采集会话以及向用户报告结果。

use crate::bitmap::HeaderFields;
use crate::cli::{CaptureArgs, InspectArgs};
use crate::config::CaptureConfig;
use crate::constants::DEFAULT_OUTPUT_FILE;
use crate::diagnostics::ConsoleDiagnostics;
use crate::session::CaptureSession;
use anyhow::{Context, Result};
use colored::Colorize;
use serialport::SerialPortType;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 处理 'Capture' 命令的执行逻辑。
///
/// 检查输出路径、打开串口、等待设备发送起始标记，然后接收图像数据并写入
/// BMP 文件。设备发送的文本会实时打印出来。按下 Ctrl-C 会中止采集。
///
/// # Arguments
///
/// * `args` - 包含串口设置和输出路径的 `CaptureArgs` 结构体。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 输出文件已存在且未指定 `--force`。
/// * 串口无法打开。
/// * 接收图像数据超时，或串口、输出文件读写失败。
/// * 操作员中止了采集。
pub fn handle_capture(args: CaptureArgs) -> Result<()> {
    let output = resolve_output_path(args.output.clone());

    anyhow::ensure!(
        args.force || !output.exists(),
        "Output file already exists: {}. \nUse --force to overwrite it.",
        output.to_string_lossy().red().bold()
    );

    let session = CaptureSession::new(capture_config(&args));
    install_ctrlc_handler(session.cancel_handle());

    println!(
        "Waiting for the sensor on {} at {} baud...",
        args.port.green().bold(),
        args.baud_rate.to_string().green()
    );

    if let Err(e) = session.capture(&output, &mut ConsoleDiagnostics) {
        println!("{}", "Image extraction failed!".red().bold());
        return Err(e).with_context(|| {
            format!(
                "Failed to capture a fingerprint image into {}",
                output.to_string_lossy().red().bold()
            )
        });
    }

    println!(
        "The fingerprint image has been successfully saved: {}",
        output.to_string_lossy().green().bold()
    );

    Ok(())
}

/// 根据命令行参数构造采集配置。
pub fn capture_config(args: &CaptureArgs) -> CaptureConfig {
    let mut config = CaptureConfig::new(args.port.clone(), args.baud_rate);
    config.settle_delay = Duration::from_millis(args.settle_ms);
    config.include_palette = !args.no_palette;
    config.framing.start_marker = args.marker;
    config.framing.expansion = args.expansion;
    config.framing.payload_timeout = Duration::from_millis(args.payload_timeout_ms);
    config
}

/// 未指定输出路径时使用默认文件名；没有扩展名时补上 `.bmp`。
pub fn resolve_output_path(output: Option<PathBuf>) -> PathBuf {
    let path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE));
    if path.extension().is_none() {
        path.with_extension("bmp")
    } else {
        path
    }
}

fn install_ctrlc_handler(cancel: Arc<AtomicBool>) {
    if let Err(err) = ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %err, "signal handler setup failed");
    }
}

/// 处理 'Ports' 命令的执行逻辑：列出本机可用的串口。
///
/// # Errors
///
/// 无法枚举串口时返回错误。
pub fn handle_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Unable to enumerate serial ports")?;

    if ports.is_empty() {
        println!("{}", "No serial ports found.".yellow());
        return Ok(());
    }

    for port in ports {
        let kind = match port.port_type {
            SerialPortType::UsbPort(info) => format!(
                "USB {:04x}:{:04x} {}",
                info.vid,
                info.pid,
                info.product.unwrap_or_default()
            ),
            SerialPortType::PciPort => "PCI".to_string(),
            SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            SerialPortType::Unknown => "Unknown".to_string(),
        };
        println!("{}  {}", port.port_name.green().bold(), kind);
    }

    Ok(())
}

/// 位图检查结果。
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapReport {
    pub fields: HeaderFields,
    pub actual_size: usize,
    pub width: u32,
    pub height: u32,
    pub mean_intensity: f64,
}

/// 校验位图头与文件实际大小是否一致，并用 `image` 解码整幅图像。
///
/// # Errors
///
/// 位图头无效、字段与实际字节数不符，或解码失败时返回错误。
pub fn inspect_bitmap(bytes: &[u8]) -> Result<BitmapReport> {
    let fields = HeaderFields::parse(bytes).context("Invalid bitmap header")?;
    let actual_size = bytes.len();

    anyhow::ensure!(
        fields.file_size as usize == actual_size,
        "File size field is {}, but the file is {} bytes long",
        fields.file_size.to_string().red().bold(),
        actual_size.to_string().green().bold()
    );
    let expected_size = fields
        .expected_image_size()
        .context("Bitmap dimensions do not describe a real raster")?;

    // BI_RGB 位图的像素数据大小字段允许为 0
    anyhow::ensure!(
        fields.image_size == 0 || fields.image_size as usize == expected_size,
        "Raster size field is {}, expected {}",
        fields.image_size.to_string().red().bold(),
        expected_size.to_string().green().bold()
    );
    anyhow::ensure!(
        (fields.raster_offset as usize).checked_add(expected_size) == Some(actual_size),
        "Raster at offset {} with {} bytes does not end at the end of the file",
        fields.raster_offset.to_string().red().bold(),
        expected_size.to_string().red().bold()
    );

    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Bmp)
        .context("A standard BMP decoder could not open the image")?
        .to_luma8();

    let pixels = decoded.as_raw();
    let mean_intensity = if pixels.is_empty() {
        0.0
    } else {
        pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64
    };

    Ok(BitmapReport {
        fields,
        actual_size,
        width: decoded.width(),
        height: decoded.height(),
        mean_intensity,
    })
}

/// 处理 'Inspect' 命令的执行逻辑。
///
/// # Errors
///
/// 无法读取文件或文件不是一致的位图时返回错误。
pub fn handle_inspect(args: InspectArgs) -> Result<()> {
    let bytes = fs::read(&args.image).with_context(|| {
        format!(
            "Unable to read image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    let report = inspect_bitmap(&bytes).with_context(|| {
        format!(
            "Inconsistent bitmap: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    print_report(&args.image, &report);
    Ok(())
}

fn print_report(path: &Path, report: &BitmapReport) {
    let fields = &report.fields;
    println!("{}", path.to_string_lossy().green().bold());
    println!("  file size     : {} bytes", fields.file_size);
    println!("  raster offset : {}", fields.raster_offset);
    println!(
        "  dimensions    : {} x {} ({:?})",
        fields.width,
        fields.height.unsigned_abs(),
        fields.row_order()
    );
    println!("  bit depth     : {}", fields.depth);
    println!("  raster size   : {} bytes", fields.image_size);
    println!(
        "  decoded       : {} x {}, mean intensity {:.1}",
        report.width, report.height, report.mean_intensity
    );
}
