use fpgrab::{
    bitmap::{HeaderFields, build_header},
    cli::CaptureArgs,
    config::CaptureConfig,
    constants::DEFAULT_START_MARKER,
    diagnostics::CollectedDiagnostics,
    error::{BitmapError, CaptureError},
    handler::{handle_capture, inspect_bitmap, resolve_output_path},
    session::CaptureSession,
    stream::ByteStream,
};
use rand::RngCore;
use std::collections::VecDeque;
use std::fs;
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

const PAYLOAD_BYTES: usize = 36_864;
const FULL_FILE_SIZE: usize = 74_806;
const RASTER_OFFSET: usize = 1078;

/// 模拟串口：依次返回预设字节，之后一直超时
struct FakeSensor {
    data: VecDeque<u8>,
}

impl FakeSensor {
    fn new(prefix: &[u8], payload: &[u8], suffix: &[u8]) -> Self {
        let mut data = VecDeque::new();
        data.extend(prefix);
        data.push_back(DEFAULT_START_MARKER);
        data.extend(payload);
        data.extend(suffix);
        Self { data }
    }
}

impl Read for FakeSensor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.pop_front() {
            Some(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            None => Err(io::Error::from(ErrorKind::TimedOut)),
        }
    }
}

impl ByteStream for FakeSensor {
    fn set_inactivity_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// 一个辅助函数，用于生成随机的传感器数据
fn random_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    rand::rng().fill_bytes(&mut payload);
    payload
}

fn test_session() -> CaptureSession {
    let mut config = CaptureConfig::new("fake", 57600);
    config.settle_delay = Duration::ZERO;
    CaptureSession::new(config)
}

fn capture_args(port: &str, output: PathBuf, force: bool) -> CaptureArgs {
    CaptureArgs {
        port: port.to_string(),
        baud_rate: 57600,
        output: Some(output),
        force,
        marker: DEFAULT_START_MARKER,
        expansion: Default::default(),
        payload_timeout_ms: 100,
        settle_ms: 0,
        no_palette: false,
    }
}

/// 验证完整的采集流程，并用标准 BMP 解码器打开结果
#[test]
fn test_capture_full_image_integration() -> anyhow::Result<()> {
    // 1. 准备环境
    let dir = tempdir()?;
    let output = dir.path().join("print.bmp");
    let payload = random_payload(PAYLOAD_BYTES);
    let sensor = FakeSensor::new(
        b"Found fingerprint sensor!\r\nWaiting for valid finger...\r\n",
        &payload,
        b"Image transferred.\r\n",
    );

    // 2. 执行采集
    let mut diag = CollectedDiagnostics::default();
    let summary = test_session().capture_from(sensor, &output, &mut diag)?;
    assert_eq!(summary.payload_bytes, PAYLOAD_BYTES);
    assert_eq!(summary.raster_bytes, PAYLOAD_BYTES * 2);

    // 3. 验证文件结构
    let bytes = fs::read(&output)?;
    assert_eq!(bytes.len(), FULL_FILE_SIZE);
    let fields = HeaderFields::parse(&bytes)?;
    assert_eq!(fields.file_size as usize, bytes.len());
    assert_eq!(fields.raster_offset as usize, RASTER_OFFSET);
    assert_eq!(fields.height, -288);

    let raster = &bytes[RASTER_OFFSET..];
    for (i, pair) in raster.chunks_exact(2).enumerate() {
        assert_eq!(pair, [payload[i], payload[i]]);
    }

    // 4. 验证诊断输出
    assert_eq!(
        diag.text,
        "Found fingerprint sensor!\r\nWaiting for valid finger...\r\nImage transferred.\r\n"
    );
    assert_eq!(
        diag.statuses.last().map(String::as_str),
        Some(format!("[Image saved to {}]", output.display()).as_str())
    );

    // 5. 用 image 解码，行顺序应与采集顺序一致
    let decoded = image::open(&output)?.to_rgb8();
    assert_eq!((decoded.width(), decoded.height()), (256, 288));
    for (x, y) in [(0u32, 0u32), (1, 0), (255, 0), (0, 1), (128, 144), (255, 287)] {
        let expected = payload[(y as usize * 256 + x as usize) / 2];
        assert_eq!(decoded.get_pixel(x, y).0, [expected; 3]);
    }

    let report = inspect_bitmap(&bytes)?;
    assert_eq!((report.width, report.height), (256, 288));

    Ok(())
}

/// 验证图像数据中途中断时返回超时错误，并保留部分写入的文件
#[test]
fn test_capture_timeout_keeps_partial_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("partial.bmp");
    let sensor = FakeSensor::new(b"Found fingerprint sensor!\r\n", &random_payload(100), b"");

    let mut diag = CollectedDiagnostics::default();
    let result = test_session().capture_from(sensor, &output, &mut diag);

    assert!(matches!(
        result,
        Err(CaptureError::Timeout {
            received: 100,
            expected: PAYLOAD_BYTES
        })
    ));

    let bytes = fs::read(&output)?;
    assert_eq!(bytes.len(), RASTER_OFFSET + 200);
    assert!(bytes.len() < FULL_FILE_SIZE);
    assert!(
        diag.statuses
            .last()
            .is_some_and(|line| line.contains("timed out"))
    );

    // 部分文件与文件头声明的大小不符
    let err = inspect_bitmap(&bytes).unwrap_err();
    assert!(err.to_string().contains("File size field"));

    Ok(())
}

/// 验证不写调色板时的文件布局
#[test]
fn test_capture_without_palette() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("plain.bmp");
    let sensor = FakeSensor::new(b"", &random_payload(PAYLOAD_BYTES), b"");

    let mut config = CaptureConfig::new("fake", 57600);
    config.settle_delay = Duration::ZERO;
    config.include_palette = false;
    let session = CaptureSession::new(config);

    session.capture_from(sensor, &output, &mut CollectedDiagnostics::default())?;

    let bytes = fs::read(&output)?;
    let fields = HeaderFields::parse(&bytes)?;
    assert_eq!(bytes.len(), 54 + 73_728);
    assert_eq!(fields.raster_offset, 54);
    assert_eq!(fields.file_size as usize, bytes.len());

    Ok(())
}

/// 验证取消标志会中止等待起始标记的会话
#[test]
fn test_cancelled_session_reports_interrupt() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("cancelled.bmp");
    let session = test_session();
    session
        .cancel_handle()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let sensor = FakeSensor {
        data: VecDeque::from(b"no marker here".to_vec()),
    };
    let mut diag = CollectedDiagnostics::default();
    let result = session.capture_from(sensor, &output, &mut diag);

    assert!(matches!(result, Err(CaptureError::Interrupted)));
    assert_eq!(
        diag.statuses.last().map(String::as_str),
        Some("Capture interrupted by operator")
    );

    Ok(())
}

/// 验证覆盖保护机制
#[test]
fn test_overwrite_protection() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("existing.bmp");
    fs::write(&output, "this is a dummy file that must survive")?;

    let result = handle_capture(capture_args("fake", output.clone(), false));
    assert!(result.is_err(), "Execution should fail without --force when file exists.");
    if let Err(e) = result {
        assert!(e.to_string().contains("Output file already exists"));
    }

    assert_eq!(
        fs::read(&output)?,
        b"this is a dummy file that must survive"
    );

    Ok(())
}

/// 验证串口无法打开时不会创建输出文件
#[test]
fn test_unavailable_port_creates_no_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("never.bmp");
    let missing_port = dir.path().join("no-such-port");

    let mut config = CaptureConfig::new(missing_port.to_string_lossy(), 57600);
    config.settle_delay = Duration::ZERO;
    let session = CaptureSession::new(config);

    let mut diag = CollectedDiagnostics::default();
    let result = session.capture(&output, &mut diag);

    assert!(matches!(result, Err(CaptureError::PortUnavailable { .. })));
    assert!(
        diag.statuses
            .last()
            .is_some_and(|line| line.contains("Port open failed"))
    );
    assert!(!output.exists());

    Ok(())
}

/// 验证尺寸字段溢出的位图头会被拒绝，而不是导致崩溃
#[test]
fn test_inspect_rejects_oversized_dimensions() {
    let mut bytes = build_header(4, 4, 8, false);
    bytes[2..6].copy_from_slice(&54u32.to_le_bytes());
    bytes[18..22].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());
    bytes[22..26].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());
    bytes[28..30].copy_from_slice(&0xffffu16.to_le_bytes());

    let err = inspect_bitmap(&bytes).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BitmapError>(),
        Some(BitmapError::ImplausibleDimensions { .. })
    ));
}

/// 验证像素数据大小字段为 0 的未压缩位图可以通过检查
#[test]
fn test_inspect_accepts_zero_raster_size_field() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("zero.bmp");
    let sensor = FakeSensor::new(b"", &random_payload(PAYLOAD_BYTES), b"");
    test_session().capture_from(sensor, &output, &mut CollectedDiagnostics::default())?;

    let mut bytes = fs::read(&output)?;
    bytes[34..38].copy_from_slice(&0u32.to_le_bytes());

    let report = inspect_bitmap(&bytes)?;
    assert_eq!(report.fields.image_size, 0);
    assert_eq!((report.width, report.height), (256, 288));

    Ok(())
}

/// 验证默认输出路径和扩展名补全
#[test]
fn test_resolve_output_path() {
    assert_eq!(resolve_output_path(None), PathBuf::from("fingerprint.bmp"));
    assert_eq!(
        resolve_output_path(Some(PathBuf::from("prints/left"))),
        PathBuf::from("prints/left.bmp")
    );
    assert_eq!(
        resolve_output_path(Some(PathBuf::from("scan.bmp"))),
        PathBuf::from("scan.bmp")
    );
}
