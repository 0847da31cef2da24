use serialport::SerialPort;
use std::io::{self, ErrorKind, Read};
use std::time::Duration;

/// 可逐字节读取、并能调整不活动超时的字节流。
///
/// 超时内没有数据时，`read` 应返回 `Ok(0)` 或 `ErrorKind::TimedOut` 错误。
pub trait ByteStream: Read {
    fn set_inactivity_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl ByteStream for Box<dyn SerialPort> {
    fn set_inactivity_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout).map_err(io::Error::from)
    }
}

/// 读取单个字节。超时内没有数据时返回 `Ok(None)`。
pub fn read_byte<S: ByteStream + ?Sized>(stream: &mut S) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
