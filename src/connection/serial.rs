//! `serialport`-backed link (8N1, no flow control).

use async_trait::async_trait;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{self, BufRead, BufReader, Write};
use tracing::error;

use super::{LinkError, LinkOpener, LinkSettings, SerialLink};

/// Longest record kept while waiting for its newline.
pub const MAX_RECORD_LEN: usize = 1024;

/// `EIO`, returned by tty drivers once the device is unplugged.
const EIO: i32 = 5;

/// Open serial device with a line buffer.
///
/// Bytes of a record that has not finished arriving when the read timeout
/// fires are kept and completed on the next read. A record longer than
/// [`MAX_RECORD_LEN`] is discarded up to and including its newline.
pub struct SerialPortLink {
    reader: BufReader<Box<dyn SerialPort>>,
    pending: Vec<u8>,
    /// Skipping the rest of an oversized record
    overflowed: bool,
    name: String,
}

impl SerialPortLink {
    pub fn new(port: Box<dyn SerialPort>, name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(port),
            pending: Vec::with_capacity(128),
            overflowed: false,
            name: name.into(),
        }
    }

    fn read_blocking(&mut self) -> Result<Option<String>, LinkError> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok([]) => {
                    return Err(LinkError::Disconnected(format!("{}: end of stream", self.name)))
                }
                Ok(buf) => buf,
                Err(e) if is_transient(&e) => return Ok(None),
                Err(e) => return Err(LinkError::Disconnected(format!("{}: {e}", self.name))),
            };

            let newline = available.iter().position(|&b| b == b'\n');
            let take = newline.map_or(available.len(), |i| i + 1);
            if !self.overflowed {
                self.pending.extend_from_slice(&available[..take]);
            }
            self.reader.consume(take);

            if self.pending.len() > MAX_RECORD_LEN {
                error!(
                    port = %self.name,
                    limit = MAX_RECORD_LEN,
                    "Record exceeds length limit without newline, discarding"
                );
                self.pending.clear();
                self.overflowed = true;
            }

            if newline.is_some() {
                if std::mem::take(&mut self.overflowed) {
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                return Ok((!line.is_empty()).then_some(line));
            }
        }
    }

    fn write_blocking(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let port = self.reader.get_mut();
        port.write_all(frame)
            .and_then(|()| port.flush())
            .map_err(|e| {
                if is_disconnect(&e) {
                    LinkError::Disconnected(format!("{}: {e}", self.name))
                } else {
                    LinkError::Write(e.to_string())
                }
            })
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
    ) || (cfg!(unix) && e.raw_os_error() == Some(EIO))
}

#[async_trait]
impl SerialLink for SerialPortLink {
    fn has_data(&mut self) -> Result<bool, LinkError> {
        if !self.reader.buffer().is_empty() {
            return Ok(true);
        }
        let waiting = self
            .reader
            .get_ref()
            .bytes_to_read()
            .map_err(|e| LinkError::Disconnected(format!("{}: {e}", self.name)))?;
        Ok(waiting > 0)
    }

    async fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        // Bounded by the port's read timeout
        tokio::task::block_in_place(|| self.read_blocking())
    }

    async fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
        let mut frame = text.as_bytes().to_vec();
        if !text.ends_with('\n') {
            frame.push(b'\n');
        }
        tokio::task::block_in_place(|| self.write_blocking(&frame))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Production opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortOpener;

impl LinkOpener for SerialPortOpener {
    fn open(&self, settings: &LinkSettings) -> Result<Box<dyn SerialLink>, LinkError> {
        let port = serialport::new(settings.port.as_str(), settings.baud_rate)
            .timeout(settings.read_timeout)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| LinkError::Open {
                port: settings.port.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(SerialPortLink::new(port, settings.port.clone())))
    }
}

/// Available serial devices as `(path, description)` pairs.
pub fn list_ports() -> Result<Vec<(String, String)>, serialport::Error> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb.product.unwrap_or_else(|| "USB serial".to_string());
                    format!("{product} ({:04x}:{:04x})", usb.vid, usb.pid)
                }
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            };
            (p.port_name, description)
        })
        .collect())
}
