//! # Serial links
//!
//! The tuning protocol needs very little from its transport: non-blocking
//! single byte reads and whole-buffer writes. [`SerialLink`] captures that so
//! the control loop can be driven by a real UART ([`SerialPortLink`]) or an
//! in-memory queue ([`MemLink`]).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use log::info;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Symbol rate of both the tuning and the diagnostic channel.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Upper bound on the bytes taken by one [`SerialLink::drain`] call, so a
/// chattering link can't hold up a control cycle.
pub const MAX_DRAIN_LEN: usize = 256;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A byte oriented, full duplex link.
pub trait SerialLink {
    /// Read a single byte if one is waiting. Never blocks.
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError>;

    /// Write the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError>;

    /// Take every byte currently waiting, up to [`MAX_DRAIN_LEN`].
    ///
    /// Returns `None` if nothing was waiting.
    fn drain(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        let mut buf = Vec::new();

        while buf.len() < MAX_DRAIN_LEN {
            match self.read_byte()? {
                Some(b) => buf.push(b),
                None => break,
            }
        }

        if buf.is_empty() {
            Ok(None)
        } else {
            Ok(Some(buf))
        }
    }

    /// Discard bytes until `target` is read, leaving anything after it queued.
    ///
    /// Returns `true` if `target` was found.
    fn skip_until(&mut self, target: u8) -> Result<bool, SerialError> {
        while let Some(b) = self.read_byte()? {
            if b == target {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Link over a hardware (or USB) UART.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

/// Link backed by in-memory queues.
///
/// Bytes pushed with [`MemLink::push_inbound`] are read by the owner, bytes
/// the owner writes are collected for [`MemLink::take_outbound`].
#[derive(Debug, Default)]
pub struct MemLink {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Could not open the serial port: {0}")]
    OpenError(serialport::Error),

    #[error("Could not query the serial port: {0}")]
    PortError(serialport::Error),

    #[error("Serial I/O error: {0}")]
    IoError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SerialPortLink {
    /// Open the port at `path` as 8N1 with no flow control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(SerialError::OpenError)?;

        info!("Opened serial port {} at {} baud", path, baud_rate);

        Ok(Self { port })
    }
}

impl SerialLink for SerialPortLink {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        if self.port.bytes_to_read().map_err(SerialError::PortError)? == 0 {
            return Ok(None);
        }

        let mut b = [0u8; 1];
        match self.port.read(&mut b) {
            Ok(1) => Ok(Some(b[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(SerialError::IoError(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(data).map_err(SerialError::IoError)?;
        self.port.flush().map_err(SerialError::IoError)
    }
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        (**self).read_byte()
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(data)
    }
}

impl MemLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the owner of the link to read.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.extend(data.iter().copied());
    }

    /// Number of inbound bytes not yet read.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Take everything written so far.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Take everything written so far as text, replacing invalid UTF-8.
    pub fn take_outbound_string(&mut self) -> String {
        String::from_utf8_lossy(&self.take_outbound()).into_owned()
    }
}

impl SerialLink for MemLink {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        Ok(self.inbound.pop_front())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.outbound.extend_from_slice(data);
        Ok(())
    }
}
