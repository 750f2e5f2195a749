//! The UART driver contract consumed by [`SerialPort`](crate::SerialPort).
//!
//! A [`UartDevice`] is a claimed, already-open hardware handle exposing the
//! read/write/line-control primitives of a USB UART bridge. A
//! [`UartBackend`] resolves an opaque selector string into such a handle.
//!
//! The port core only talks to these traits, so it can be exercised against
//! mock devices in tests; [`FtdiUart`](crate::ftdi::FtdiUart) and
//! [`FtdiBackend`](crate::ftdi::FtdiBackend) are the hardware
//! implementations.

use crate::error::{Error, Result};
use crate::types::{DataBits, FlowControl, ModemStatus, Parity, StopBits};

/// A claimed hardware UART handle.
///
/// All operations forward directly to the device; none of them retry.
/// Implementations are not required to be thread-safe: the handle has a
/// single logical owner at a time.
pub trait UartDevice {
    /// Read available bytes into `buf`, returning the number read.
    ///
    /// Returns `Ok(0)` when the device currently has no data; it never
    /// blocks waiting for more than one driver-level transfer.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf` to the device, returning the number of bytes accepted.
    fn write_data(&mut self, buf: &[u8]) -> Result<usize>;

    /// Discard bytes buffered in the receive FIFO.
    fn purge_rx(&mut self) -> Result<()>;

    /// Discard bytes buffered in the transmit FIFO.
    fn purge_tx(&mut self) -> Result<()>;

    /// Set the baud rate.
    fn set_baudrate(&mut self, baudrate: u32) -> Result<()>;

    /// Set the serial line properties (data bits, stop bits, parity).
    fn set_line_property(
        &mut self,
        bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<()>;

    /// Set the flow control mode.
    fn set_flow_control(&mut self, flow: FlowControl) -> Result<()>;

    /// Assert or deassert the break condition.
    fn set_break(&mut self, on: bool) -> Result<()>;

    /// Set the RTS (Request To Send) line state.
    fn set_rts(&mut self, state: bool) -> Result<()>;

    /// Set the DTR (Data Terminal Ready) line state.
    fn set_dtr(&mut self, state: bool) -> Result<()>;

    /// Query the current modem status lines (CTS, DSR, RI, CD).
    fn modem_status(&mut self) -> Result<ModemStatus>;

    /// Hint the driver to adapt its latency timer to the traffic pattern.
    ///
    /// Optional capability: devices without it report
    /// [`Error::Unsupported`], which callers treat as absence rather than
    /// failure.
    fn set_dynamic_latency(
        &mut self,
        latency_ms: u8,
        write_ms: u16,
        read_ms: u16,
    ) -> Result<()> {
        let _ = (latency_ms, write_ms, read_ms);
        Err(Error::Unsupported("dynamic latency"))
    }

    /// The device's last error string, for diagnostics.
    fn error_string(&self) -> String {
        String::new()
    }

    /// Release the underlying hardware resources.
    fn close(&mut self) -> Result<()>;
}

/// Resolves a selector string into a live [`UartDevice`] handle.
pub trait UartBackend {
    /// The device handle type this backend produces.
    type Device: UartDevice;

    /// Resolve `selector` and claim the matching device.
    fn open(&self, selector: &str) -> Result<Self::Device>;
}
