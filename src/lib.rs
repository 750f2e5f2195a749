//! Blocking serial port interface for FTDI USB UART bridges.
//!
//! This crate adapts FTDI USB-to-serial converter chips (FT232R, FT2232H,
//! FT4232H, FT232H, FT230X families) to a conventional serial-port
//! interface: open by selector URL, configure baud rate and line
//! properties, then blocking read/write with an optional timeout. It uses
//! [nusb](https://crates.io/crates/nusb) as the USB backend, with no C
//! dependencies or `libusb` required.
//!
//! # Quick Start
//!
//! ```no_run
//! use ftdi_serial::SerialPort;
//! use std::time::Duration;
//!
//! // First interface of the first FT232R connected
//! let mut port = SerialPort::new("ftdi://0x403:0x6001/1");
//! port.set_baud_rate(115200)?;
//! port.set_timeout(Some(Duration::from_secs(1)));
//! port.open()?;
//!
//! port.write(b"Hello from Rust!\r\n")?;
//! let reply = port.read(64)?;
//! println!("got {} bytes", reply.len());
//! # Ok::<(), ftdi_serial::Error>(())
//! ```
//!
//! # Structure
//!
//! - [`SerialPort`]: the blocking port. Lifecycle, configuration, the
//!   polling read loop, modem control lines. Also usable through
//!   [`std::io::Read`] / [`std::io::Write`].
//! - [`uart`]: the driver contract the port consumes, so the port logic
//!   runs against mock devices in tests.
//! - [`ftdi`]: the hardware backend. Selector URL resolution, chip
//!   detection, vendor control requests and bulk transfers over `nusb`.
//!
//! The port performs no buffering or protocol work of its own: every
//! operation forwards to the driver, and recovery policy stays with the
//! caller.

pub mod error;
pub mod ftdi;
pub mod port;
pub mod types;
pub mod uart;

// ---- Convenience re-exports ----

pub use error::{Error, Result};
pub use ftdi::{FtdiBackend, FtdiUart};
pub use port::SerialPort;
pub use types::{DataBits, FlowControl, ModemStatus, Parity, StopBits};
pub use uart::{UartBackend, UartDevice};
