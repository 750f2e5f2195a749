//! FTDI vendor protocol constants.
//!
//! USB vendor request codes and register values for the subset of the FTDI
//! protocol a serial port needs: reset/purge, line configuration, flow
//! control, modem lines and the latency timer.

/// Default FTDI vendor ID.
pub const FTDI_VID: u16 = 0x0403;

/// Known FTDI product IDs.
pub mod pid {
    /// FT232AM, FT232BM, FT232R.
    pub const FT232: u16 = 0x6001;
    /// FT2232C/D/H.
    pub const FT2232: u16 = 0x6010;
    /// FT4232H.
    pub const FT4232: u16 = 0x6011;
    /// FT232H.
    pub const FT232H: u16 = 0x6014;
    /// FT230X.
    pub const FT230X: u16 = 0x6015;
}

// ---- SIO vendor request codes ----

/// Reset the port / purge FIFOs.
pub(crate) const SIO_RESET_REQUEST: u8 = 0x00;
/// Set the modem control register.
pub(crate) const SIO_SET_MODEM_CTRL_REQUEST: u8 = 0x01;
/// Set flow control register.
pub(crate) const SIO_SET_FLOW_CTRL_REQUEST: u8 = 0x02;
/// Set baud rate.
pub(crate) const SIO_SET_BAUDRATE_REQUEST: u8 = 0x03;
/// Set data characteristics (bits, parity, stop, break).
pub(crate) const SIO_SET_DATA_REQUEST: u8 = 0x04;
/// Poll modem status.
pub(crate) const SIO_POLL_MODEM_STATUS_REQUEST: u8 = 0x05;
/// Set latency timer.
pub(crate) const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;

// ---- Reset sub-commands ----

/// SIO reset (device reset).
pub(crate) const SIO_RESET_SIO: u16 = 0;
/// Flush RX FIFO (chip -> host direction).
pub(crate) const SIO_TCIFLUSH: u16 = 2;
/// Flush TX FIFO (host -> chip direction).
pub(crate) const SIO_TCOFLUSH: u16 = 1;

// ---- Flow control values ----

/// Disable flow control.
pub(crate) const SIO_DISABLE_FLOW_CTRL: u16 = 0x0;
/// RTS/CTS hardware flow control.
pub(crate) const SIO_RTS_CTS_HS: u16 = 0x1 << 8;
/// XON/XOFF software flow control.
pub(crate) const SIO_XON_XOFF_HS: u16 = 0x4 << 8;

// ---- Modem control line values ----

/// Set DTR high.
pub(crate) const SIO_SET_DTR_HIGH: u16 = 1 | (0x1 << 8);
/// Set DTR low.
pub(crate) const SIO_SET_DTR_LOW: u16 = 0x1 << 8;
/// Set RTS high.
pub(crate) const SIO_SET_RTS_HIGH: u16 = 2 | (0x2 << 8);
/// Set RTS low.
pub(crate) const SIO_SET_RTS_LOW: u16 = 0x2 << 8;

// ---- Default XON/XOFF characters (DC1 / DC3) ----

/// XON: resume transmission.
pub(crate) const XON_CHAR: u8 = 0x11;
/// XOFF: pause transmission.
pub(crate) const XOFF_CHAR: u8 = 0x13;

// ---- Clock constants for baud rate calculation ----

/// H-type clock: 120 MHz.
pub(crate) const H_CLK: u32 = 120_000_000;
/// Standard clock: 48 MHz.
pub(crate) const C_CLK: u32 = 48_000_000;
