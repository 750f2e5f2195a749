//! Serial line configuration types and modem status.
//!
//! These types model the standard serial parameters a port carries: data
//! bits, stop bits, parity, flow control, plus the modem status lines the
//! FTDI chip reports back.

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

impl DataBits {
    /// Wire encoding for the SIO_SET_DATA request.
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 1.5 stop bits.
    OnePointFive,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Wire encoding for the SIO_SET_DATA request.
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::One => 0x00,
            Self::OnePointFive => 0x01,
            Self::Two => 0x02,
        }
    }
}

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
    /// Mark parity (always 1).
    Mark,
    /// Space parity (always 0).
    Space,
}

impl Parity {
    /// Wire encoding for the SIO_SET_DATA request.
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::None => 0x00,
            Self::Odd => 0x01,
            Self::Even => 0x02,
            Self::Mark => 0x03,
            Self::Space => 0x04,
        }
    }
}

/// Flow control mode.
///
/// The three modes are mutually exclusive. When a port has both the
/// hardware and software flow-control flags set, hardware wins
/// (see [`SerialPort`](crate::SerialPort)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    Disabled,
    /// Hardware RTS/CTS flow control.
    RtsCts,
    /// Software XON/XOFF flow control.
    XonXoff,
}

/// Decoded modem status lines.
///
/// The FTDI chip reports two status bytes with every bulk read and on the
/// modem-status poll request. Only the modem line bits from the first byte
/// are of interest to a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemStatus {
    raw: u16,
}

impl ModemStatus {
    /// Create from the raw two-byte status value.
    pub fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Raw 16-bit status value.
    pub fn raw(self) -> u16 {
        self.raw
    }

    /// Clear To Send (CTS) is active.
    pub fn cts(self) -> bool {
        self.raw & 0x10 != 0
    }

    /// Data Set Ready (DSR) is active.
    pub fn dsr(self) -> bool {
        self.raw & 0x20 != 0
    }

    /// Ring Indicator (RI) is active.
    pub fn ri(self) -> bool {
        self.raw & 0x40 != 0
    }

    /// Carrier Detect (CD / RLSD) is active.
    pub fn cd(self) -> bool {
        self.raw & 0x80 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modem_status_bits() {
        let status = ModemStatus::from_raw(0x10 | 0x40);
        assert!(status.cts());
        assert!(!status.dsr());
        assert!(status.ri());
        assert!(!status.cd());
    }

    #[test]
    fn line_property_defaults_are_8n1() {
        assert_eq!(DataBits::default(), DataBits::Eight);
        assert_eq!(StopBits::default(), StopBits::One);
        assert_eq!(Parity::default(), Parity::None);
        assert_eq!(FlowControl::default(), FlowControl::Disabled);
    }
}
