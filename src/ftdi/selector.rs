//! Device selector URL parsing.
//!
//! A port selector is a URL in the pyftdi style:
//!
//! ```text
//! ftdi://[vendor[:product[:serial|index]]]/<interface>
//! ```
//!
//! All authority fields are optional: the vendor defaults to the FTDI
//! vendor ID, an omitted product matches any known FTDI UART product, and
//! the third field selects a specific board either by its USB serial number
//! string or, when it is all digits, by its position among the matching
//! devices (0-based). The trailing interface number (1-4) picks the port
//! on multi-interface chips.
//!
//! Examples: `ftdi:///1`, `ftdi://0x403:0x6010/2`,
//! `ftdi://:ft232h:FT0ABC12/1`.

use std::str::FromStr;

use super::constants::{pid, FTDI_VID};
use super::Interface;
use crate::error::Error;

/// A parsed device selector: filter criteria plus interface choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// USB vendor ID to match.
    pub vendor_id: u16,
    /// USB product ID to match; `None` matches any known FTDI product.
    pub product_id: Option<u16>,
    /// USB serial number string to match.
    pub serial: Option<String>,
    /// Select the Nth matching device (0-based).
    pub index: usize,
    /// The chip interface (port) to claim.
    pub interface: Interface,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            vendor_id: FTDI_VID,
            product_id: None,
            serial: None,
            index: 0,
            interface: Interface::Any,
        }
    }
}

/// Whether `pid` is one of the known FTDI UART product IDs.
pub(crate) fn is_known_pid(product: u16) -> bool {
    matches!(
        product,
        pid::FT232 | pid::FT2232 | pid::FT4232 | pid::FT232H | pid::FT230X
    )
}

/// Parse a hex field with optional `0x` prefix.
fn parse_hex(field: &str) -> Option<u16> {
    let digits = field.strip_prefix("0x").unwrap_or(field);
    u16::from_str_radix(digits, 16).ok()
}

fn parse_vendor(field: &str) -> Option<u16> {
    match field {
        "ftdi" => Some(FTDI_VID),
        _ => parse_hex(field),
    }
}

fn parse_product(field: &str) -> Option<u16> {
    match field {
        "ft232" | "232" => Some(pid::FT232),
        "ft2232" | "2232" => Some(pid::FT2232),
        "ft4232" | "4232" => Some(pid::FT4232),
        "ft232h" | "232h" => Some(pid::FT232H),
        "ft230x" | "230x" => Some(pid::FT230X),
        _ => parse_hex(field),
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidSelector(url.to_string());

        let rest = url.strip_prefix("ftdi://").ok_or_else(invalid)?;
        let (authority, iface) = rest.split_once('/').ok_or_else(invalid)?;

        let interface = match iface {
            "" => Interface::Any,
            "1" => Interface::A,
            "2" => Interface::B,
            "3" => Interface::C,
            "4" => Interface::D,
            _ => return Err(invalid()),
        };

        let mut selector = Selector {
            interface,
            ..Selector::default()
        };

        let mut fields = authority.splitn(3, ':');

        if let Some(vendor) = fields.next().filter(|f| !f.is_empty()) {
            selector.vendor_id = parse_vendor(vendor).ok_or_else(invalid)?;
        }
        if let Some(product) = fields.next().filter(|f| !f.is_empty()) {
            selector.product_id = Some(parse_product(product).ok_or_else(invalid)?);
        }
        if let Some(which) = fields.next().filter(|f| !f.is_empty()) {
            // All digits selects by position, anything else by serial number
            if which.bytes().all(|b| b.is_ascii_digit()) {
                selector.index = which.parse().map_err(|_| invalid())?;
            } else {
                selector.serial = Some(which.to_string());
            }
        }

        Ok(selector)
    }
}
