//! Baud rate encoding for FTDI chips.
//!
//! FTDI chips derive the baud rate from a fractional clock divider whose
//! encoding differs between chip generations: AM parts run a 24 MHz clock
//! with limited fractional support, BM-generation parts a 48 MHz clock with
//! a 16x predivisor and 3 fractional bits, and H-type parts can switch to a
//! 120 MHz clock.

use super::constants::{C_CLK, H_CLK};
use super::ChipType;

/// Encoded divider for the SIO_SET_BAUDRATE request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BaudDivisor {
    /// The nearest achievable baud rate.
    pub actual: u32,
    /// The request `value` field.
    pub value: u16,
    /// The request `index` field.
    pub index: u16,
}

/// Maps a 3-bit sub-divisor to the FTDI fractional encoding.
const FRAC_CODE: [u32; 8] = [0, 3, 2, 4, 1, 5, 6, 7];

/// AM-generation round-down adjustments for unsupported fractions.
const AM_ADJUST_DN: [i32; 8] = [0, 0, 0, 1, 0, 3, 2, 1];
/// AM-generation round-up adjustments for unsupported fractions.
const AM_ADJUST_UP: [i32; 8] = [0, 0, 0, 1, 0, 1, 2, 3];

/// Encoded divider and achievable rate for AM-generation chips (24 MHz
/// clock, partial fractional divisor support).
fn am_divisor(baudrate: u32) -> (u32, u64) {
    let baudrate = baudrate as i32;
    let mut divisor = 24_000_000 / baudrate;

    // Round down to a fraction the AM silicon supports
    divisor -= AM_ADJUST_DN[(divisor & 7) as usize];

    let mut best_divisor = 0i32;
    let mut best_baud = 0i32;
    let mut best_diff = 0i32;

    for i in 0..2 {
        let mut candidate = divisor + i;

        if candidate <= 8 {
            candidate = 8;
        } else if divisor < 16 {
            // Divisors 9..=15 do not exist on AM parts
            candidate = 16;
        } else {
            candidate += AM_ADJUST_UP[(candidate & 7) as usize];
            if candidate > 0x1FFF8 {
                candidate = 0x1FFF8;
            }
        }

        let estimate = (24_000_000 + (candidate / 2)) / candidate;
        let diff = (estimate - baudrate).abs();

        if i == 0 || diff < best_diff {
            best_divisor = candidate;
            best_baud = estimate;
            best_diff = diff;
            if diff == 0 {
                break;
            }
        }
    }

    let mut encoded =
        ((best_divisor >> 3) as u64) | (FRAC_CODE[(best_divisor & 7) as usize] as u64) << 14;

    // Special-cased encodings for the two top rates
    if encoded == 1 {
        encoded = 0; // 3,000,000 baud
    } else if encoded == 0x4001 {
        encoded = 1; // 2,000,000 baud (BM only)
    }

    (best_baud as u32, encoded)
}

/// Encoded divider and achievable rate for the given clock and predivisor.
///
/// Covers BM/2232C/R/230X (48 MHz / 16) and H-type (120 MHz / 10 or
/// 48 MHz / 16).
fn clock_divisor(baudrate: u32, clk: u32, clk_div: u32) -> (u32, u64) {
    if baudrate >= clk / clk_div {
        return (clk / clk_div, 0);
    }
    if baudrate >= clk / (clk_div + clk_div / 2) {
        return (clk / (clk_div + clk_div / 2), 1);
    }
    if baudrate >= clk / (2 * clk_div) {
        return (clk / (2 * clk_div), 2);
    }

    // Scale by 16 for 3 fractional bits plus one rounding bit
    let divisor = clk * 16 / clk_div / baudrate;
    let best_divisor = if divisor & 1 != 0 {
        divisor / 2 + 1
    } else {
        divisor / 2
    };
    // 0x20000 itself is a valid divisor; only larger values are clamped
    let best_divisor = if best_divisor > 0x20000 {
        0x1FFFF
    } else {
        best_divisor
    };

    let mut best_baud = clk * 16 / clk_div / best_divisor;
    if best_baud & 1 != 0 {
        best_baud = best_baud / 2 + 1;
    } else {
        best_baud /= 2;
    }

    let encoded =
        ((best_divisor >> 3) as u64) | (FRAC_CODE[(best_divisor & 0x7) as usize] as u64) << 14;

    (best_baud, encoded)
}

/// Encode a requested baud rate into SIO_SET_BAUDRATE register values.
///
/// Returns `None` for a zero baud rate or when no divider exists. The
/// caller is responsible for checking the returned `actual` rate against
/// its own tolerance.
pub(crate) fn encode_baudrate(
    baudrate: u32,
    chip: ChipType,
    usb_index: u16,
) -> Option<BaudDivisor> {
    if baudrate == 0 {
        return None;
    }

    let (actual, encoded) = match chip {
        ChipType::Ft2232H | ChipType::Ft4232H | ChipType::Ft232H => {
            if (baudrate as u64) * 10 > (H_CLK as u64) / 0x3FFF {
                // High rates use the 120 MHz / 10 path
                let (baud, mut enc) = clock_divisor(baudrate, H_CLK, 10);
                enc |= 0x20000; // select CLK/10
                (baud, enc)
            } else {
                clock_divisor(baudrate, C_CLK, 16)
            }
        }
        ChipType::Bm | ChipType::Ft2232C | ChipType::Ft232R | ChipType::Ft230X => {
            clock_divisor(baudrate, C_CLK, 16)
        }
        ChipType::Am => am_divisor(baudrate),
    };

    if actual == 0 {
        return None;
    }

    let value = (encoded & 0xFFFF) as u16;
    let index = match chip {
        ChipType::Ft2232H | ChipType::Ft4232H | ChipType::Ft232H => {
            // H-type folds the interface number into the index field
            (((encoded >> 8) as u16) & 0xFF00) | usb_index
        }
        _ => (encoded >> 16) as u16,
    };

    Some(BaudDivisor {
        actual,
        value,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(actual: u32, requested: u32, per_mille: u32) -> bool {
        (actual as i64 - requested as i64).unsigned_abs() <= (requested as u64) * per_mille as u64 / 1000
    }

    #[test]
    fn common_rates_are_close_on_bm() {
        for baud in [300, 9600, 19200, 38400, 115_200, 921_600] {
            let d = encode_baudrate(baud, ChipType::Bm, 1).unwrap();
            assert!(within(d.actual, baud, 50), "{baud} -> {}", d.actual);
        }
    }

    #[test]
    fn bm_top_rate_uses_special_encoding() {
        // 48 MHz / 16 = 3 Mbaud, encoded divisor 0
        let d = encode_baudrate(3_000_000, ChipType::Bm, 1).unwrap();
        assert_eq!(d.actual, 3_000_000);
        assert_eq!(d.value, 0);
    }

    #[test]
    fn h_type_reaches_12_mbaud() {
        let d = encode_baudrate(12_000_000, ChipType::Ft2232H, 1).unwrap();
        assert_eq!(d.actual, 12_000_000);
    }

    #[test]
    fn h_type_low_rate_falls_back_to_slow_clock() {
        let d = encode_baudrate(300, ChipType::Ft232H, 1).unwrap();
        assert!(within(d.actual, 300, 100), "actual {}", d.actual);
    }

    #[test]
    fn h_type_index_carries_interface_number() {
        let d = encode_baudrate(9600, ChipType::Ft2232H, 2).unwrap();
        assert_eq!(d.index & 0xFF, 2);
    }

    #[test]
    fn am_supports_its_full_range() {
        let top = encode_baudrate(3_000_000, ChipType::Am, 1).unwrap();
        assert_eq!(top.actual, 3_000_000);
        let low = encode_baudrate(300, ChipType::Am, 1).unwrap();
        assert!(within(low.actual, 300, 100), "actual {}", low.actual);
    }

    #[test]
    fn zero_has_no_divisor() {
        assert!(encode_baudrate(0, ChipType::Bm, 1).is_none());
    }

    #[test]
    fn extreme_low_rates_clamp_without_panicking() {
        let d = encode_baudrate(1, ChipType::Bm, 1).unwrap();
        assert!(d.actual > 0);
    }
}
