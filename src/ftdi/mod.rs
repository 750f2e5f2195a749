//! FTDI UART driver backend over [nusb](https://crates.io/crates/nusb).
//!
//! [`FtdiBackend`] resolves `ftdi://` selector URLs to claimed devices and
//! [`FtdiUart`] implements the [`UartDevice`](crate::uart::UartDevice)
//! contract on top of FTDI vendor control requests and bulk transfers.
//! No C dependencies or `libusb` required.

mod baudrate;
pub mod constants;
mod selector;

use std::time::Duration;

use nusb::transfer::{Bulk, ControlIn, ControlOut, ControlType, In, Out, Recipient};
use nusb::{self, DeviceInfo, MaybeFuture};

use crate::error::{Error, Result};
use crate::types::{DataBits, FlowControl, ModemStatus, Parity, StopBits};
use crate::uart::{UartBackend, UartDevice};

use constants::*;

pub use selector::Selector;

/// Default USB transfer timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bulk read/write chunk size.
const DEFAULT_CHUNKSIZE: usize = 4096;

/// USB string descriptor read timeout.
const STRING_TIMEOUT: Duration = Duration::from_secs(1);

/// FTDI chip generations, detected from the USB `bcdDevice` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipType {
    /// Original FTDI chip (FT8U232AM).
    Am,
    /// B-type chip (FT232BM, FT245BM).
    Bm,
    /// Dual-port chip (FT2232C/D/L).
    Ft2232C,
    /// FT232R / FT245R.
    Ft232R,
    /// Dual hi-speed chip (FT2232H).
    Ft2232H,
    /// Quad-port chip (FT4232H).
    Ft4232H,
    /// Single hi-speed chip (FT232H).
    Ft232H,
    /// FT230X / FT231X / FT234XD.
    Ft230X,
}

impl ChipType {
    /// Whether this is an H-type (hi-speed) chip.
    #[inline]
    pub fn is_h_type(self) -> bool {
        matches!(self, Self::Ft2232H | Self::Ft4232H | Self::Ft232H)
    }

    /// Whether the chip has a configurable latency timer.
    ///
    /// AM-generation chips predate the latency timer register.
    #[inline]
    pub fn has_latency_timer(self) -> bool {
        self != Self::Am
    }

    /// Detect the chip generation from the `bcdDevice` descriptor field.
    fn from_bcd(bcd: u16, has_serial: bool) -> Self {
        match bcd {
            0x0400 => Self::Bm,
            0x0200 if !has_serial => Self::Bm, // BM quirk: bcdDevice=0x200 when serial==0
            0x0200 => Self::Am,
            0x0500 => Self::Ft2232C,
            0x0600 => Self::Ft232R,
            0x0700 => Self::Ft2232H,
            0x0800 => Self::Ft4232H,
            0x0900 => Self::Ft232H,
            0x1000 => Self::Ft230X,
            _ => Self::Bm,
        }
    }
}

/// Port interface selection for multi-interface chips.
///
/// Chips like the FT2232H (dual) and FT4232H (quad) expose multiple
/// independent UARTs; the selector URL picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interface {
    /// Use the first available interface (same as `A`).
    #[default]
    Any,
    /// Interface A (port 0).
    A,
    /// Interface B (port 1).
    B,
    /// Interface C (port 2, FT4232H only).
    C,
    /// Interface D (port 3, FT4232H only).
    D,
}

/// Interface resolved to concrete USB endpoint values.
#[derive(Debug, Clone, Copy)]
struct InterfaceConfig {
    /// The USB interface number (0-based).
    interface_num: u8,
    /// The USB index value used in control transfers (1-based).
    usb_index: u16,
    /// The bulk OUT endpoint address (host-to-device).
    write_ep: u8,
    /// The bulk IN endpoint address (device-to-host).
    read_ep: u8,
}

impl Interface {
    fn config(self) -> InterfaceConfig {
        match self {
            Self::Any | Self::A => InterfaceConfig {
                interface_num: 0,
                usb_index: 1,
                write_ep: 0x02,
                read_ep: 0x81,
            },
            Self::B => InterfaceConfig {
                interface_num: 1,
                usb_index: 2,
                write_ep: 0x04,
                read_ep: 0x83,
            },
            Self::C => InterfaceConfig {
                interface_num: 2,
                usb_index: 3,
                write_ep: 0x06,
                read_ep: 0x85,
            },
            Self::D => InterfaceConfig {
                interface_num: 3,
                usb_index: 4,
                write_ep: 0x08,
                read_ep: 0x87,
            },
        }
    }
}

// ---- Device discovery ----

/// Find the device matching a parsed selector.
///
/// Serial number matching requires opening each candidate temporarily to
/// read its string descriptor.
fn find_device_info(selector: &Selector) -> Result<DeviceInfo> {
    let candidates: Vec<DeviceInfo> = nusb::list_devices()
        .wait()?
        .filter(|d| {
            d.vendor_id() == selector.vendor_id
                && match selector.product_id {
                    Some(product) => d.product_id() == product,
                    None => selector::is_known_pid(d.product_id()),
                }
        })
        .collect();

    let mut match_count = 0usize;

    for dev_info in candidates {
        if let Some(ref expected) = selector.serial {
            let device = dev_info.open().wait()?;
            let desc = device.device_descriptor();
            let Some(idx) = desc.serial_number_string_index() else {
                continue;
            };
            let serial = device
                .get_string_descriptor(idx, 0x0409, STRING_TIMEOUT)
                .wait()
                .unwrap_or_default();
            if serial != *expected {
                continue;
            }
        }

        if match_count == selector.index {
            return Ok(dev_info);
        }
        match_count += 1;
    }

    Err(Error::DeviceNotFound)
}

/// Determine the maximum USB packet size for a claimed device.
fn determine_max_packet_size(
    device: &nusb::Device,
    chip_type: ChipType,
    interface_num: u8,
) -> usize {
    let default_size = if chip_type.is_h_type() { 512 } else { 64 };

    let config = match device.active_configuration() {
        Ok(c) => c,
        Err(_) => return default_size,
    };

    for iface_group in config.interfaces() {
        if iface_group.interface_number() != interface_num {
            continue;
        }
        for alt in iface_group.alt_settings() {
            if let Some(ep) = alt.endpoints().next() {
                return ep.max_packet_size();
            }
        }
    }

    default_size
}

// ---- Backend ----

/// Resolves `ftdi://` selector URLs into claimed [`FtdiUart`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtdiBackend;

impl UartBackend for FtdiBackend {
    type Device = FtdiUart;

    fn open(&self, selector: &str) -> Result<FtdiUart> {
        let selector: Selector = selector.parse()?;
        let dev_info = find_device_info(&selector)?;
        FtdiUart::claim(dev_info, selector.interface)
    }
}

/// A claimed FTDI UART interface.
///
/// Normally obtained through [`SerialPort::open`](crate::SerialPort::open);
/// construct it directly only when driving the chip without the port layer.
pub struct FtdiUart {
    #[allow(dead_code)] // Kept to ensure the USB device stays open
    device: nusb::Device,
    interface: nusb::Interface,

    chip_type: ChipType,
    baudrate: u32,
    read_timeout: Duration,
    write_timeout: Duration,

    // Cached line properties, reissued when toggling break
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    break_on: bool,

    // Carry buffer for bulk-read payload beyond what the caller asked for
    readbuffer: Vec<u8>,
    readbuffer_offset: usize,
    readbuffer_remaining: usize,
    readbuffer_chunksize: usize,
    writebuffer_chunksize: usize,

    max_packet_size: usize,
    usb_index: u16,
    write_ep: u8,
    read_ep: u8,

    last_error: String,
}

impl std::fmt::Debug for FtdiUart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtdiUart")
            .field("chip_type", &self.chip_type)
            .field("baudrate", &self.baudrate)
            .field("usb_index", &self.usb_index)
            .field("max_packet_size", &self.max_packet_size)
            .finish_non_exhaustive()
    }
}

impl FtdiUart {
    /// Claim an already-discovered USB device as a UART.
    ///
    /// Detaches the kernel driver (e.g. `ftdi_sio`), claims the interface
    /// and resets the chip.
    pub fn claim(dev_info: DeviceInfo, iface: Interface) -> Result<Self> {
        let config = iface.config();

        let device = dev_info.open().wait()?;
        let interface = device
            .detach_and_claim_interface(config.interface_num)
            .wait()
            .map_err(|_| Error::ClaimFailed)?;

        let desc = device.device_descriptor();
        let bcd = desc.device_version();
        let has_serial = desc.serial_number_string_index().is_some();
        let chip_type = ChipType::from_bcd(bcd, has_serial);

        let max_packet_size = determine_max_packet_size(&device, chip_type, config.interface_num);

        let mut uart = Self {
            device,
            interface,
            chip_type,
            baudrate: 0,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            parity: Parity::default(),
            break_on: false,
            readbuffer: vec![0u8; DEFAULT_CHUNKSIZE],
            readbuffer_offset: 0,
            readbuffer_remaining: 0,
            readbuffer_chunksize: DEFAULT_CHUNKSIZE,
            writebuffer_chunksize: DEFAULT_CHUNKSIZE,
            max_packet_size,
            usb_index: config.usb_index,
            write_ep: config.write_ep,
            read_ep: config.read_ep,
            last_error: String::new(),
        };

        uart.reset()?;
        Ok(uart)
    }

    /// The detected FTDI chip type.
    pub fn chip_type(&self) -> ChipType {
        self.chip_type
    }

    /// The currently configured baud rate.
    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// Set the timeout for individual USB read transfers.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Set the timeout for individual USB write transfers.
    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    /// Reset the chip to its default state, invalidating the carry buffer.
    pub fn reset(&mut self) -> Result<()> {
        self.control_out(SIO_RESET_REQUEST, SIO_RESET_SIO, self.usb_index)?;
        self.readbuffer_offset = 0;
        self.readbuffer_remaining = 0;
        Ok(())
    }

    /// Set the latency timer value (1-255 ms).
    ///
    /// The chip holds partial buffers for this long before forwarding them
    /// to the host, trading latency against USB bus load.
    pub fn set_latency_timer(&mut self, latency_ms: u8) -> Result<()> {
        if !self.chip_type.has_latency_timer() {
            return Err(Error::Unsupported("latency timer"));
        }
        if latency_ms < 1 {
            return Err(Error::InvalidArgument("latency must be between 1 and 255"));
        }
        self.control_out(SIO_SET_LATENCY_TIMER_REQUEST, latency_ms as u16, self.usb_index)
    }

    // ---- Internal USB helpers ----

    /// Record a failure as the device's last error string, for diagnostics.
    fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = e.to_string();
        }
        result
    }

    /// Send a vendor OUT control transfer.
    fn control_out(&mut self, request: u8, value: u16, index: u16) -> Result<()> {
        let result = self
            .interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    data: &[],
                },
                self.write_timeout,
            )
            .wait()
            .map_err(Error::from)
            .map(|_| ());
        self.note(result)
    }

    /// Send a vendor IN control transfer.
    fn control_in(&mut self, request: u8, value: u16, index: u16, length: u16) -> Result<Vec<u8>> {
        let result = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    length,
                },
                self.read_timeout,
            )
            .wait()
            .map_err(Error::from);
        self.note(result)
    }

    /// Reissue SIO_SET_DATA with the cached line properties and break flag.
    fn push_line_property(&mut self) -> Result<()> {
        let value = self.data_bits.wire_value()
            | (self.parity.wire_value() << 8)
            | (self.stop_bits.wire_value() << 11)
            | ((self.break_on as u16) << 14);
        self.control_out(SIO_SET_DATA_REQUEST, value, self.usb_index)
    }
}

impl UartDevice for FtdiUart {
    /// Read available payload bytes, stripping the 2-byte modem status
    /// header the chip prepends to every packet.
    ///
    /// Returns 0 when the chip only sent status bytes.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let packet_size = self.max_packet_size;
        if packet_size == 0 {
            return Err(Error::InvalidArgument("max_packet_size is zero"));
        }

        // Serve carried-over payload first
        if self.readbuffer_remaining > 0 {
            let n = self.readbuffer_remaining.min(buf.len());
            buf[..n].copy_from_slice(
                &self.readbuffer[self.readbuffer_offset..self.readbuffer_offset + n],
            );
            self.readbuffer_remaining -= n;
            self.readbuffer_offset += n;
            return Ok(n);
        }

        let mut ep = match self.interface.endpoint::<Bulk, In>(self.read_ep) {
            Ok(ep) => ep,
            Err(e) => return self.note(Err(Error::Usb(e))),
        };

        let transfer_buf = nusb::transfer::Buffer::new(self.readbuffer_chunksize);
        let completion = ep.transfer_blocking(transfer_buf, self.read_timeout);
        if let Err(e) = completion.status {
            return self.note(Err(Error::Transfer(e)));
        }

        let actual_length = completion.actual_len;
        if actual_length <= 2 {
            return Ok(0);
        }

        let raw_data = completion.buffer.into_vec();
        self.readbuffer[..actual_length].copy_from_slice(&raw_data[..actual_length]);

        let stripped = strip_status_headers(&mut self.readbuffer[..actual_length], packet_size);
        if stripped == 0 {
            return Ok(0);
        }

        let n = stripped.min(buf.len());
        buf[..n].copy_from_slice(&self.readbuffer[..n]);

        if stripped > buf.len() {
            // Keep the surplus for the next call
            self.readbuffer.copy_within(n..stripped, 0);
            self.readbuffer_offset = 0;
            self.readbuffer_remaining = stripped - n;
        } else {
            self.readbuffer_offset = 0;
            self.readbuffer_remaining = 0;
        }

        Ok(n)
    }

    /// Write data to the chip in bulk transfers of at most the configured
    /// chunk size.
    fn write_data(&mut self, buf: &[u8]) -> Result<usize> {
        let mut ep = match self.interface.endpoint::<Bulk, Out>(self.write_ep) {
            Ok(ep) => ep,
            Err(e) => return self.note(Err(Error::Usb(e))),
        };

        let mut offset = 0;
        while offset < buf.len() {
            let end = (offset + self.writebuffer_chunksize).min(buf.len());
            let chunk = &buf[offset..end];

            let mut transfer_buf = nusb::transfer::Buffer::new(chunk.len());
            transfer_buf.extend_from_slice(chunk);

            let completion = ep.transfer_blocking(transfer_buf, self.write_timeout);
            if let Err(e) = completion.status {
                return self.note(Err(Error::Transfer(e)));
            }
            if completion.actual_len == 0 {
                return self.note(Err(Error::WriteZero));
            }
            offset += completion.actual_len;
        }

        Ok(offset)
    }

    fn purge_rx(&mut self) -> Result<()> {
        self.control_out(SIO_RESET_REQUEST, SIO_TCIFLUSH, self.usb_index)?;
        self.readbuffer_offset = 0;
        self.readbuffer_remaining = 0;
        Ok(())
    }

    fn purge_tx(&mut self) -> Result<()> {
        self.control_out(SIO_RESET_REQUEST, SIO_TCOFLUSH, self.usb_index)
    }

    /// Set the baud rate.
    ///
    /// The achievable rate is determined by the chip's clock divider; an
    /// error is returned when it deviates from the request by more than
    /// ~5%.
    fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        let divisor = baudrate::encode_baudrate(baudrate, self.chip_type, self.usb_index)
            .ok_or(Error::InvalidArgument("baud rate must be > 0"))?;

        let actual = divisor.actual;
        let out_of_tolerance = (actual as u64) * 2 < baudrate as u64
            || if actual < baudrate {
                (actual as u64) * 21 < (baudrate as u64) * 20
            } else {
                (baudrate as u64) * 21 < (actual as u64) * 20
            };
        if out_of_tolerance {
            return Err(Error::UnsupportedBaudRate {
                requested: baudrate,
                actual,
            });
        }

        self.control_out(SIO_SET_BAUDRATE_REQUEST, divisor.value, divisor.index)?;
        self.baudrate = baudrate;
        Ok(())
    }

    fn set_line_property(
        &mut self,
        bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<()> {
        self.data_bits = bits;
        self.stop_bits = stop_bits;
        self.parity = parity;
        self.push_line_property()
    }

    fn set_flow_control(&mut self, flow: FlowControl) -> Result<()> {
        match flow {
            FlowControl::Disabled => {
                self.control_out(SIO_SET_FLOW_CTRL_REQUEST, 0, SIO_DISABLE_FLOW_CTRL | self.usb_index)
            }
            FlowControl::RtsCts => {
                self.control_out(SIO_SET_FLOW_CTRL_REQUEST, 0, SIO_RTS_CTS_HS | self.usb_index)
            }
            FlowControl::XonXoff => {
                let chars = (XON_CHAR as u16) | ((XOFF_CHAR as u16) << 8);
                self.control_out(SIO_SET_FLOW_CTRL_REQUEST, chars, SIO_XON_XOFF_HS | self.usb_index)
            }
        }
    }

    /// Assert or deassert the break condition, keeping the cached line
    /// properties.
    fn set_break(&mut self, on: bool) -> Result<()> {
        self.break_on = on;
        self.push_line_property()
    }

    fn set_rts(&mut self, state: bool) -> Result<()> {
        let value = if state {
            SIO_SET_RTS_HIGH
        } else {
            SIO_SET_RTS_LOW
        };
        self.control_out(SIO_SET_MODEM_CTRL_REQUEST, value, self.usb_index)
    }

    fn set_dtr(&mut self, state: bool) -> Result<()> {
        let value = if state {
            SIO_SET_DTR_HIGH
        } else {
            SIO_SET_DTR_LOW
        };
        self.control_out(SIO_SET_MODEM_CTRL_REQUEST, value, self.usb_index)
    }

    /// Poll the modem status lines, bypassing the carry buffer.
    fn modem_status(&mut self) -> Result<ModemStatus> {
        let data = self.control_in(SIO_POLL_MODEM_STATUS_REQUEST, 0, self.usb_index, 2)?;
        if data.len() < 2 {
            return self.note(Err(Error::DeviceUnavailable));
        }
        let raw = (data[0] as u16) | ((data[1] as u16) << 8);
        Ok(ModemStatus::from_raw(raw))
    }

    /// Map the adaptive latency hint onto the chip's static latency timer.
    ///
    /// FTDI silicon has no per-direction thresholds; the base latency is
    /// the supported subset. AM-generation chips report the capability as
    /// absent.
    fn set_dynamic_latency(&mut self, latency_ms: u8, write_ms: u16, read_ms: u16) -> Result<()> {
        let _ = (write_ms, read_ms);
        self.set_latency_timer(latency_ms.max(1))
    }

    fn error_string(&self) -> String {
        self.last_error.clone()
    }

    /// Release is handled by dropping the claimed interface; the chip is
    /// reset so a later open starts from a clean state.
    fn close(&mut self) -> Result<()> {
        self.reset()
    }
}

/// Strip the 2-byte modem status header from each `packet_size` packet of a
/// raw bulk read, compacting the payload in place. Returns the payload
/// length.
fn strip_status_headers(data: &mut [u8], packet_size: usize) -> usize {
    let total = data.len();
    if total <= 2 {
        return 0;
    }

    let num_packets = total.div_ceil(packet_size);
    let mut write_pos = 0;

    for i in 0..num_packets {
        let pkt_start = i * packet_size;
        let pkt_end = (pkt_start + packet_size).min(total);
        let pkt_len = pkt_end - pkt_start;

        if pkt_len <= 2 {
            // Status-only packet
            continue;
        }

        let payload_start = pkt_start + 2;
        let payload_len = pkt_len - 2;

        if write_pos != payload_start {
            data.copy_within(payload_start..payload_start + payload_len, write_pos);
        }
        write_pos += payload_len;
    }

    write_pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_headers_single_packet() {
        // 64-byte packet: 2 status bytes + 62 payload
        let mut data = vec![0u8; 64];
        data[0] = 0x01;
        data[1] = 0x60;
        for (i, byte) in data.iter_mut().enumerate().skip(2) {
            *byte = i as u8;
        }

        let stripped = strip_status_headers(&mut data, 64);
        assert_eq!(stripped, 62);
        for (i, byte) in data.iter().enumerate().take(62) {
            assert_eq!(*byte, (i + 2) as u8);
        }
    }

    #[test]
    fn strip_headers_across_packets() {
        let mut data = vec![
            0xAA, 0xBB, 2, 3, 4, 5, 6, 7, // packet 1
            0xCC, 0xDD, 10, 11, 12, 13, 14, 15, // packet 2
        ];

        let stripped = strip_status_headers(&mut data, 8);
        assert_eq!(stripped, 12);
        assert_eq!(&data[..12], &[2, 3, 4, 5, 6, 7, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn strip_headers_partial_trailing_packet() {
        // Second packet carries only one payload byte
        let mut data = vec![0xAA, 0xBB, 2, 3, 4, 5, 6, 7, 0xCC, 0xDD, 42];
        let stripped = strip_status_headers(&mut data, 8);
        assert_eq!(stripped, 7);
        assert_eq!(&data[..7], &[2, 3, 4, 5, 6, 7, 42]);
    }

    #[test]
    fn strip_headers_status_only() {
        let mut data = vec![0x01, 0x60];
        assert_eq!(strip_status_headers(&mut data, 64), 0);
        let mut empty: Vec<u8> = vec![];
        assert_eq!(strip_status_headers(&mut empty, 64), 0);
    }

    #[test]
    fn chip_detection_from_bcd() {
        assert_eq!(ChipType::from_bcd(0x0600, true), ChipType::Ft232R);
        assert_eq!(ChipType::from_bcd(0x0700, true), ChipType::Ft2232H);
        assert_eq!(ChipType::from_bcd(0x0200, true), ChipType::Am);
        // BM with a zeroed serial number reports bcdDevice 0x0200
        assert_eq!(ChipType::from_bcd(0x0200, false), ChipType::Bm);
        assert_eq!(ChipType::from_bcd(0x1234, true), ChipType::Bm);
    }

    #[test]
    fn interface_endpoints_follow_port_number() {
        let a = Interface::A.config();
        assert_eq!((a.interface_num, a.usb_index), (0, 1));
        assert_eq!((a.write_ep, a.read_ep), (0x02, 0x81));
        let d = Interface::D.config();
        assert_eq!((d.interface_num, d.usb_index), (3, 4));
        assert_eq!((d.write_ep, d.read_ep), (0x08, 0x87));
    }

    #[test]
    fn latency_timer_is_absent_on_am() {
        assert!(!ChipType::Am.has_latency_timer());
        assert!(ChipType::Ft232R.has_latency_timer());
    }
}
