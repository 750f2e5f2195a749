//! The blocking serial port over a UART driver handle.
//!
//! [`SerialPort`] owns a [`UartDevice`](crate::uart::UartDevice) handle for
//! as long as the port is open and forwards every operation to it. The only
//! logic of its own is the polling read loop and the translation of driver
//! failures into [`Error`](crate::error::Error) values.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::ftdi::FtdiBackend;
use crate::types::{DataBits, FlowControl, Parity, StopBits};
use crate::uart::{UartBackend, UartDevice};

/// Sleep between device polls in the blocking read loop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A blocking serial port bound to a UART device handle.
///
/// The port is constructed unopened with a selector string and the standard
/// serial parameters, then [`open`](Self::open) resolves the selector
/// through the backend and pushes the configured line parameters to the
/// device. All operations are synchronous and single-owner: the port adds
/// no locking, so sharing it across threads requires external mutual
/// exclusion.
///
/// # Example
///
/// ```no_run
/// use ftdi_serial::SerialPort;
///
/// let mut port = SerialPort::new("ftdi://0x403:0x6001/1");
/// port.set_baud_rate(115200)?;
/// port.open()?;
/// port.write(b"AT\r\n")?;
/// let reply = port.read(16)?;
/// # Ok::<(), ftdi_serial::Error>(())
/// ```
pub struct SerialPort<B: UartBackend> {
    backend: B,
    selector: String,
    device: Option<B::Device>,

    baud_rate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    timeout: Option<Duration>,
    rts_cts: bool,
    xon_xoff: bool,

    break_state: bool,
    rts_state: bool,
    dtr_state: bool,
}

impl<B: UartBackend> std::fmt::Debug for SerialPort<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("selector", &self.selector)
            .field("is_open", &self.device.is_some())
            .field("baud_rate", &self.baud_rate)
            .field("data_bits", &self.data_bits)
            .field("stop_bits", &self.stop_bits)
            .field("parity", &self.parity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SerialPort<FtdiBackend> {
    /// Create an unopened port for an FTDI device selector.
    ///
    /// The selector is a URL of the form
    /// `ftdi://[vendor[:product[:serial|index]]]/<interface>`, e.g.
    /// `ftdi://0x403:0x6001/1`. Defaults are 9600 baud, 8N1, no flow
    /// control, no timeout.
    pub fn new(selector: impl Into<String>) -> Self {
        Self::with_backend(FtdiBackend, selector)
    }
}

impl<B: UartBackend> SerialPort<B> {
    /// Create an unopened port using a custom driver backend.
    pub fn with_backend(backend: B, selector: impl Into<String>) -> Self {
        Self {
            backend,
            selector: selector.into(),
            device: None,
            baud_rate: 9600,
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            parity: Parity::default(),
            timeout: None,
            rts_cts: false,
            xon_xoff: false,
            break_state: false,
            rts_state: true,
            dtr_state: true,
        }
    }

    // ---- Lifecycle ----

    /// Open the port: resolve the selector to a device handle and push the
    /// current configuration to it.
    ///
    /// Resolution failures are reported as [`Error::PortUnavailable`];
    /// configuration push failures as [`Error::Device`] with the device's
    /// diagnostic string. The port must not already be open.
    pub fn open(&mut self) -> Result<()> {
        if self.selector.is_empty() {
            return Err(Error::SelectorMissing);
        }
        if self.device.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let device = self.backend.open(&self.selector).map_err(|e| {
            Error::PortUnavailable {
                selector: self.selector.clone(),
                source: Box::new(e),
            }
        })?;
        self.device = Some(device);
        self.reconfigure()
    }

    /// Close the port, releasing the device handle.
    ///
    /// Idempotent: closing an already-closed port is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut device) = self.device.take() {
            device.close()?;
        }
        Ok(())
    }

    /// Whether the port is currently open.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// The device selector this port was created with.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    // ---- Data transfer ----

    /// Read up to `size` bytes from the port.
    ///
    /// With no timeout configured, blocks until exactly `size` bytes have
    /// been collected, polling the device every 10 ms. With a timeout, the
    /// read returns as soon as the device yields any nonempty chunk (which
    /// may be shorter than `size`), or returns the empty accumulation once
    /// the timeout elapses on a zero-byte poll.
    pub fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;

        let mut data = Vec::with_capacity(size);
        let mut chunk = vec![0u8; size];
        let mut remaining = size;
        let start = Instant::now();

        while remaining > 0 {
            let n = match device.read_data(&mut chunk[..remaining]) {
                Ok(n) => n,
                Err(e) => return Err(device_error(&*device, e)),
            };
            data.extend_from_slice(&chunk[..n]);
            remaining -= n;

            match poll_verdict(remaining, n, start.elapsed(), timeout) {
                PollVerdict::Satisfied | PollVerdict::ReturnEarly | PollVerdict::TimedOut => break,
                PollVerdict::KeepPolling => thread::sleep(POLL_INTERVAL),
            }
        }
        Ok(data)
    }

    /// Write `data` to the port, returning the number of bytes accepted.
    ///
    /// Partial writes are not retried; the caller resubmits the remainder.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;
        match device.write_data(data) {
            Ok(n) => Ok(n),
            Err(e) => Err(device_error(&*device, e)),
        }
    }

    /// Wait until all output has been written.
    ///
    /// There is no software output buffer on this path, so this is a no-op
    /// on an open port.
    pub fn flush(&mut self) -> Result<()> {
        self.device.as_mut().ok_or(Error::PortNotOpen)?;
        Ok(())
    }

    /// Discard everything in the receive FIFO.
    pub fn reset_input_buffer(&mut self) -> Result<()> {
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;
        match device.purge_rx() {
            Ok(()) => Ok(()),
            Err(e) => Err(device_error(&*device, e)),
        }
    }

    /// Abort the current output and discard everything in the transmit
    /// FIFO.
    pub fn reset_output_buffer(&mut self) -> Result<()> {
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;
        match device.purge_tx() {
            Ok(()) => Ok(()),
            Err(e) => Err(device_error(&*device, e)),
        }
    }

    /// Number of bytes waiting in the input buffer.
    ///
    /// The underlying driver does not implement this query; it always
    /// reports 0. This is a documented limitation, not an estimate.
    pub fn in_waiting(&self) -> usize {
        0
    }

    /// Number of bytes waiting in the output buffer. Always 0, like
    /// [`in_waiting`](Self::in_waiting).
    pub fn out_waiting(&self) -> usize {
        0
    }

    // ---- Break / modem control lines ----

    /// Send a break condition for the given duration, blocking.
    pub fn send_break(&mut self, duration: Duration) -> Result<()> {
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;
        if let Err(e) = device.set_break(true) {
            return Err(device_error(&*device, e));
        }
        thread::sleep(duration);
        match device.set_break(false) {
            Ok(()) => Ok(()),
            Err(e) => Err(device_error(&*device, e)),
        }
    }

    /// Set the break condition and forward it to the hardware when open.
    pub fn set_break_state(&mut self, on: bool) -> Result<()> {
        self.break_state = on;
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.set_break(on) {
                return Err(device_error(&*device, e));
            }
        }
        Ok(())
    }

    /// Set the RTS line state and forward it to the hardware when open.
    pub fn set_rts_state(&mut self, state: bool) -> Result<()> {
        self.rts_state = state;
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.set_rts(state) {
                return Err(device_error(&*device, e));
            }
        }
        Ok(())
    }

    /// Set the DTR line state and forward it to the hardware when open.
    pub fn set_dtr_state(&mut self, state: bool) -> Result<()> {
        self.dtr_state = state;
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.set_dtr(state) {
                return Err(device_error(&*device, e));
            }
        }
        Ok(())
    }

    /// The currently stored break condition.
    pub fn break_state(&self) -> bool {
        self.break_state
    }

    /// The currently stored RTS line state.
    pub fn rts_state(&self) -> bool {
        self.rts_state
    }

    /// The currently stored DTR line state.
    pub fn dtr_state(&self) -> bool {
        self.dtr_state
    }

    /// Read the CTS (Clear To Send) line from the hardware.
    pub fn cts(&mut self) -> Result<bool> {
        self.modem_line(|s| s.cts())
    }

    /// Read the DSR (Data Set Ready) line from the hardware.
    pub fn dsr(&mut self) -> Result<bool> {
        self.modem_line(|s| s.dsr())
    }

    /// Read the RI (Ring Indicator) line from the hardware.
    pub fn ri(&mut self) -> Result<bool> {
        self.modem_line(|s| s.ri())
    }

    /// Read the CD (Carrier Detect) line from the hardware.
    pub fn cd(&mut self) -> Result<bool> {
        self.modem_line(|s| s.cd())
    }

    fn modem_line(&mut self, line: impl Fn(crate::types::ModemStatus) -> bool) -> Result<bool> {
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;
        match device.modem_status() {
            Ok(status) => Ok(line(status)),
            Err(e) => Err(device_error(&*device, e)),
        }
    }

    // ---- Configuration ----

    /// Set the baud rate, reconfiguring the device when open.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.baud_rate = baud_rate;
        self.reconfigure_if_open()
    }

    /// Set the number of data bits, reconfiguring the device when open.
    pub fn set_data_bits(&mut self, data_bits: DataBits) -> Result<()> {
        self.data_bits = data_bits;
        self.reconfigure_if_open()
    }

    /// Set the number of stop bits, reconfiguring the device when open.
    pub fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<()> {
        self.stop_bits = stop_bits;
        self.reconfigure_if_open()
    }

    /// Set the parity mode, reconfiguring the device when open.
    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        self.parity = parity;
        self.reconfigure_if_open()
    }

    /// Set or clear the read timeout.
    ///
    /// `None` makes [`read`](Self::read) block until the requested size is
    /// fully collected.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Enable or disable hardware RTS/CTS flow control.
    ///
    /// When both hardware and software flow control are enabled, hardware
    /// wins.
    pub fn set_rts_cts(&mut self, enabled: bool) -> Result<()> {
        self.rts_cts = enabled;
        self.reconfigure_if_open()
    }

    /// Enable or disable software XON/XOFF flow control.
    pub fn set_xon_xoff(&mut self, enabled: bool) -> Result<()> {
        self.xon_xoff = enabled;
        self.reconfigure_if_open()
    }

    /// The currently configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// The currently configured data bits.
    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    /// The currently configured stop bits.
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    /// The currently configured parity mode.
    pub fn parity(&self) -> Parity {
        self.parity
    }

    /// The currently configured read timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The flow control mode the stored flags resolve to.
    pub fn flow_control(&self) -> FlowControl {
        resolve_flow_control(self.rts_cts, self.xon_xoff)
    }

    fn reconfigure_if_open(&mut self) -> Result<()> {
        if self.device.is_some() {
            self.reconfigure()
        } else {
            Ok(())
        }
    }

    /// Push baud rate, line properties and flow control to the device, then
    /// offer the best-effort adaptive latency hint.
    fn reconfigure(&mut self) -> Result<()> {
        let baud_rate = self.baud_rate;
        let (bits, stop_bits, parity) = (self.data_bits, self.stop_bits, self.parity);
        let flow = resolve_flow_control(self.rts_cts, self.xon_xoff);
        let device = self.device.as_mut().ok_or(Error::PortNotOpen)?;

        if let Err(e) = push_config(device, baud_rate, bits, stop_bits, parity, flow) {
            return Err(device_error(&*device, e));
        }

        // Absence of the capability is not an error.
        match device.set_dynamic_latency(12, 200, 50) {
            Ok(()) | Err(Error::Unsupported(_)) => Ok(()),
            Err(e) => Err(device_error(&*device, e)),
        }
    }
}

impl<B: UartBackend> Drop for SerialPort<B> {
    fn drop(&mut self) {
        if let Some(mut device) = self.device.take() {
            let _ = device.close();
        }
    }
}

/// Push the full line configuration to a device, in the order the hardware
/// expects: baud rate first, then line properties, then flow control.
fn push_config<D: UartDevice>(
    device: &mut D,
    baud_rate: u32,
    bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    flow: FlowControl,
) -> Result<()> {
    device.set_baudrate(baud_rate)?;
    device.set_line_property(bits, stop_bits, parity)?;
    device.set_flow_control(flow)
}

/// Wrap a failed device operation with the device's diagnostic string.
fn device_error<D: UartDevice>(device: &D, source: Error) -> Error {
    Error::Device {
        source: Box::new(source),
        diagnostic: device.error_string(),
    }
}

/// Resolve the two flow-control flags into a mode, hardware first.
fn resolve_flow_control(rts_cts: bool, xon_xoff: bool) -> FlowControl {
    if rts_cts {
        FlowControl::RtsCts
    } else if xon_xoff {
        FlowControl::XonXoff
    } else {
        FlowControl::Disabled
    }
}

/// Outcome of one iteration of the polling read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollVerdict {
    /// The requested size has been fully collected.
    Satisfied,
    /// Timeout mode and the device yielded data: return it immediately,
    /// even if shorter than requested.
    ReturnEarly,
    /// Timeout mode and the deadline elapsed on an empty poll.
    TimedOut,
    /// Sleep and poll again.
    KeepPolling,
}

/// Decide what the read loop does after a poll that yielded `chunk_len`
/// bytes with `remaining` bytes still outstanding.
fn poll_verdict(
    remaining: usize,
    chunk_len: usize,
    elapsed: Duration,
    timeout: Option<Duration>,
) -> PollVerdict {
    if remaining == 0 {
        return PollVerdict::Satisfied;
    }
    if let Some(timeout) = timeout {
        if chunk_len > 0 {
            return PollVerdict::ReturnEarly;
        }
        if elapsed > timeout {
            return PollVerdict::TimedOut;
        }
    }
    PollVerdict::KeepPolling
}

// ---- std::io façade ----

impl<B: UartBackend> io::Read for SerialPort<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = SerialPort::read(self, buf.len()).map_err(io::Error::other)?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<B: UartBackend> io::Write for SerialPort<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SerialPort::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        SerialPort::flush(self).map_err(io::Error::other)
    }
}
