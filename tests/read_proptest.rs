//! Property-based tests for the blocking read loop.
//!
//! Uses `proptest` to feed the port scripted devices that deliver a byte
//! stream in arbitrary chunk sizes across polls, and verifies the read
//! loop's accumulation and early-return behavior.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use proptest::prelude::*;

use ftdi_serial::{
    DataBits, Error, FlowControl, ModemStatus, Parity, Result, SerialPort, StopBits, UartBackend,
    UartDevice,
};

/// A device that replays a fixed chunk sequence, one chunk per poll.
struct ScriptedUart {
    chunks: VecDeque<Vec<u8>>,
}

impl UartDevice for ScriptedUart {
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.chunks.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    chunk.drain(..n);
                    self.chunks.push_front(chunk);
                }
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn write_data(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }

    fn purge_rx(&mut self) -> Result<()> {
        Ok(())
    }

    fn purge_tx(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_baudrate(&mut self, _baudrate: u32) -> Result<()> {
        Ok(())
    }

    fn set_line_property(
        &mut self,
        _bits: DataBits,
        _stop_bits: StopBits,
        _parity: Parity,
    ) -> Result<()> {
        Ok(())
    }

    fn set_flow_control(&mut self, _flow: FlowControl) -> Result<()> {
        Ok(())
    }

    fn set_break(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }

    fn set_rts(&mut self, _state: bool) -> Result<()> {
        Ok(())
    }

    fn set_dtr(&mut self, _state: bool) -> Result<()> {
        Ok(())
    }

    fn modem_status(&mut self) -> Result<ModemStatus> {
        Ok(ModemStatus::from_raw(0))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Hands out its scripted device on the first open.
struct ScriptedBackend(RefCell<Option<ScriptedUart>>);

impl UartBackend for ScriptedBackend {
    type Device = ScriptedUart;

    fn open(&self, _selector: &str) -> Result<ScriptedUart> {
        self.0.borrow_mut().take().ok_or(Error::DeviceNotFound)
    }
}

fn scripted_port(chunks: Vec<Vec<u8>>) -> SerialPort<ScriptedBackend> {
    let uart = ScriptedUart {
        chunks: chunks.into_iter().collect(),
    };
    SerialPort::with_backend(ScriptedBackend(RefCell::new(Some(uart))), "scripted-device")
}

/// A short byte stream split into 1 to 5 chunks of 1 to 15 bytes.
fn chunked_stream() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Without a timeout, the read loop accumulates until the requested
    /// size is fully satisfied, regardless of how the device chunks the
    /// data.
    #[test]
    fn full_read_collects_every_chunk(chunks in chunked_stream()) {
        let expected: Vec<u8> = chunks.concat();
        let mut port = scripted_port(chunks);
        port.open().unwrap();

        prop_assert_eq!(port.read(expected.len()).unwrap(), expected);
    }

    /// A read for less than the device will ever supply returns exactly
    /// the first `size` bytes of the stream.
    #[test]
    fn short_read_returns_exact_prefix(
        chunks in chunked_stream(),
        size_fraction in 0.0f64..=1.0,
    ) {
        let stream: Vec<u8> = chunks.concat();
        let size = (stream.len() as f64 * size_fraction) as usize;
        let mut port = scripted_port(chunks);
        port.open().unwrap();

        prop_assert_eq!(port.read(size).unwrap(), &stream[..size]);
    }

    /// With a timeout configured, the first nonempty chunk is returned
    /// immediately, even though more data is pending behind it.
    #[test]
    fn timeout_mode_returns_first_chunk(chunks in chunked_stream()) {
        let first = chunks[0].clone();
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut port = scripted_port(chunks);
        port.set_timeout(Some(Duration::from_secs(60)));
        port.open().unwrap();

        prop_assert_eq!(port.read(total + 10).unwrap(), first);
    }
}
