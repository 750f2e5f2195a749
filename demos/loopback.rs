//! Simple serial loopback example.
//!
//! Opens the first FTDI device found, configures 115200 8N1, sends a
//! greeting and reads back whatever arrives within one second. Wire TXD to
//! RXD to see the data echoed.
//!
//! Usage: cargo run --example loopback [selector-url]

use std::time::Duration;

use ftdi_serial::SerialPort;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let selector = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ftdi:///1".to_string());

    println!("Opening {selector}...");
    let mut port = SerialPort::new(selector);
    port.set_baud_rate(115200)?;
    port.set_timeout(Some(Duration::from_secs(1)));
    port.open()?;
    println!("Opened: {port:?}");

    let msg = b"Hello from ftdi-serial!\r\n";
    let sent = port.write(msg)?;
    println!("Sent {sent} bytes");

    let reply = port.read(256)?;
    if reply.is_empty() {
        println!("No data received (timeout). Is TXD wired to RXD?");
    } else {
        println!("Received {} bytes: {:?}", reply.len(), reply);
    }

    println!("CTS={} DSR={}", port.cts()?, port.dsr()?);
    port.close()?;
    Ok(())
}
