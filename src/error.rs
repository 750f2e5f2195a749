//! Error types for the ftdi-serial crate.

/// The error type for serial port and FTDI driver operations.
///
/// Failures fall into two kinds callers may want to tell apart: open-time
/// failures ([`Error::PortUnavailable`] and the variants it wraps), after
/// which retrying `open()` may succeed, and runtime failures
/// ([`Error::Device`] and friends), which usually mean the session is gone.
/// Use [`Error::is_open_failure`] to distinguish them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The port selector could not be resolved to a live device.
    #[error("unable to open port {selector}: {source}")]
    PortUnavailable {
        /// The selector that failed to resolve.
        selector: String,
        /// The underlying resolution failure.
        #[source]
        source: Box<Error>,
    },

    /// A device operation failed at runtime.
    ///
    /// Carries the device's own diagnostic string alongside the failing
    /// operation's error.
    #[error("{source} ({diagnostic})")]
    Device {
        /// The failing operation's error.
        #[source]
        source: Box<Error>,
        /// The device's last error string, for diagnostics.
        diagnostic: String,
    },

    /// The port is not open.
    #[error("port is not open")]
    PortNotOpen,

    /// The port is already open.
    #[error("port is already open")]
    AlreadyOpen,

    /// The port has no selector configured.
    #[error("port must be configured with a selector before use")]
    SelectorMissing,

    /// The selector string could not be parsed.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// No matching device was found.
    #[error("device not found")]
    DeviceNotFound,

    /// The USB device is unavailable (not opened or disconnected).
    #[error("USB device unavailable")]
    DeviceUnavailable,

    /// An error from the nusb USB layer.
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    /// A USB transfer error.
    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    /// Could not claim the USB interface.
    #[error("unable to claim USB device; make sure the default FTDI driver is not in use")]
    ClaimFailed,

    /// The requested baud rate cannot be achieved within tolerance.
    #[error("unsupported baud rate: requested {requested}, nearest achievable {actual}")]
    UnsupportedBaudRate {
        /// The requested baud rate.
        requested: u32,
        /// The nearest achievable baud rate.
        actual: u32,
    },

    /// Invalid argument(s) were provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The device does not support an optional capability.
    #[error("capability not supported by this device: {0}")]
    Unsupported(&'static str),

    /// A write operation completed with zero bytes transferred.
    #[error("write returned zero bytes")]
    WriteZero,
}

impl Error {
    /// Whether this failure happened while opening the port.
    ///
    /// Open failures may be worth retrying; runtime failures usually are
    /// not.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::PortUnavailable { .. })
    }
}

/// A specialized `Result` type for serial port operations.
pub type Result<T> = std::result::Result<T, Error>;
