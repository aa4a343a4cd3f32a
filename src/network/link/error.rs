//! Error types for the framed serial link

/// Errors raised by the framed serial transport.
///
/// Framing problems are normally recovered inside the transport by dropping
/// the buffered bytes; [`Error::Framing`] only escapes when a caller asks for
/// a frame that cannot be built.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A frame failed its header, length or checksum checks.
    Framing,
    /// The bridge did not acknowledge its initialisation frames.
    BridgeNotReady,
    /// A transmit frame went unacknowledged after every retry.
    WriteFailed,
    /// Received payload did not fit in the receive FIFO and was dropped.
    FifoOverflow,
    /// The underlying serial port reported an error.
    Io,
}
