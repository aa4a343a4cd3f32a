//! # Serial Link Layer
//!
//! Everything between the serial port and the AT session. Two variants exist:
//!
//! - [`Bridge`]: the modem sits behind a microcontroller that relays its UART
//!   inside checksummed frames (see [`frame`] for the wire format). Outbound
//!   bytes are acknowledged per frame and retried; inbound frames are
//!   validated and their payload queued in a FIFO.
//! - [`Direct`]: the modem UART is attached to the host, bytes pass through
//!   unchanged.
//!
//! Both implement [`LineChannel`](crate::network::LineChannel), so the AT
//! session does not care which one it is given.
//!
//! ## Error recovery
//!
//! A corrupt or truncated inbound frame is never reported upward. The
//! bridge drops everything it has buffered, counts the event, and the reader
//! just sees "no data yet". Only transport faults that the caller has to act
//! on ([`Error::BridgeNotReady`], [`Error::WriteFailed`], [`Error::FifoOverflow`],
//! [`Error::Io`]) come back as errors.

/// Link layer error type.
pub mod error;

/// Bridge frame codec.
pub mod frame;

/// Framed transport to the bridge MCU.
pub mod bridge;

/// Pass-through adapter for a directly attached modem.
pub mod direct;

pub use bridge::Bridge;
pub use direct::Direct;
pub use error::Error;
