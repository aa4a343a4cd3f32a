//! A layered network abstraction for gateways without an IP stack
//!
//! The crate reaches a TCP peer through a cellular modem, so "the network" is
//! three stacked capabilities rather than one socket:
//!
//! ```text
//! ┌──────────────────────┐
//! │  application::mqtt   │  publish / subscribe over a Socket
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  modem (Socket)      │  AT session + TCP emulation over a LineChannel
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  link (LineChannel)  │  framed bridge, or the raw port via `Direct`
//! └──────────┬───────────┘
//!            ▼
//!     serial port (Read + Write)
//! ```
//!
//! Each layer holds the one below by value and only talks to it through the
//! traits declared here.

#![deny(unsafe_code)]

/// Framed serial transport and the direct-port adapter.
pub mod link;

/// AT-command session and TCP socket emulation.
pub mod modem;

/// Application protocols running over an emulated socket.
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{LineChannel, Read, Socket, Write};
}

/// Byte-level input from a serial port.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read whatever bytes are already buffered, returning `Ok(0)` when none are.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte-level output to a serial port.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the port, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Something that can send bytes and hand back received text line by line.
///
/// This is the capability the AT session needs from whatever sits between it
/// and the modem.
pub trait LineChannel {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Send all of `data`.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Copy received bytes into `buf`, stopping after the first `\n`.
    ///
    /// When no terminator has arrived yet the bytes received so far are
    /// returned, so prompts such as `"> "` that never end in a newline still
    /// reach the caller. `Ok(0)` means nothing is pending.
    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Something that behaves like a connected TCP socket.
pub trait Socket {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Open a connection to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Tear the connection down.
    fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Whether the peer connection is currently established.
    fn connected(&mut self) -> Result<bool, Self::Error>;

    /// Send every byte of `data`.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Number of received bytes waiting to be read.
    fn available(&mut self) -> Result<usize, Self::Error>;

    /// Read up to `buf.len()` received bytes, returning how many were copied.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}
