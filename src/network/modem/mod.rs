//! # AT Session & TCP Emulation
//!
//! Turns the line-oriented AT interface of a SIMCom-style cellular modem into
//! something that behaves like a TCP socket.
//!
//! ```text
//!        Init ──init()──▶ Ready ──attach──▶ NetworkAttached ──connect()──▶ SocketConnected
//!          ▲                                                                     │
//!          └──────────────── NoReply / channel failure (any state) ◀─────────────┘
//! ```
//!
//! [`Session`] runs single AT exchanges and the network queries built on
//! them; [`TcpSocket`] adds the connect/send/receive sequences and implements
//! [`Socket`](crate::network::Socket).
//!
//! ## Failures
//!
//! Every exchange ends in one of three ways: the expected reply, a failure
//! line (`ERROR`, reported as [`Error::CommandFailed`]), or silence until
//! the timeout ([`Error::NoReply`]). The first kind of failure is transient
//! and socket operations retry it a bounded number of times; silence is
//! fatal and returns the session to [`State::Init`], after which the owner
//! is expected to power-cycle the modem and call [`Session::init`] again.
//!
//! Structured queries such as [`Session::signal_quality`] return `Ok(None)`
//! when the modem answers `OK` without the line they look for. That means
//! "unknown", not failure.
//!
//! ## Example
//!
//! ```rust,no_run
//! use libcellular::network::link::Direct;
//! use libcellular::network::modem::{Session, TcpSocket};
//! use libcellular::network::Socket;
//! # use embedded_hal::delay::DelayNs;
//! # use libcellular::time::Clock;
//! # struct Uart;
//! # impl libcellular::network::Read for Uart {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl libcellular::network::Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Ticks;
//! # impl DelayNs for Ticks { fn delay_ns(&mut self, _ns: u32) {} }
//! # impl Clock for Ticks { fn now_ms(&self) -> u64 { 0 } }
//!
//! let mut session = Session::new(Direct::new(Uart), Ticks);
//! session.init()?;
//! let mut socket = TcpSocket::new(session);
//! socket.connect("35.162.236.171", 1883)?;
//! socket.send(&[0xC0, 0x00])?;
//! # Ok::<(), libcellular::network::modem::Error>(())
//! ```

/// AT session error type.
pub mod error;

/// AT command texts and builders.
pub mod command;

/// Parsers for structured modem replies.
pub mod response;

/// The AT session state machine.
pub mod session;

/// TCP socket emulation.
pub mod tcp;

pub use error::Error;
pub use response::SignalQuality;
pub use session::{Reply, Session, State};
pub use tcp::{TcpSocket, TcpState};
