//! # libcellular - MQTT over a cellular modem's AT interface
//!
//! A gateway without its own TCP/IP stack can still reach an MQTT broker if
//! it has a cellular modem: the modem's AT command set offers a TCP socket,
//! and MQTT only needs a socket. This crate stacks the three protocols that
//! make that work and runs them synchronously on one serial port.
//!
//! ## Layers
//!
//! - [`network::link`]: framed serial transport to a bridge microcontroller
//!   (checksummed frames, acknowledged writes, receive FIFO), or a plain
//!   port through [`network::link::Direct`]
//! - [`network::modem`]: AT session state machine and TCP emulation on top
//!   of any [`network::LineChannel`]
//! - [`network::application::mqtt`]: MQTT 3.1.1 client on top of any
//!   [`network::Socket`]
//!
//! Around the stack sit [`gps`] (GNSS records from the same modem),
//! [`status`] (the connectivity snapshot other tasks may read) and
//! [`config`] (the JSON start-up configuration).
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libcellular = "0.1.0"
//! ```
//!
//! ### Publishing through a bridged modem
//!
//! ```rust,no_run
//! use libcellular::network::application::mqtt::{Client, Options, QoS};
//! use libcellular::network::link::Bridge;
//! use libcellular::network::modem::{Session, TcpSocket};
//! # use embedded_hal::delay::DelayNs;
//! # use libcellular::network::{Read, Write};
//! # use libcellular::time::Clock;
//! # #[derive(Clone, Copy)]
//! # struct Uart;
//! # impl Read for Uart {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> { Ok(0) }
//! # }
//! # impl Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, ()> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//! # #[derive(Clone, Copy)]
//! # struct Ticks;
//! # impl DelayNs for Ticks { fn delay_ns(&mut self, _ns: u32) {} }
//! # impl Clock for Ticks { fn now_ms(&self) -> u64 { 0 } }
//! # struct Dice;
//! # impl rand_core::RngCore for Dice {
//! #     fn next_u32(&mut self) -> u32 { 7 }
//! #     fn next_u64(&mut self) -> u64 { 7 }
//! #     fn fill_bytes(&mut self, d: &mut [u8]) { d.fill(7) }
//! #     fn try_fill_bytes(&mut self, d: &mut [u8]) -> Result<(), rand_core::Error> { d.fill(7); Ok(()) }
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut bridge = Bridge::new(Uart, Ticks, 1);
//! bridge.begin().map_err(|_| "bridge")?;
//!
//! let mut session = Session::new(bridge, Ticks);
//! session.init().map_err(|_| "modem")?;
//!
//! let socket = TcpSocket::new(session);
//! let mut client = Client::new(socket, Ticks, Dice, Options::new("broker.example.com"))
//!     .map_err(|_| "client")?;
//! if client.connect().map_err(|_| "connect")? {
//!     client
//!         .publish("sensors/air", b"{\"pm25\":12}", QoS::AtLeastOnce, false)
//!         .map_err(|_| "publish")?;
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Clock and deadline primitives used by every bounded wait.
pub mod time;

/// Port traits and the three protocol layers.
///
/// Each layer is generic over the trait of the one below, so any of them can
/// be driven by a test double.
pub mod network;

/// GNSS records read through the modem session.
pub mod gps;

/// Connectivity snapshot shared with display and logging tasks.
pub mod status;

/// JSON start-up configuration.
pub mod config;
