//! MQTT 3.1.1 protocol engine for gateways whose only route to the broker is
//! an emulated [`Socket`](crate::network::Socket).
//!
//! # Scope
//!
//! - CONNECT/CONNACK with optional user name and password, no will
//! - PUBLISH at QoS 0 and QoS 1 (single shot, no DUP redelivery)
//! - SUBSCRIBE/UNSUBSCRIBE for one topic filter at a time
//! - PINGREQ keep-alive driven by [`Client::poll`]
//! - DISCONNECT
//!
//! Remaining lengths are encoded in at most two bytes (up to 16383).
//!
//! # Packet flow
//!
//! ```text
//!   client                         broker
//!     │ ── CONNECT ─────────────────▶ │
//!     │ ◀──────────────── CONNACK ─── │   20 02 <session> <rc>
//!     │ ── PUBLISH (QoS 1, id) ─────▶ │
//!     │ ◀─ PUBLISH (unsolicited) ──── │   drained and dropped
//!     │ ◀────────────── PUBACK id ─── │   40 02 <id>
//!     │ ── PINGREQ ─────────────────▶ │
//!     │ ◀─────────────── PINGRESP ─── │   D0 00
//! ```

/// The session engine.
pub mod client;

/// MQTT error type.
pub mod error;

/// Control packet encoding.
pub mod packet;

pub use client::{Client, Options};
pub use error::Error;
pub use packet::{ConnectReturnCode, QoS};
