//! # Application Layer Protocols
//!
//! Protocols that run on top of a [`Socket`](crate::network::Socket). They
//! never touch the modem directly, so any socket implementation works,
//! including the test doubles used in this crate's tests.

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging
/// over the emulated cellular socket.
pub mod mqtt;
