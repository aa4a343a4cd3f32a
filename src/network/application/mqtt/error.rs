//! Error types for the MQTT engine

/// Failures of an MQTT operation.
///
/// Broker answers that are merely negative (a refused CONNACK, a missing
/// PUBACK, a SUBACK failure code) are not errors; the operations report them
/// as `Ok(false)` or `Ok(None)`. This type covers faults below and around
/// the protocol.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The socket underneath failed.
    Socket(E),
    /// The socket is not connected to the broker.
    NotConnected,
    /// The broker sent a fixed header that fits neither the awaited packet
    /// nor a PUBLISH.
    ProtocolViolation([u8; 2]),
    /// A packet would exceed the encoder's limits.
    PacketTooLarge,
    /// A QoS outside 0 and 1 was requested or granted.
    InvalidQoS,
}

