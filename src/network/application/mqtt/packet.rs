//! # MQTT 3.1.1 Packet Encoding
//!
//! Builders for the control packets the client sends and the constants it
//! matches broker replies against. Every packet is built into one buffer so
//! the socket can hand it to the modem in a single send.
//!
//! Remaining length is limited to two bytes of the variable-length encoding,
//! i.e. at most [`MAX_REMAINING_LENGTH`].

use super::error::Error;
use heapless::Vec;

/// CONNECT packet type.
pub const CONNECT: u8 = 0x10;
/// CONNACK packet type.
pub const CONNACK: u8 = 0x20;
/// PUBLISH packet type, flags cleared.
pub const PUBLISH: u8 = 0x30;
/// PUBACK packet type.
pub const PUBACK: u8 = 0x40;
/// SUBSCRIBE packet type with its mandatory flags.
pub const SUBSCRIBE: u8 = 0x82;
/// SUBACK packet type.
pub const SUBACK: u8 = 0x90;
/// UNSUBSCRIBE packet type with its mandatory flags.
pub const UNSUBSCRIBE: u8 = 0xA2;
/// UNSUBACK packet type.
pub const UNSUBACK: u8 = 0xB0;
/// PINGREQ packet type.
pub const PINGREQ: u8 = 0xC0;
/// PINGRESP packet type.
pub const PINGRESP: u8 = 0xD0;
/// DISCONNECT packet type.
pub const DISCONNECT: u8 = 0xE0;

/// Protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &str = "MQTT";
/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest remaining length the codec handles.
pub const MAX_REMAINING_LENGTH: usize = 16_383;

/// Capacity of an encoded packet: fixed header byte, two length bytes and
/// the largest body.
pub const PACKET_CAPACITY: usize = 1 + 2 + MAX_REMAINING_LENGTH;

/// An encoded packet.
pub type Packet = Vec<u8, PACKET_CAPACITY>;

/// Fixed header of a CONNACK.
pub const CONNACK_HEADER: [u8; 2] = [CONNACK, 0x02];
/// Fixed header of a PUBACK.
pub const PUBACK_HEADER: [u8; 2] = [PUBACK, 0x02];
/// Fixed header of a SUBACK for a single topic.
pub const SUBACK_HEADER: [u8; 2] = [SUBACK, 0x03];
/// Fixed header of an UNSUBACK.
pub const UNSUBACK_HEADER: [u8; 2] = [UNSUBACK, 0x02];
/// Fixed header of a PINGRESP.
pub const PINGRESP_HEADER: [u8; 2] = [PINGRESP, 0x00];

/// A complete PINGREQ.
pub const PINGREQ_PACKET: [u8; 2] = [PINGREQ, 0x00];
/// A complete DISCONNECT.
pub const DISCONNECT_PACKET: [u8; 2] = [DISCONNECT, 0x00];

/// SUBACK return code for a refused subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// Delivery guarantee of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged with a PUBACK, may be delivered twice.
    AtLeastOnce = 1,
}

impl TryFrom<u8> for QoS {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            other => Err(other),
        }
    }
}

/// CONNACK return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted,
    /// The broker does not speak protocol level 4.
    UnacceptableProtocolVersion,
    /// The client identifier is not allowed.
    IdentifierRejected,
    /// The MQTT service is unavailable.
    ServerUnavailable,
    /// Malformed user name or password.
    BadUserNameOrPassword,
    /// The client is not authorised to connect.
    NotAuthorized,
    /// A code outside the 3.1.1 table.
    Other(u8),
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0 => ConnectReturnCode::Accepted,
            1 => ConnectReturnCode::UnacceptableProtocolVersion,
            2 => ConnectReturnCode::IdentifierRejected,
            3 => ConnectReturnCode::ServerUnavailable,
            4 => ConnectReturnCode::BadUserNameOrPassword,
            5 => ConnectReturnCode::NotAuthorized,
            other => ConnectReturnCode::Other(other),
        }
    }
}

impl ConnectReturnCode {
    /// Human readable reason.
    pub fn description(&self) -> &'static str {
        match self {
            ConnectReturnCode::Accepted => "connection accepted",
            ConnectReturnCode::UnacceptableProtocolVersion => "unacceptable protocol version",
            ConnectReturnCode::IdentifierRejected => "identifier rejected",
            ConnectReturnCode::ServerUnavailable => "server unavailable",
            ConnectReturnCode::BadUserNameOrPassword => "bad user name or password",
            ConnectReturnCode::NotAuthorized => "not authorized",
            ConnectReturnCode::Other(_) => "unknown return code",
        }
    }
}

/// Errors of the pure codec functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// The value or packet exceeds what the codec supports.
    TooLarge,
    /// The bytes are not a valid encoding.
    Malformed,
}

impl<E> From<CodecError> for Error<E> {
    fn from(_: CodecError) -> Self {
        Error::PacketTooLarge
    }
}

/// Encode `len` as a one or two byte remaining-length field.
///
/// Returns the buffer and how many of its bytes are used.
pub fn encode_remaining_length(len: usize) -> Result<([u8; 2], usize), CodecError> {
    match len {
        0..=0x7F => Ok(([len as u8, 0], 1)),
        0x80..=MAX_REMAINING_LENGTH => Ok(([(len % 0x80) as u8 | 0x80, (len / 0x80) as u8], 2)),
        _ => Err(CodecError::TooLarge),
    }
}

/// Decode a remaining-length field at the start of `bytes`.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<(usize, usize), CodecError> {
    match bytes {
        [first, ..] if first & 0x80 == 0 => Ok((usize::from(*first), 1)),
        [first, second, ..] if second & 0x80 == 0 => {
            Ok((usize::from(first & 0x7F) + usize::from(*second) * 0x80, 2))
        }
        [_, _, ..] => Err(CodecError::TooLarge),
        _ => Err(CodecError::Malformed),
    }
}

/// Whether `first` is the first byte of a PUBLISH fixed header.
pub fn is_publish(first: u8) -> bool {
    first & 0xF0 == PUBLISH
}

/// Packets the client can put on the wire.
pub trait Encode {
    /// Bytes after the fixed header.
    fn remaining_length(&self) -> usize;

    /// Append the variable header and payload to `out`.
    fn write_body(&self, out: &mut Writer) -> Result<(), CodecError>;

    /// First byte of the fixed header.
    fn first_byte(&self) -> u8;

    /// Encode the whole packet.
    fn encode(&self) -> Result<Packet, CodecError> {
        let remaining = self.remaining_length();
        let (length, used) = encode_remaining_length(remaining)?;
        let mut out = Writer::default();
        out.put(&[self.first_byte()])?;
        out.put(&length[..used])?;
        self.write_body(&mut out)?;
        Ok(out.finish())
    }
}

/// Appends to a [`Packet`], failing instead of overflowing.
#[derive(Debug, Default)]
pub struct Writer {
    packet: Packet,
}

impl Writer {
    /// Append raw bytes.
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.packet
            .extend_from_slice(bytes)
            .map_err(|_| CodecError::TooLarge)
    }

    /// Append a big-endian `u16`.
    pub fn put_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.put(&value.to_be_bytes())
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, text: &str) -> Result<(), CodecError> {
        let len = u16::try_from(text.len()).map_err(|_| CodecError::TooLarge)?;
        self.put_u16(len)?;
        self.put(text.as_bytes())
    }

    fn finish(self) -> Packet {
        self.packet
    }
}

fn present(field: Option<&str>) -> Option<&str> {
    field.filter(|value| !value.is_empty())
}

/// CONNECT without a will.
#[derive(Debug, Clone, Copy)]
pub struct Connect<'a> {
    /// Client identifier.
    pub client_id: &'a str,
    /// Optional user name; an empty string counts as absent.
    pub username: Option<&'a str>,
    /// Optional password; an empty string counts as absent.
    pub password: Option<&'a str>,
    /// Keep-alive interval in seconds.
    pub keep_alive_seconds: u16,
    /// Ask the broker to discard previous session state.
    pub clean_session: bool,
}

impl Connect<'_> {
    fn flags(&self) -> u8 {
        let mut flags = 0;
        if present(self.username).is_some() {
            flags |= 0x80;
        }
        if present(self.password).is_some() {
            flags |= 0x40;
        }
        if self.clean_session {
            flags |= 0x02;
        }
        flags
    }
}

impl Encode for Connect<'_> {
    fn first_byte(&self) -> u8 {
        CONNECT
    }

    /// Standard MQTT 3.1.1 length: 10 bytes of variable header, then each
    /// length-prefixed string, so a 12 byte id gives 24.
    fn remaining_length(&self) -> usize {
        // protocol name, level, flags and keep-alive
        let mut len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2;
        len += 2 + self.client_id.len();
        for field in [present(self.username), present(self.password)].into_iter().flatten() {
            len += 2 + field.len();
        }
        len
    }

    fn write_body(&self, out: &mut Writer) -> Result<(), CodecError> {
        out.put_str(PROTOCOL_NAME)?;
        out.put(&[PROTOCOL_LEVEL, self.flags()])?;
        out.put_u16(self.keep_alive_seconds)?;
        out.put_str(self.client_id)?;
        if let Some(username) = present(self.username) {
            out.put_str(username)?;
        }
        if let Some(password) = present(self.password) {
            out.put_str(password)?;
        }
        Ok(())
    }
}

/// PUBLISH at QoS 0 or 1.
#[derive(Debug, Clone, Copy)]
pub struct Publish<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Application payload.
    pub payload: &'a [u8],
    /// Delivery guarantee.
    pub qos: QoS,
    /// Ask the broker to retain the message.
    pub retain: bool,
    /// Packet identifier, only written at QoS 1.
    pub packet_id: u16,
}

impl Encode for Publish<'_> {
    fn first_byte(&self) -> u8 {
        PUBLISH | (self.qos as u8) << 1 | u8::from(self.retain)
    }

    fn remaining_length(&self) -> usize {
        let id = if self.qos == QoS::AtLeastOnce { 2 } else { 0 };
        2 + self.topic.len() + id + self.payload.len()
    }

    fn write_body(&self, out: &mut Writer) -> Result<(), CodecError> {
        out.put_str(self.topic)?;
        if self.qos == QoS::AtLeastOnce {
            out.put_u16(self.packet_id)?;
        }
        out.put(self.payload)
    }
}

/// SUBSCRIBE to a single topic filter.
#[derive(Debug, Clone, Copy)]
pub struct Subscribe<'a> {
    /// Topic filter.
    pub topic: &'a str,
    /// Requested QoS.
    pub qos: QoS,
    /// Packet identifier.
    pub packet_id: u16,
}

impl Encode for Subscribe<'_> {
    fn first_byte(&self) -> u8 {
        SUBSCRIBE
    }

    fn remaining_length(&self) -> usize {
        2 + 2 + self.topic.len() + 1
    }

    fn write_body(&self, out: &mut Writer) -> Result<(), CodecError> {
        out.put_u16(self.packet_id)?;
        out.put_str(self.topic)?;
        out.put(&[self.qos as u8])
    }
}

/// UNSUBSCRIBE from a single topic filter.
#[derive(Debug, Clone, Copy)]
pub struct Unsubscribe<'a> {
    /// Topic filter.
    pub topic: &'a str,
    /// Packet identifier.
    pub packet_id: u16,
}

impl Encode for Unsubscribe<'_> {
    fn first_byte(&self) -> u8 {
        UNSUBSCRIBE
    }

    fn remaining_length(&self) -> usize {
        2 + 2 + self.topic.len()
    }

    fn write_body(&self, out: &mut Writer) -> Result<(), CodecError> {
        out.put_u16(self.packet_id)?;
        out.put_str(self.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_length_boundaries() {
        assert_eq!(encode_remaining_length(0), Ok(([0, 0], 1)));
        assert_eq!(encode_remaining_length(127), Ok(([0x7F, 0], 1)));
        assert_eq!(encode_remaining_length(128), Ok(([0x80, 0x01], 2)));
        assert_eq!(encode_remaining_length(16_383), Ok(([0xFF, 0x7F], 2)));
        assert_eq!(encode_remaining_length(16_384), Err(CodecError::TooLarge));

        assert_eq!(decode_remaining_length(&[0x80, 0x01]), Ok((128, 2)));
        assert_eq!(decode_remaining_length(&[0x80, 0x80, 0x01]), Err(CodecError::TooLarge));
        assert_eq!(decode_remaining_length(&[0x80]), Err(CodecError::Malformed));
        assert_eq!(decode_remaining_length(&[]), Err(CodecError::Malformed));
    }

    #[test]
    fn connect_packet_layout() {
        let packet = Connect {
            client_id: "AABBCCDDEEFF",
            username: None,
            password: None,
            keep_alive_seconds: 60,
            clean_session: true,
        }
        .encode()
        .unwrap();
        let mut expected = [0u8; 26];
        expected[..14].copy_from_slice(&[
            0x10, 24, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 60, 0x00, 12,
        ]);
        expected[14..].copy_from_slice(b"AABBCCDDEEFF");
        assert_eq!(&packet[..], &expected[..]);
    }

    #[test]
    fn connect_with_credentials_sets_flags() {
        let packet = Connect {
            client_id: "id",
            username: Some("maps"),
            password: Some("secret"),
            keep_alive_seconds: 300,
            clean_session: false,
        }
        .encode()
        .unwrap();
        assert_eq!(packet[1] as usize, 10 + 4 + 6 + 8);
        assert_eq!(packet[9], 0xC0);
        assert_eq!(&packet[10..12], &300u16.to_be_bytes());
    }

    #[test]
    fn empty_credentials_are_left_out() {
        let connect = Connect {
            client_id: "id",
            username: Some(""),
            password: None,
            keep_alive_seconds: 0,
            clean_session: true,
        };
        assert_eq!(connect.remaining_length(), 14);
        assert_eq!(connect.encode().unwrap()[9], 0x02);
    }

    #[test]
    fn publish_flags_and_identifier() {
        let packet = Publish {
            topic: "a/b",
            payload: b"1",
            qos: QoS::AtLeastOnce,
            retain: true,
            packet_id: 0x0102,
        }
        .encode()
        .unwrap();
        assert_eq!(&packet[..], &[0x33, 8, 0, 3, b'a', b'/', b'b', 0x01, 0x02, b'1']);

        let packet = Publish {
            topic: "a/b",
            payload: b"1",
            qos: QoS::AtMostOnce,
            retain: false,
            packet_id: 7,
        }
        .encode()
        .unwrap();
        assert_eq!(&packet[..], &[0x30, 6, 0, 3, b'a', b'/', b'b', b'1']);
    }

    #[test]
    fn publish_up_to_max_remaining_length_fits() {
        // topic length prefix and "t" take three bytes
        let payload = [0u8; MAX_REMAINING_LENGTH - 3];
        let packet = Publish {
            topic: "t",
            payload: &payload,
            qos: QoS::AtMostOnce,
            retain: false,
            packet_id: 0,
        }
        .encode()
        .unwrap();
        assert_eq!(packet.len(), PACKET_CAPACITY);
        assert_eq!(&packet[..3], &[0x30, 0xFF, 0x7F]);
    }

    #[test]
    fn publish_beyond_capacity_is_rejected() {
        let payload = [0u8; MAX_REMAINING_LENGTH - 2];
        let publish = Publish {
            topic: "t",
            payload: &payload,
            qos: QoS::AtMostOnce,
            retain: false,
            packet_id: 0,
        };
        assert_eq!(publish.encode(), Err(CodecError::TooLarge));
    }

    #[test]
    fn subscribe_and_unsubscribe_layout() {
        let packet = Subscribe {
            topic: "cmd",
            qos: QoS::AtLeastOnce,
            packet_id: 0xBEEF,
        }
        .encode()
        .unwrap();
        assert_eq!(&packet[..], &[0x82, 8, 0xBE, 0xEF, 0, 3, b'c', b'm', b'd', 1]);

        let packet = Unsubscribe {
            topic: "cmd",
            packet_id: 0xBEEF,
        }
        .encode()
        .unwrap();
        assert_eq!(&packet[..], &[0xA2, 7, 0xBE, 0xEF, 0, 3, b'c', b'm', b'd']);
    }

    #[test]
    fn return_codes_map_to_the_table() {
        assert_eq!(ConnectReturnCode::from(0), ConnectReturnCode::Accepted);
        assert_eq!(ConnectReturnCode::from(5), ConnectReturnCode::NotAuthorized);
        assert_eq!(ConnectReturnCode::from(9), ConnectReturnCode::Other(9));
        assert_eq!(QoS::try_from(2), Err(2));
    }
}
