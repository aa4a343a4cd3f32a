//! MQTT 3.1.1 client running over an emulated socket.
//!
//! The client is strictly request/response: a packet is written in full,
//! then the reply is awaited with a bounded wait. Nothing is pipelined, so
//! a QoS 1 publish does not return before its PUBACK arrived or the wait
//! ran out.
//!
//! # Broker-initiated messages
//!
//! PUBLISH packets that arrive while a reply is awaited are read and
//! discarded; the wait then starts over. There is no callback or inbox for
//! them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use libcellular::network::application::mqtt::{Client, Options, QoS};
//! # use embedded_hal::delay::DelayNs;
//! # use libcellular::time::Clock;
//! # struct Modem;
//! # impl libcellular::network::Socket for Modem {
//! #     type Error = ();
//! #     fn connect(&mut self, _h: &str, _p: u16) -> Result<(), ()> { Ok(()) }
//! #     fn disconnect(&mut self) -> Result<(), ()> { Ok(()) }
//! #     fn connected(&mut self) -> Result<bool, ()> { Ok(true) }
//! #     fn send(&mut self, _d: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn available(&mut self) -> Result<usize, ()> { Ok(0) }
//! #     fn receive(&mut self, _b: &mut [u8]) -> Result<usize, ()> { Ok(0) }
//! # }
//! # struct Ticks;
//! # impl DelayNs for Ticks { fn delay_ns(&mut self, _ns: u32) {} }
//! # impl Clock for Ticks { fn now_ms(&self) -> u64 { 0 } }
//! # struct Dice;
//! # impl rand_core::RngCore for Dice {
//! #     fn next_u32(&mut self) -> u32 { 4 }
//! #     fn next_u64(&mut self) -> u64 { 4 }
//! #     fn fill_bytes(&mut self, d: &mut [u8]) { d.fill(4) }
//! #     fn try_fill_bytes(&mut self, d: &mut [u8]) -> Result<(), rand_core::Error> { d.fill(4); Ok(()) }
//! # }
//!
//! let mut options = Options::new("broker.example.com");
//! options.port = 8883;
//! options.client_id = Some("gateway-01");
//!
//! let mut client = Client::new(Modem, Ticks, Dice, options)?;
//! if client.connect()? {
//!     client.publish("sensors/pm25", b"12", QoS::AtLeastOnce, false)?;
//! }
//! # Ok::<(), libcellular::network::application::mqtt::Error<()>>(())
//! ```

use super::error::Error;
use super::packet::{
    self, CONNACK_HEADER, ConnectReturnCode, DISCONNECT_PACKET, Encode, PINGREQ_PACKET,
    PINGRESP_HEADER, PUBACK_HEADER, QoS, SUBACK_FAILURE, SUBACK_HEADER, UNSUBACK_HEADER,
};
use crate::network::Socket;
use crate::time::{Clock, Deadline};
use heapless::String;
use rand_core::RngCore;

/// How long a reply from the broker may take.
pub const RESPONSE_TIMEOUT_MS: u32 = 120_000;

/// Grace period between DISCONNECT and closing the socket.
pub const DISCONNECT_GRACE_MS: u32 = 500;

/// Longest client identifier the client stores.
pub const MAX_CLIENT_ID: usize = 64;

const POLL_INTERVAL_MS: u32 = 200;
const DRAIN_CHUNK: usize = 64;

/// Client identifier storage.
pub type ClientId = String<MAX_CLIENT_ID>;

/// Connection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options<'a> {
    /// Broker host name or address.
    pub broker: &'a str,
    /// Broker TCP port.
    pub port: u16,
    /// Client identifier; a random one is generated when `None`.
    pub client_id: Option<&'a str>,
    /// User name for the CONNECT packet.
    pub username: Option<&'a str>,
    /// Password for the CONNECT packet.
    pub password: Option<&'a str>,
    /// Keep-alive interval in seconds, 0 disables pings.
    pub keep_alive_seconds: u16,
    /// Start without any session state stored by the broker.
    pub clean_session: bool,
}

impl<'a> Options<'a> {
    /// Defaults for `broker`: port 1883, 300 s keep-alive, clean session,
    /// generated client identifier, no credentials.
    pub fn new(broker: &'a str) -> Self {
        Self {
            broker,
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            keep_alive_seconds: 300,
            clean_session: true,
        }
    }
}

/// MQTT session over a [`Socket`].
///
/// `C` supplies time for reply and keep-alive deadlines, `R` the random
/// client identifier and SUBSCRIBE/UNSUBSCRIBE packet identifiers.
pub struct Client<'a, S, C, R> {
    socket: S,
    clock: C,
    rng: R,
    options: Options<'a>,
    client_id: ClientId,
    packet_id: u16,
    next_ping_ms: Option<u64>,
    last_refusal: Option<ConnectReturnCode>,
}

impl<S, C, R> core::fmt::Debug for Client<'_, S, C, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("broker", &self.options.broker)
            .field("port", &self.options.port)
            .field("client_id", &self.client_id)
            .field("packet_id", &self.packet_id)
            .finish()
    }
}

impl<'a, S, C, R> Client<'a, S, C, R>
where
    S: Socket,
    C: Clock,
    R: RngCore,
{
    /// Create a client. Nothing is sent until [`connect`](Client::connect).
    ///
    /// Without a configured identifier one is derived from 128 random bits
    /// and rendered as 32 hex digits.
    pub fn new(socket: S, clock: C, mut rng: R, options: Options<'a>) -> Result<Self, Error<S::Error>> {
        let client_id = match options.client_id.filter(|id| !id.is_empty()) {
            Some(id) => ClientId::try_from(id).map_err(|_| Error::PacketTooLarge)?,
            None => generate_client_id(&mut rng)?,
        };
        Ok(Self {
            socket,
            clock,
            rng,
            options,
            client_id,
            packet_id: 0,
            next_ping_ms: None,
            last_refusal: None,
        })
    }

    /// The identifier sent in CONNECT.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Why the broker refused the last CONNECT, if it did.
    pub fn last_refusal(&self) -> Option<ConnectReturnCode> {
        self.last_refusal
    }

    /// Change the keep-alive interval; takes effect from the next ping.
    pub fn set_keep_alive(&mut self, seconds: u16) {
        self.options.keep_alive_seconds = seconds;
        if self.next_ping_ms.is_some() {
            self.schedule_ping();
        }
    }

    /// The socket underneath.
    pub fn socket(&mut self) -> &mut S {
        &mut self.socket
    }

    /// Whether the socket is connected.
    pub fn connected(&mut self) -> Result<bool, Error<S::Error>> {
        self.socket.connected().map_err(Error::Socket)
    }

    /// Open the socket if needed and run the CONNECT/CONNACK handshake.
    ///
    /// `Ok(false)` means the broker refused (see
    /// [`last_refusal`](Client::last_refusal)) or never answered.
    pub fn connect(&mut self) -> Result<bool, Error<S::Error>> {
        if !self.connected()? {
            self.socket
                .connect(self.options.broker, self.options.port)
                .map_err(Error::Socket)?;
        }

        let packet = packet::Connect {
            client_id: &self.client_id,
            username: self.options.username,
            password: self.options.password,
            keep_alive_seconds: self.options.keep_alive_seconds,
            clean_session: self.options.clean_session,
        }
        .encode()?;
        self.socket.send(&packet).map_err(Error::Socket)?;

        let deadline = Deadline::after(&self.clock, RESPONSE_TIMEOUT_MS);
        if !self.wait_for_response(CONNACK_HEADER)? {
            warn!("no CONNACK from broker");
            return Ok(false);
        }
        let mut body = [0u8; 2];
        if !self.read_exact(&mut body, &deadline)? {
            warn!("CONNACK truncated");
            return Ok(false);
        }

        if body[0] & 0x01 != 0 {
            info!("broker holds a stored session");
        }
        match ConnectReturnCode::from(body[1]) {
            ConnectReturnCode::Accepted => {
                info!("MQTT connection accepted");
                self.last_refusal = None;
                self.schedule_ping();
                Ok(true)
            }
            refusal => {
                warn!("MQTT connection refused: {}", refusal.description());
                self.last_refusal = Some(refusal);
                Ok(false)
            }
        }
    }

    /// Best-effort DISCONNECT, then close the socket.
    pub fn disconnect(&mut self) -> Result<(), Error<S::Error>> {
        if self.socket.send(&DISCONNECT_PACKET).is_err() {
            debug!("DISCONNECT not delivered");
        }
        self.clock.delay_ms(DISCONNECT_GRACE_MS);
        self.next_ping_ms = None;
        self.socket.disconnect().map_err(Error::Socket)
    }

    /// Publish `payload` on `topic`.
    ///
    /// At QoS 0 this returns as soon as the packet is sent. At QoS 1 it
    /// returns `Ok(true)` only after a PUBACK carrying the same packet
    /// identifier arrived.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<bool, Error<S::Error>> {
        self.ensure_connected()?;
        let packet_id = match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => self.next_packet_id(),
        };
        let packet = packet::Publish {
            topic,
            payload,
            qos,
            retain,
            packet_id,
        }
        .encode()?;
        self.socket.send(&packet).map_err(Error::Socket)?;
        debug!("published {} bytes", payload.len());

        if qos == QoS::AtMostOnce {
            return Ok(true);
        }
        let acked = self.expect_ack(PUBACK_HEADER, packet_id)?;
        if !acked {
            warn!("no matching PUBACK for packet {}", packet_id);
        }
        Ok(acked)
    }

    /// Subscribe to `topic`, returning the QoS the broker granted or `None`
    /// when it refused.
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<Option<QoS>, Error<S::Error>> {
        self.ensure_connected()?;
        let packet_id = self.random_packet_id();
        let packet = packet::Subscribe {
            topic,
            qos,
            packet_id,
        }
        .encode()?;
        self.socket.send(&packet).map_err(Error::Socket)?;

        let deadline = Deadline::after(&self.clock, RESPONSE_TIMEOUT_MS);
        if !self.wait_for_response(SUBACK_HEADER)? {
            return Ok(None);
        }
        let mut body = [0u8; 3];
        if !self.read_exact(&mut body, &deadline)? {
            return Ok(None);
        }
        if u16::from_be_bytes([body[0], body[1]]) != packet_id {
            warn!("SUBACK for another packet");
            return Ok(None);
        }
        match body[2] {
            SUBACK_FAILURE => {
                warn!("subscription refused");
                Ok(None)
            }
            granted => QoS::try_from(granted)
                .map(Some)
                .map_err(|_| Error::InvalidQoS),
        }
    }

    /// Unsubscribe from `topic`.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<bool, Error<S::Error>> {
        self.ensure_connected()?;
        let packet_id = self.random_packet_id();
        let packet = packet::Unsubscribe { topic, packet_id }.encode()?;
        self.socket.send(&packet).map_err(Error::Socket)?;
        self.expect_ack(UNSUBACK_HEADER, packet_id)
    }

    /// PINGREQ / PINGRESP round trip.
    pub fn ping(&mut self) -> Result<bool, Error<S::Error>> {
        self.ensure_connected()?;
        self.socket.send(&PINGREQ_PACKET).map_err(Error::Socket)?;
        trace!("ping");
        self.wait_for_response(PINGRESP_HEADER)
    }

    /// Keep-alive maintenance, to be called periodically.
    ///
    /// Pings once the keep-alive interval has passed. A failed ping closes
    /// the connection and returns `Ok(false)`; the owner reconnects.
    pub fn poll(&mut self) -> Result<bool, Error<S::Error>> {
        let Some(next_ping_ms) = self.next_ping_ms else {
            return Ok(true);
        };
        if self.clock.now_ms() < next_ping_ms {
            return Ok(true);
        }
        self.schedule_ping();

        match self.ping() {
            Ok(true) => Ok(true),
            Ok(false) => {
                info!("no ping response, disconnecting");
                self.disconnect()?;
                Ok(false)
            }
            Err(e) => {
                info!("ping failed, disconnecting");
                // the ping error is what the caller needs to see
                let _ = self.disconnect();
                Err(e)
            }
        }
    }

    fn ensure_connected(&mut self) -> Result<(), Error<S::Error>> {
        if self.connected()? {
            Ok(())
        } else {
            warn!("MQTT not connected");
            Err(Error::NotConnected)
        }
    }

    fn schedule_ping(&mut self) {
        self.next_ping_ms = match self.options.keep_alive_seconds {
            0 => None,
            seconds => Some(self.clock.now_ms() + u64::from(seconds) * 1_000),
        };
    }

    fn next_packet_id(&mut self) -> u16 {
        self.packet_id = self.packet_id.wrapping_add(1);
        self.packet_id
    }

    fn random_packet_id(&mut self) -> u16 {
        (self.rng.next_u32() as u16).max(1)
    }

    /// Wait for `header` followed by the 2-byte `packet_id`.
    fn expect_ack(&mut self, header: [u8; 2], packet_id: u16) -> Result<bool, Error<S::Error>> {
        let deadline = Deadline::after(&self.clock, RESPONSE_TIMEOUT_MS);
        if !self.wait_for_response(header)? {
            return Ok(false);
        }
        let mut id = [0u8; 2];
        if !self.read_exact(&mut id, &deadline)? {
            return Ok(false);
        }
        Ok(u16::from_be_bytes(id) == packet_id)
    }

    /// Wait until the next fixed header equals `expected`.
    ///
    /// PUBLISH packets met on the way are drained and restart the wait.
    /// Any other header is a protocol violation. `Ok(false)` on timeout.
    fn wait_for_response(&mut self, expected: [u8; 2]) -> Result<bool, Error<S::Error>> {
        let mut deadline = Deadline::after(&self.clock, RESPONSE_TIMEOUT_MS);
        loop {
            let pending = self.socket.available().map_err(Error::Socket)?;
            if pending >= 2 {
                let mut header = [0u8; 2];
                if !self.read_exact(&mut header, &deadline)? {
                    return Ok(false);
                }
                if header == expected {
                    return Ok(true);
                }
                if packet::is_publish(header[0]) {
                    let length = self.read_publish_length(header[1], &deadline)?;
                    let Some(length) = length else {
                        return Ok(false);
                    };
                    debug!("discarding broker PUBLISH of {} bytes", length);
                    if !self.drain(length, &deadline)? {
                        return Ok(false);
                    }
                    deadline = Deadline::after(&self.clock, RESPONSE_TIMEOUT_MS);
                    continue;
                }
                error!("unprocessable packet {:?}", header);
                return Err(Error::ProtocolViolation(header));
            }

            if deadline.expired(&self.clock) {
                return Ok(false);
            }
            self.clock.delay_ms(POLL_INTERVAL_MS);
        }
    }

    fn read_publish_length(
        &mut self,
        first: u8,
        deadline: &Deadline,
    ) -> Result<Option<usize>, Error<S::Error>> {
        let mut field = [first, 0];
        if first & 0x80 != 0 && !self.read_exact(&mut field[1..], deadline)? {
            return Ok(None);
        }
        let (length, _) = packet::decode_remaining_length(&field)?;
        Ok(Some(length))
    }

    fn drain(&mut self, mut remaining: usize, deadline: &Deadline) -> Result<bool, Error<S::Error>> {
        let mut scratch = [0u8; DRAIN_CHUNK];
        while remaining > 0 {
            let step = remaining.min(DRAIN_CHUNK);
            if !self.read_exact(&mut scratch[..step], deadline)? {
                return Ok(false);
            }
            remaining -= step;
        }
        Ok(true)
    }

    /// Fill `buf` from the socket, `Ok(false)` if the deadline passes first.
    fn read_exact(&mut self, buf: &mut [u8], deadline: &Deadline) -> Result<bool, Error<S::Error>> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .socket
                .receive(&mut buf[filled..])
                .map_err(Error::Socket)?;
            if n > 0 {
                filled += n;
                continue;
            }
            if deadline.expired(&self.clock) {
                return Ok(false);
            }
            self.clock.delay_ms(POLL_INTERVAL_MS);
        }
        Ok(true)
    }
}

fn generate_client_id<R: RngCore, E>(rng: &mut R) -> Result<ClientId, Error<E>> {
    let mut seed = [0u8; 16];
    rng.fill_bytes(&mut seed);
    let mut text = [0u8; 32];
    hex::encode_to_slice(seed, &mut text).map_err(|_| Error::PacketTooLarge)?;
    let text = core::str::from_utf8(&text).map_err(|_| Error::PacketTooLarge)?;
    ClientId::try_from(text).map_err(|_| Error::PacketTooLarge)
}
