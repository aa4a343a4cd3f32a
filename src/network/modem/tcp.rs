//! TCP socket emulated through the modem's `AT+CIP*` commands.

use super::command;
use super::error::Error;
use super::response;
use super::session::{Apn, DEFAULT_REPLY_TIMEOUT_MS, Reply, Session, State};
use crate::network::{LineChannel, Socket};
use crate::time::Clock;

/// How long the modem may take to report `CONNECT OK`.
pub const CONNECT_TIMEOUT_MS: u32 = 800_000;

/// How long the modem may take to report `SEND OK`.
pub const SEND_TIMEOUT_MS: u32 = 10_000;

/// Largest payload handed to the modem in one `AT+CIPSEND` or fetched in
/// one `AT+CIPRXGET=3`.
pub const MAX_CHUNK: usize = 730;

/// Attempts made for an operation failing with a transient error.
pub const TRANSIENT_RETRIES: u32 = 3;

/// Pause between two attempts.
pub const RETRY_PAUSE_MS: u32 = 1_000;

/// Connection state as seen by the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TcpState {
    /// No connection.
    Disconnected,
    /// A connect sequence is running.
    Connecting,
    /// `CONNECT OK` was reported.
    Connected,
}

/// Runs `op`, repeating it while it fails with a transient error.
///
/// A fatal error is returned at once and leaves the session in
/// [`State::Init`].
fn with_retries<L, C, T, F>(session: &mut Session<L, C>, mut op: F) -> Result<T, Error>
where
    L: LineChannel,
    C: Clock,
    F: FnMut(&mut Session<L, C>) -> Result<T, Error>,
{
    let mut attempt = 1;
    loop {
        match op(session) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < TRANSIENT_RETRIES => {
                warn!("modem answered {:?}, attempt {} of {}", e, attempt, TRANSIENT_RETRIES);
                attempt += 1;
                session.delay_ms(RETRY_PAUSE_MS);
            }
            Err(e) => {
                if e.is_fatal() {
                    error!("modem needs a reset: {:?}", e);
                    session.reset();
                }
                return Err(e);
            }
        }
    }
}

/// [`Socket`] implementation on top of an AT [`Session`].
///
/// Received data stays in the modem (`AT+CIPRXGET=1`) until asked for, and
/// payloads travel as hex text in both directions (`AT+CIPSENDHEX=1`,
/// `AT+CIPRXGET=3`). Callers only ever see bytes.
#[derive(Debug)]
pub struct TcpSocket<L, C> {
    session: Session<L, C>,
    state: TcpState,
    apn: Option<Apn>,
}

impl<L, C> TcpSocket<L, C>
where
    L: LineChannel,
    C: Clock,
{
    /// Wrap an initialised session.
    pub fn new(session: Session<L, C>) -> Self {
        Self {
            session,
            state: TcpState::Disconnected,
            apn: None,
        }
    }

    /// Use `apn` instead of the APN the network reports.
    pub fn with_apn(mut self, apn: &str) -> Result<Self, Error> {
        self.apn = Some(Apn::try_from(apn).map_err(|_| Error::PayloadTooLarge)?);
        Ok(self)
    }

    /// Current connection state.
    pub fn state(&self) -> TcpState {
        self.state
    }

    /// The session underneath.
    pub fn session(&mut self) -> &mut Session<L, C> {
        &mut self.session
    }

    /// Give the session back.
    pub fn release(self) -> Session<L, C> {
        self.session
    }

    fn settle<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.state = TcpState::Disconnected;
            }
        }
        result
    }

    fn open(session: &mut Session<L, C>, host: &str, port: u16, apn: Option<&str>) -> Result<(), Error> {
        session.deactivate_pdp()?;
        session.execute(command::RX_MANUAL)?;
        session.execute(command::TX_HEX)?;

        let apn = match apn {
            Some(apn) => Apn::try_from(apn).map_err(|_| Error::PayloadTooLarge)?,
            None => session.get_apn()?.unwrap_or_default(),
        };
        debug!("using APN {}", apn.as_str());
        session.set_apn(&apn)?;
        session.bring_up()?;

        match session.local_ip()? {
            Some(ip) => debug!("local address {}", ip.as_str()),
            None => debug!("local address not reported"),
        }

        let text = command::tcp_connect(host, port)?;
        session.run(&text, Reply::Line("CONNECT OK"), CONNECT_TIMEOUT_MS)
    }

    fn send_chunk(session: &mut Session<L, C>, chunk: &[u8]) -> Result<(), Error> {
        let mut buffer = [0u8; 2 * MAX_CHUNK];
        let encoded = &mut buffer[..2 * chunk.len()];
        hex::encode_to_slice(chunk, encoded).map_err(|_| Error::PayloadTooLarge)?;
        encoded.make_ascii_uppercase();

        let text = command::send(chunk.len())?;
        session.run(&text, Reply::Prompt("> "), DEFAULT_REPLY_TIMEOUT_MS)?;
        session.write_raw(encoded)?;
        session.wait_for(Reply::Line("SEND OK"), SEND_TIMEOUT_MS, |_| {})
    }

    fn read_chunk(session: &mut Session<L, C>, buf: &mut [u8]) -> Result<usize, Error> {
        let text = command::read_hex(buf.len())?;
        let requested = buf.len();
        let mut header = None;
        let mut payload = None;
        session.command(&text, Reply::OK, DEFAULT_REPLY_TIMEOUT_MS, |line| {
            if payload.is_some() {
                return;
            }
            match header {
                Some(count) => {
                    let decoded = line.len() == 2 * count
                        && hex::decode_to_slice(line, &mut buf[..count]).is_ok();
                    payload = Some(decoded.then_some(count));
                }
                None => {
                    if let Some((count, left)) = response::rx_hex_header(line) {
                        trace!("reading {} bytes, {} left in modem", count, left);
                        header = Some(count);
                        if count == 0 {
                            payload = Some(Some(0));
                        } else if count > requested {
                            payload = Some(None);
                        }
                    }
                }
            }
        })?;

        match payload {
            Some(Some(count)) => Ok(count),
            _ => {
                warn!("hex read did not match its header");
                Err(Error::UnexpectedResponse)
            }
        }
    }
}

impl<L, C> Socket for TcpSocket<L, C>
where
    L: LineChannel,
    C: Clock,
{
    type Error = Error;

    /// Runs the full bring-up and waits for `CONNECT OK`.
    ///
    /// `ERROR` answers restart the whole sequence, up to
    /// [`TRANSIENT_RETRIES`] times; a silent modem fails at once.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        info!("connecting to {}:{}", host, port);
        self.state = TcpState::Connecting;
        let apn = self.apn.as_deref();
        let result = with_retries(&mut self.session, |session| Self::open(session, host, port, apn));
        match result {
            Ok(()) => {
                self.state = TcpState::Connected;
                self.session.set_state(State::SocketConnected);
                info!("TCP connected");
                Ok(())
            }
            Err(e) => {
                self.state = TcpState::Disconnected;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        let result = with_retries(&mut self.session, |session| session.deactivate_pdp());
        if result.is_ok() {
            self.state = TcpState::Disconnected;
            info!("TCP disconnected");
        }
        self.settle(result)
    }

    fn connected(&mut self) -> Result<bool, Self::Error> {
        let result = with_retries(&mut self.session, |session| {
            let mut status = None;
            session.command(
                command::TCP_STATUS,
                Reply::Prefix("STATE: "),
                DEFAULT_REPLY_TIMEOUT_MS,
                |line| {
                    if let Some(state) = response::tcp_state(line) {
                        status = Some(state == "CONNECT OK");
                    }
                },
            )?;
            status.ok_or(Error::UnexpectedResponse)
        });
        let connected = self.settle(result)?;

        if connected {
            self.state = TcpState::Connected;
            self.session.set_state(State::SocketConnected);
        } else if self.state == TcpState::Connected {
            warn!("modem reports the connection gone");
            self.state = TcpState::Disconnected;
            if self.session.state() == State::SocketConnected {
                self.session.set_state(State::NetworkAttached);
            }
        }
        Ok(connected)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for chunk in data.chunks(MAX_CHUNK) {
            let result = with_retries(&mut self.session, |session| Self::send_chunk(session, chunk));
            self.settle(result)?;
        }
        trace!("sent {} bytes", data.len());
        Ok(())
    }

    fn available(&mut self) -> Result<usize, Self::Error> {
        let result = with_retries(&mut self.session, |session| {
            let mut count = None;
            session.command(
                command::RX_AVAILABLE,
                Reply::OK,
                DEFAULT_REPLY_TIMEOUT_MS,
                |line| {
                    if let Some(n) = response::rx_available(line) {
                        count = Some(n);
                    }
                },
            )?;
            count.ok_or(Error::UnexpectedResponse)
        });
        let count = self.settle(result)?;
        if count == 0 {
            self.session.clear_data_pending();
        }
        Ok(count)
    }

    /// Fetches at most [`MAX_CHUNK`] bytes per call.
    ///
    /// A header or payload that does not add up is re-requested; the modem
    /// keeps the bytes until a read succeeds.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let len = buf.len().min(MAX_CHUNK);
        if len == 0 {
            return Ok(0);
        }
        let buf = &mut buf[..len];
        let result = with_retries(&mut self.session, |session| Self::read_chunk(session, buf));
        self.settle(result)
    }
}
