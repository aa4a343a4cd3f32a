//! AT command session.
//!
//! A [`Session`] owns the line channel to the modem and runs one
//! request/response exchange at a time. Every exchange is bounded by a
//! timeout; the only way to wait is [`Session::wait_for`], which polls the
//! channel and sleeps through the [`Clock`] between polls.

use super::command::{self, Command};
use super::error::Error;
use super::response::{self, SignalQuality};
use crate::network::LineChannel;
use crate::time::{Clock, Deadline};
use heapless::String;

/// Reply timeout for ordinary commands.
pub const DEFAULT_REPLY_TIMEOUT_MS: u32 = 2_000;

/// How long `AT+CIPSHUT` may take to answer `SHUT OK`.
pub const SHUT_TIMEOUT_MS: u32 = 15_000;

/// How long `AT+CIICR` may take to bring the bearer up.
pub const BRING_UP_TIMEOUT_MS: u32 = 10_000;

/// Readiness queries issued before giving up with [`Error::ModuleNotReady`].
pub const READY_ATTEMPTS: u32 = 10;

/// Attach-status queries issued while waiting for the network after init.
pub const ATTACH_ATTEMPTS: u32 = 30;

/// Pause between readiness and attach queries.
pub const RETRY_INTERVAL_MS: u32 = 1_000;

/// Longest line the session buffers.
///
/// Sized for a full 730-byte hex read plus its terminator.
pub const LINE_CAPACITY: usize = 1_536;

const POLL_INTERVAL_MS: u32 = 50;

/// Longest APN the session keeps.
pub type Apn = String<64>;

/// Dotted-quad address text.
pub type Ipv4 = String<15>;

/// Where the session is in bringing the modem up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing is known about the modem, [`Session::init`] has to run.
    Init,
    /// The SIM is ready and echo is off.
    Ready,
    /// The modem reports a packet-domain attach.
    NetworkAttached,
    /// A TCP connection is established.
    SocketConnected,
}

/// What ends a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    /// A line equal to this text (terminator excluded).
    Line(&'a str),
    /// A line starting with this text.
    Prefix(&'a str),
    /// This text at the end of the buffered input, terminated or not.
    /// Used for the `"> "` send prompt.
    Prompt(&'a str),
    /// The first non-empty line, whatever it says.
    AnyLine,
}

impl Reply<'static> {
    /// The usual `OK` terminator.
    pub const OK: Reply<'static> = Reply::Line("OK");
}

/// AT session over a [`LineChannel`].
///
/// The session only ever talks to the modem in strict request/response
/// order. Besides the awaited reply, every line passing through
/// [`wait_for`](Session::wait_for) is checked for the unsolicited
/// `+CIPRXGET: 1` notice; seeing it sets a sticky flag readable through
/// [`data_pending`](Session::data_pending).
pub struct Session<L, C> {
    channel: L,
    clock: C,
    state: State,
    data_pending: bool,
    line: [u8; LINE_CAPACITY],
    filled: usize,
}

impl<L, C> core::fmt::Debug for Session<L, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("data_pending", &self.data_pending)
            .field("buffered", &self.filled)
            .finish()
    }
}

impl<L, C> Session<L, C>
where
    L: LineChannel,
    C: Clock,
{
    /// Create a session in the [`State::Init`] state. Nothing is sent.
    pub fn new(channel: L, clock: C) -> Self {
        Self {
            channel,
            clock,
            state: State::Init,
            data_pending: false,
            line: [0; LINE_CAPACITY],
            filled: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("session state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Forget everything known about the modem.
    pub fn reset(&mut self) {
        self.set_state(State::Init);
        self.filled = 0;
    }

    /// Whether the modem announced received data since the last
    /// [`clear_data_pending`](Session::clear_data_pending).
    pub fn data_pending(&self) -> bool {
        self.data_pending
    }

    /// Clear the received-data notice.
    pub fn clear_data_pending(&mut self) {
        self.data_pending = false;
    }

    /// Sleep for `ms` milliseconds on the session clock.
    pub fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }

    /// The session clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Give the channel and clock back.
    pub fn release(self) -> (L, C) {
        (self.channel, self.clock)
    }

    /// Send raw bytes that are not a command, such as a send payload.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!("raw write of {} bytes", data.len());
        self.channel.send(data).map_err(|_| {
            error!("channel send failed");
            self.reset();
            Error::Channel
        })
    }

    /// Send `text` and wait for `reply`, handing every line seen on the way
    /// to `visit`.
    pub fn command<F>(
        &mut self,
        text: &str,
        reply: Reply<'_>,
        timeout_ms: u32,
        visit: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&str),
    {
        trace!(">> {}", text.trim_end());
        self.write_raw(text.as_bytes())?;
        self.wait_for(reply, timeout_ms, visit)
    }

    /// Send `text` and wait for `OK`, ignoring anything else.
    pub fn execute(&mut self, text: &str) -> Result<(), Error> {
        self.command(text, Reply::OK, DEFAULT_REPLY_TIMEOUT_MS, |_| {})
    }

    /// Read lines until `reply` is seen.
    ///
    /// A failure line (`ERROR`, `CONNECT FAIL`, `SEND FAIL`) ends the wait
    /// with [`Error::CommandFailed`]. Running out of time ends it with
    /// [`Error::NoReply`] and puts the session back into [`State::Init`].
    pub fn wait_for<F>(&mut self, reply: Reply<'_>, timeout_ms: u32, mut visit: F) -> Result<(), Error>
    where
        F: FnMut(&str),
    {
        let deadline = Deadline::after(&self.clock, timeout_ms);
        loop {
            let received = self
                .channel
                .read_line(&mut self.line[self.filled..])
                .map_err(|_| {
                    error!("channel read failed");
                    Error::Channel
                });
            let received = match received {
                Ok(n) => n,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            self.filled += received;

            let terminated = self.filled > 0 && self.line[self.filled - 1] == b'\n';
            if terminated || self.filled == LINE_CAPACITY {
                let outcome = self.take_line(reply, &mut visit);
                self.filled = 0;
                if let Some(result) = outcome {
                    return result;
                }
                if deadline.expired(&self.clock) {
                    warn!("no matching reply within {} ms", timeout_ms);
                    self.reset();
                    return Err(Error::NoReply);
                }
                continue;
            }

            if let Reply::Prompt(prompt) = reply {
                if self.line[..self.filled].ends_with(prompt.as_bytes()) {
                    trace!("<< prompt");
                    self.filled = 0;
                    return Ok(());
                }
            }

            if received == 0 {
                if deadline.expired(&self.clock) {
                    warn!("no reply within {} ms", timeout_ms);
                    self.reset();
                    return Err(Error::NoReply);
                }
                self.clock.delay_ms(POLL_INTERVAL_MS);
            }
        }
    }

    /// Look at one complete buffered line. `Some` ends the wait.
    fn take_line<F>(&mut self, reply: Reply<'_>, visit: &mut F) -> Option<Result<(), Error>>
    where
        F: FnMut(&str),
    {
        let text = match core::str::from_utf8(&self.line[..self.filled]) {
            Ok(text) => text.trim(),
            Err(_) => {
                debug!("skipping non-text line of {} bytes", self.filled);
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }
        trace!("<< {}", text);

        if response::is_data_pending(text) {
            self.data_pending = true;
        }
        if response::is_failure(text) {
            return Some(Err(Error::CommandFailed));
        }
        visit(text);

        let done = match reply {
            Reply::Line(token) => text == token,
            Reply::Prefix(prefix) => text.starts_with(prefix),
            Reply::Prompt(prompt) => text == prompt.trim(),
            Reply::AnyLine => true,
        };
        done.then_some(Ok(()))
    }

    /// `AT`: is anything answering?
    pub fn test_module(&mut self) -> Result<(), Error> {
        self.execute(command::TEST)
    }

    /// `AT+CPIN?`: is the SIM ready?
    pub fn module_ready(&mut self) -> Result<bool, Error> {
        let mut ready = false;
        self.command(
            command::CHECK_READY,
            Reply::OK,
            DEFAULT_REPLY_TIMEOUT_MS,
            |line| ready |= response::cpin_ready(line),
        )?;
        Ok(ready)
    }

    /// `ATE0` / `ATE1`
    pub fn set_echo(&mut self, enabled: bool) -> Result<(), Error> {
        self.execute(if enabled {
            command::ECHO_ON
        } else {
            command::ECHO_OFF
        })
    }

    /// Bring the session from [`State::Init`] to at least [`State::Ready`].
    ///
    /// Probes the modem with `AT`, then queries SIM readiness up to
    /// [`READY_ATTEMPTS`] times one second apart; an `ERROR` answer counts
    /// as "not ready yet". With the SIM ready echo is turned off and the
    /// packet-domain attach is awaited for up to [`ATTACH_ATTEMPTS`]
    /// seconds. A modem that never attaches leaves the session in
    /// [`State::Ready`].
    pub fn init(&mut self) -> Result<(), Error> {
        self.reset();
        self.test_module()?;

        let mut ready = false;
        for attempt in 1..=READY_ATTEMPTS {
            match self.module_ready() {
                Ok(true) => {
                    ready = true;
                    break;
                }
                Ok(false) | Err(Error::CommandFailed) => {
                    debug!("waiting for SIM, attempt {}", attempt);
                }
                Err(e) => return Err(e),
            }
            self.clock.delay_ms(RETRY_INTERVAL_MS);
        }
        if !ready {
            error!("module not ready after {} attempts", READY_ATTEMPTS);
            return Err(Error::ModuleNotReady);
        }

        self.set_echo(false)?;
        self.set_state(State::Ready);
        info!("modem ready");

        for _ in 0..ATTACH_ATTEMPTS {
            if self.check_attached()? == Some(true) {
                return Ok(());
            }
            info!("waiting for network attach");
            self.clock.delay_ms(RETRY_INTERVAL_MS);
        }
        warn!("network not attached after {} s", ATTACH_ATTEMPTS);
        Ok(())
    }

    /// `AT+CIPSHUT`: drop the PDP context and any socket with it.
    pub fn deactivate_pdp(&mut self) -> Result<(), Error> {
        self.command(
            command::SHUT,
            Reply::Line("SHUT OK"),
            SHUT_TIMEOUT_MS,
            |_| {},
        )?;
        if self.state == State::SocketConnected {
            self.set_state(State::NetworkAttached);
        }
        Ok(())
    }

    /// `AT+CGNAPN`: the APN the network offers, `None` when not reported.
    pub fn get_apn(&mut self) -> Result<Option<Apn>, Error> {
        let mut apn = None;
        self.command(
            command::GET_APN,
            Reply::OK,
            DEFAULT_REPLY_TIMEOUT_MS,
            |line| {
                if let Some(name) = response::apn(line) {
                    apn = Apn::try_from(name).ok();
                }
            },
        )?;
        Ok(apn)
    }

    /// `AT+CSTT="<apn>"`
    pub fn set_apn(&mut self, apn: &str) -> Result<(), Error> {
        let text = command::set_apn(apn)?;
        self.execute(&text)
    }

    /// `AT+CGATT=1`
    pub fn attach(&mut self) -> Result<(), Error> {
        self.execute(command::ATTACH)
    }

    /// `AT+CIICR`
    pub fn bring_up(&mut self) -> Result<(), Error> {
        self.command(
            command::BRING_UP,
            Reply::OK,
            BRING_UP_TIMEOUT_MS,
            |_| {},
        )
    }

    /// `AT+CIFSR`: the modem answers with the bare address and no `OK`.
    pub fn local_ip(&mut self) -> Result<Option<Ipv4>, Error> {
        let mut address = None;
        self.command(
            command::LOCAL_IP,
            Reply::AnyLine,
            DEFAULT_REPLY_TIMEOUT_MS,
            |line| address = response::ipv4(line).and_then(|ip| Ipv4::try_from(ip).ok()),
        )?;
        Ok(address)
    }

    /// `AT+CGATT?`: `None` when the modem did not report the state.
    ///
    /// The answer also moves the session between [`State::Ready`] and
    /// [`State::NetworkAttached`].
    pub fn check_attached(&mut self) -> Result<Option<bool>, Error> {
        let mut attached = None;
        self.command(
            command::ATTACH_STATUS,
            Reply::OK,
            DEFAULT_REPLY_TIMEOUT_MS,
            |line| {
                if let Some(state) = response::attach_state(line) {
                    attached = Some(state);
                }
            },
        )?;
        match attached {
            Some(true) if self.state == State::Ready => self.set_state(State::NetworkAttached),
            Some(false) if self.state > State::Ready => {
                warn!("modem lost the network attach");
                self.set_state(State::Ready);
            }
            _ => {}
        }
        Ok(attached)
    }

    /// `AT+CSQ`
    pub fn signal_quality(&mut self) -> Result<Option<SignalQuality>, Error> {
        let mut quality = None;
        self.command(
            command::SIGNAL_QUALITY,
            Reply::OK,
            DEFAULT_REPLY_TIMEOUT_MS,
            |line| {
                if let Some(csq) = response::signal_quality(line) {
                    quality = Some(csq);
                }
            },
        )?;
        Ok(quality)
    }

    /// Run a command built by one of the [`command`] builders, ignoring
    /// everything but the awaited reply.
    pub fn run(&mut self, text: &Command, reply: Reply<'_>, timeout_ms: u32) -> Result<(), Error> {
        self.command(text, reply, timeout_ms, |_| {})
    }
}
