//! Byte stream over a framed link to the bridge microcontroller.

use super::error::Error;
use super::frame::{self, ACK_OK, ActiveReceive, CMD_ACTIVE_RECEIVE, CMD_BEGIN, CMD_TRANSMIT, Decoded, MAX_PAYLOAD};
use crate::network::{LineChannel, Read, Write};
use crate::time::{Clock, Deadline};
use heapless::{Deque, Vec};

/// Capacity of the buffer holding raw, not yet decoded bytes.
pub const RAW_CAPACITY: usize = frame::MAX_FRAME_LEN + 64;

/// Capacity of the decoded payload FIFO.
pub const FIFO_CAPACITY: usize = 4096;

/// How long the bridge gets to acknowledge a frame, per attempt.
pub const ACK_TIMEOUT_MS: u32 = 1_000;

/// Transmit attempts before a write is reported as failed.
pub const WRITE_ATTEMPTS: u32 = 10;

/// Pause between two transmit attempts.
pub const WRITE_BACKOFF_MS: u32 = 1_000;

/// How long a partially received frame may stay incomplete before it is
/// treated as a short read and dropped.
pub const FRAME_TIMEOUT_MS: u32 = 500;

const READ_CHUNK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ack {
    command: u8,
    status: u8,
}

/// Framed serial transport to the bridge MCU sitting in front of the modem.
///
/// Outbound bytes are wrapped in transmit frames and must be acknowledged;
/// inbound data frames are validated and their payload appended to a FIFO
/// that [`read`](Bridge::read) and [`read_line`](Bridge::read_line) consume
/// from the head. Corrupt input never escapes this type: the raw buffer is
/// discarded, [`framing_errors`](Bridge::framing_errors) is bumped and the
/// caller simply sees no data yet.
///
/// # Examples
///
/// ```rust,no_run
/// use libcellular::network::link::Bridge;
/// # use embedded_hal::delay::DelayNs;
/// # use libcellular::time::Clock;
/// # struct Uart;
/// # impl libcellular::network::Read for Uart {
/// #     type Error = ();
/// #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
/// # }
/// # impl libcellular::network::Write for Uart {
/// #     type Error = ();
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
/// #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # struct Ticks;
/// # impl DelayNs for Ticks { fn delay_ns(&mut self, _ns: u32) {} }
/// # impl Clock for Ticks { fn now_ms(&self) -> u64 { 0 } }
///
/// let mut bridge = Bridge::new(Uart, Ticks, 0);
/// bridge.begin()?;
/// bridge.write(b"AT\r\n")?;
/// # Ok::<(), libcellular::network::link::Error>(())
/// ```
pub struct Bridge<P, C> {
    port: P,
    clock: C,
    port_id: u8,
    receive_config: ActiveReceive,
    raw: Vec<u8, RAW_CAPACITY>,
    fifo: Deque<u8, FIFO_CAPACITY>,
    ack: Option<Ack>,
    framing_errors: u32,
}

impl<P, C> core::fmt::Debug for Bridge<P, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bridge")
            .field("port_id", &self.port_id)
            .field("buffered", &self.raw.len())
            .field("queued", &self.fifo.len())
            .field("framing_errors", &self.framing_errors)
            .finish()
    }
}

impl<P, C> Bridge<P, C>
where
    P: Read + Write,
    C: Clock,
{
    /// Wrap `port`; `port_id` selects the bridge UART the modem hangs off.
    pub fn new(port: P, clock: C, port_id: u8) -> Self {
        Self {
            port,
            clock,
            port_id,
            receive_config: ActiveReceive::default(),
            raw: Vec::new(),
            fifo: Deque::new(),
            ack: None,
            framing_errors: 0,
        }
    }

    /// Use `config` instead of the default active-receive settings.
    pub fn with_receive_config(mut self, config: ActiveReceive) -> Self {
        self.receive_config = config;
        self
    }

    /// Initialise the bridge and switch it to active receive.
    ///
    /// Each of the two configuration frames must be acknowledged within
    /// [`ACK_TIMEOUT_MS`], otherwise [`Error::BridgeNotReady`] is returned.
    pub fn begin(&mut self) -> Result<(), Error> {
        if !self.exchange(&frame::begin(), CMD_BEGIN)? {
            error!("bridge did not acknowledge begin");
            return Err(Error::BridgeNotReady);
        }

        let config = frame::active_receive(self.port_id, &self.receive_config);
        if !self.exchange(&config, CMD_ACTIVE_RECEIVE)? {
            error!("bridge did not acknowledge active receive");
            return Err(Error::BridgeNotReady);
        }

        info!("bridge ready on port {}", self.port_id);
        Ok(())
    }

    /// Send `data` through the bridge, one acknowledged frame per
    /// [`MAX_PAYLOAD`] bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        for chunk in data.chunks(MAX_PAYLOAD) {
            let frame = frame::transmit(self.port_id, chunk)?;
            self.transmit(&frame)?;
        }
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Error> {
        for attempt in 1..=WRITE_ATTEMPTS {
            if self.exchange(frame, CMD_TRANSMIT)? {
                trace!("frame of {} bytes acknowledged", frame.len());
                return Ok(());
            }
            warn!("transmit attempt {} not acknowledged", attempt);
            if attempt < WRITE_ATTEMPTS {
                self.clock.delay_ms(WRITE_BACKOFF_MS);
            }
        }
        error!("transmit failed after {} attempts", WRITE_ATTEMPTS);
        Err(Error::WriteFailed)
    }

    /// Pop up to `buf.len()` bytes from the FIFO after pulling in pending frames.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.poll()?;
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.fifo.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Drain the whole FIFO into `out`, stopping early if `out` fills up.
    pub fn read_all<const N: usize>(&mut self, out: &mut Vec<u8, N>) -> Result<usize, Error> {
        self.poll()?;
        let mut count = 0;
        while let Some(&byte) = self.fifo.front() {
            if out.push(byte).is_err() {
                break;
            }
            self.fifo.pop_front();
            count += 1;
        }
        Ok(count)
    }

    /// Pop bytes up to and including the first `\n`, or everything queued if
    /// no terminator has arrived.
    pub fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.poll()?;
        let mut count = 0;
        while count < buf.len() {
            let Some(byte) = self.fifo.pop_front() else {
                break;
            };
            buf[count] = byte;
            count += 1;
            if byte == b'\n' {
                break;
            }
        }
        Ok(count)
    }

    /// Bytes currently queued in the FIFO.
    pub fn available(&mut self) -> Result<usize, Error> {
        self.poll()?;
        Ok(self.fifo.len())
    }

    /// Frames dropped because they failed validation.
    pub fn framing_errors(&self) -> u32 {
        self.framing_errors
    }

    /// Give the port back.
    pub fn release(self) -> (P, C) {
        (self.port, self.clock)
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut sent = 0;
        while sent < bytes.len() {
            match self.port.write(&bytes[sent..]) {
                Ok(0) | Err(_) => return Err(Error::Io),
                Ok(n) => sent += n,
            }
        }
        self.port.flush().map_err(|_| Error::Io)
    }

    /// Send a command frame and wait for its acknowledgement.
    ///
    /// Acks already received, or still sitting in the port, belong to
    /// earlier frames and are dropped before sending.
    fn exchange(&mut self, frame: &[u8], command: u8) -> Result<bool, Error> {
        self.poll()?;
        if let Some(stale) = self.ack.take() {
            debug!("dropping stale ack for command {}", stale.command);
        }
        self.send_raw(frame)?;
        self.wait_ack(command, ACK_TIMEOUT_MS)
    }

    fn wait_ack(&mut self, command: u8, timeout_ms: u32) -> Result<bool, Error> {
        let deadline = Deadline::after(&self.clock, timeout_ms);
        loop {
            self.poll()?;
            if let Some(ack) = self.ack.take() {
                if ack.command == command {
                    if ack.status != ACK_OK {
                        warn!("bridge rejected command {} with status {}", command, ack.status);
                    }
                    return Ok(ack.status == ACK_OK);
                }
                debug!("ignoring ack for command {}", ack.command);
            }
            if deadline.expired(&self.clock) {
                return Ok(false);
            }
            self.clock.delay_ms(1);
        }
    }

    fn fill(&mut self) -> Result<usize, Error> {
        let spare = RAW_CAPACITY - self.raw.len();
        if spare == 0 {
            return Ok(0);
        }
        let mut chunk = [0u8; READ_CHUNK];
        let want = spare.min(READ_CHUNK);
        let n = self.port.read(&mut chunk[..want]).map_err(|_| Error::Io)?;
        self.raw
            .extend_from_slice(&chunk[..n])
            .map_err(|_| Error::Io)?;
        Ok(n)
    }

    /// Move every complete frame out of the raw buffer.
    ///
    /// Returns immediately when nothing is pending; a partially received
    /// frame is given up to [`FRAME_TIMEOUT_MS`] to complete.
    fn poll(&mut self) -> Result<(), Error> {
        let deadline = Deadline::after(&self.clock, FRAME_TIMEOUT_MS);
        loop {
            let received = self.fill()?;
            self.decode_pending()?;

            if self.raw.is_empty() && received == 0 {
                return Ok(());
            }
            if received == 0 {
                if deadline.expired(&self.clock) {
                    warn!("dropping {} bytes of a truncated frame", self.raw.len());
                    self.discard();
                    return Ok(());
                }
                self.clock.delay_ms(1);
            }
        }
    }

    fn decode_pending(&mut self) -> Result<(), Error> {
        loop {
            match frame::decode(&self.raw) {
                Decoded::Incomplete => return Ok(()),
                Decoded::Invalid => {
                    warn!("invalid frame, dropping {} buffered bytes", self.raw.len());
                    self.discard();
                    return Ok(());
                }
                Decoded::Ack {
                    command,
                    status,
                    consumed,
                } => {
                    self.ack = Some(Ack { command, status });
                    self.consume(consumed);
                }
                Decoded::Data {
                    port,
                    payload,
                    consumed,
                } => {
                    let mut overflow = false;
                    if port != self.port_id {
                        debug!("ignoring data for bridge port {}", port);
                    } else {
                        for &byte in &self.raw[payload] {
                            if self.fifo.push_back(byte).is_err() {
                                overflow = true;
                                break;
                            }
                        }
                    }
                    self.consume(consumed);
                    if overflow {
                        error!("receive FIFO overflow");
                        return Err(Error::FifoOverflow);
                    }
                }
            }
        }
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.raw.len());
        self.raw.copy_within(count.., 0);
        self.raw.truncate(self.raw.len() - count);
    }

    fn discard(&mut self) {
        self.raw.clear();
        self.framing_errors = self.framing_errors.saturating_add(1);
    }
}

impl<P, C> LineChannel for Bridge<P, C>
where
    P: Read + Write,
    C: Clock,
{
    type Error = Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.write(data)
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Bridge::read_line(self, buf)
    }
}
