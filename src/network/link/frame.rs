//! Frame codec for the serial bridge.
//!
//! Every frame opens with the self-checking pair `AA 55` (`55` being the
//! one's complement of `AA`) followed by a command byte. Frames that carry a
//! payload close with a checksum pair `chk, !chk`, where
//! `chk = Σ byte[i] ^ (i + 1)  (mod 256)` over every byte before it.
//!
//! ```text
//! begin      AA 55 CC 33 00 04 00                                   chk !chk
//! rx-config  AA 55 CF 30 port en poll byte_to rcv_to_lo rcv_to_hi   chk !chk
//! transmit   AA 55 CD 32 port len_lo len_hi 00 00 00 00 00 00 data  chk !chk
//! receive    AA 55 D0 port len_lo len_hi data                       chk !chk
//! ack        AA 55 cmd !cmd status !status
//! ```
//!
//! All multi-byte integers are little-endian.

use super::error::Error;
use core::ops::Range;
use heapless::Vec;

/// Leading sentinel of every frame.
pub const LEAD: u8 = 0xAA;
/// Bridge initialisation command.
pub const CMD_BEGIN: u8 = 0xCC;
/// Transmit-payload command.
pub const CMD_TRANSMIT: u8 = 0xCD;
/// Enable-active-receive configuration command.
pub const CMD_ACTIVE_RECEIVE: u8 = 0xCF;
/// Received-data frame sent by the bridge.
pub const CMD_RECEIVE: u8 = 0xD0;
/// Ack status meaning the command was accepted.
pub const ACK_OK: u8 = 0x00;

/// Largest payload a transmit or receive frame may declare.
pub const MAX_PAYLOAD: usize = 2048;

const TRANSMIT_HEADER_LEN: usize = 13;
const RECEIVE_HEADER_LEN: usize = 6;
const CHECKSUM_LEN: usize = 2;
const ACK_LEN: usize = 6;
const BEGIN_LEN: usize = 9;
const ACTIVE_RECEIVE_LEN: usize = 12;

/// Largest frame this codec produces or accepts.
pub const MAX_FRAME_LEN: usize = TRANSMIT_HEADER_LEN + MAX_PAYLOAD + CHECKSUM_LEN;

/// Buffer holding one encoded frame.
pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

/// Settings carried by the enable-active-receive frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveReceive {
    /// Whether the bridge should push received modem bytes on its own.
    pub enabled: bool,
    /// How often the bridge polls the modem UART, in milliseconds.
    pub poll_interval_ms: u8,
    /// Inter-byte gap that ends a receive burst, in milliseconds.
    pub byte_timeout_ms: u8,
    /// Upper bound on one receive burst, in milliseconds.
    pub receive_timeout_ms: u16,
}

impl Default for ActiveReceive {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 10,
            byte_timeout_ms: 5,
            receive_timeout_ms: 100,
        }
    }
}

/// Result of looking at the head of a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The buffer holds the start of a plausible frame; wait for more bytes.
    Incomplete,
    /// The head of the buffer can never become a valid frame.
    Invalid,
    /// An acknowledgement for `command`.
    Ack {
        /// Command being acknowledged.
        command: u8,
        /// Status byte, [`ACK_OK`] on success.
        status: u8,
        /// Bytes occupied by the frame.
        consumed: usize,
    },
    /// A data frame from the bridge.
    Data {
        /// Bridge port the data arrived on.
        port: u8,
        /// Location of the payload inside the buffer.
        payload: Range<usize>,
        /// Bytes occupied by the frame.
        consumed: usize,
    },
}

/// One's complement of a byte.
#[inline]
pub const fn complement(byte: u8) -> u8 {
    !byte
}

/// Frame checksum: `Σ byte[i] ^ ((i + 1) mod 256)` truncated to a byte.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .enumerate()
        .fold(0u8, |acc, (i, &b)| acc.wrapping_add(b ^ ((i + 1) as u8)))
}

fn seal(frame: &mut [u8]) {
    let body = frame.len() - CHECKSUM_LEN;
    let chk = checksum(&frame[..body]);
    frame[body] = chk;
    frame[body + 1] = complement(chk);
}

fn checksum_matches(frame: &[u8]) -> bool {
    if frame.len() < CHECKSUM_LEN {
        return false;
    }
    let body = frame.len() - CHECKSUM_LEN;
    let chk = checksum(&frame[..body]);
    frame[body] == chk && frame[body + 1] == complement(chk)
}

/// The fixed bridge initialisation frame.
pub fn begin() -> [u8; BEGIN_LEN] {
    let mut frame = [
        LEAD,
        complement(LEAD),
        CMD_BEGIN,
        complement(CMD_BEGIN),
        0x00,
        0x04,
        0x00,
        0,
        0,
    ];
    seal(&mut frame);
    frame
}

/// The enable-active-receive configuration frame for `port`.
pub fn active_receive(port: u8, config: &ActiveReceive) -> [u8; ACTIVE_RECEIVE_LEN] {
    let [timeout_lo, timeout_hi] = config.receive_timeout_ms.to_le_bytes();
    let mut frame = [
        LEAD,
        complement(LEAD),
        CMD_ACTIVE_RECEIVE,
        complement(CMD_ACTIVE_RECEIVE),
        port,
        u8::from(config.enabled),
        config.poll_interval_ms,
        config.byte_timeout_ms,
        timeout_lo,
        timeout_hi,
        0,
        0,
    ];
    seal(&mut frame);
    frame
}

/// Wrap `payload` in a transmit frame for `port`.
///
/// The payload must hold between 1 and [`MAX_PAYLOAD`] bytes.
pub fn transmit(port: u8, payload: &[u8]) -> Result<FrameBuf, Error> {
    if payload.is_empty() || payload.len() > MAX_PAYLOAD {
        return Err(Error::Framing);
    }
    let mut frame = FrameBuf::new();
    frame
        .extend_from_slice(&[LEAD, complement(LEAD), CMD_TRANSMIT, complement(CMD_TRANSMIT), port])
        .map_err(|_| Error::Framing)?;
    frame
        .extend_from_slice(&(payload.len() as u16).to_le_bytes())
        .map_err(|_| Error::Framing)?;
    // reserved16 + reserved32
    frame
        .extend_from_slice(&[0; 6])
        .map_err(|_| Error::Framing)?;
    frame.extend_from_slice(payload).map_err(|_| Error::Framing)?;
    frame
        .extend_from_slice(&[0; CHECKSUM_LEN])
        .map_err(|_| Error::Framing)?;
    seal(&mut frame);
    Ok(frame)
}

/// Build the data frame the bridge emits for bytes received on `port`.
pub fn receive(port: u8, payload: &[u8]) -> Result<FrameBuf, Error> {
    if payload.is_empty() || payload.len() > MAX_PAYLOAD {
        return Err(Error::Framing);
    }
    let mut frame = FrameBuf::new();
    frame
        .extend_from_slice(&[LEAD, complement(LEAD), CMD_RECEIVE, port])
        .map_err(|_| Error::Framing)?;
    frame
        .extend_from_slice(&(payload.len() as u16).to_le_bytes())
        .map_err(|_| Error::Framing)?;
    frame.extend_from_slice(payload).map_err(|_| Error::Framing)?;
    frame
        .extend_from_slice(&[0; CHECKSUM_LEN])
        .map_err(|_| Error::Framing)?;
    seal(&mut frame);
    Ok(frame)
}

/// The acknowledgement the bridge sends for `command`.
pub fn ack(command: u8, status: u8) -> [u8; ACK_LEN] {
    [
        LEAD,
        complement(LEAD),
        command,
        complement(command),
        status,
        complement(status),
    ]
}

fn declared_len(lo: u8, hi: u8) -> Option<usize> {
    let len = u16::from_le_bytes([lo, hi]) as usize;
    (1..=MAX_PAYLOAD).contains(&len).then_some(len)
}

/// Check that `frame` is exactly one complete, well-formed frame.
pub fn validate(frame: &[u8]) -> bool {
    if frame.len() < 4 || frame[0] != LEAD || frame[1] != complement(LEAD) {
        return false;
    }
    let command = frame[2];
    if command != CMD_RECEIVE && frame[3] != complement(command) {
        return false;
    }
    let expected = match command {
        CMD_BEGIN => BEGIN_LEN,
        CMD_ACTIVE_RECEIVE => ACTIVE_RECEIVE_LEN,
        CMD_TRANSMIT if frame.len() >= 7 => match declared_len(frame[5], frame[6]) {
            Some(len) => TRANSMIT_HEADER_LEN + len + CHECKSUM_LEN,
            None => return false,
        },
        CMD_RECEIVE if frame.len() >= RECEIVE_HEADER_LEN => {
            match declared_len(frame[4], frame[5]) {
                Some(len) => RECEIVE_HEADER_LEN + len + CHECKSUM_LEN,
                None => return false,
            }
        }
        _ => return false,
    };
    frame.len() == expected && checksum_matches(frame)
}

/// Inspect the head of `buf` for an inbound frame (data or ack).
pub fn decode(buf: &[u8]) -> Decoded {
    match buf {
        [] => return Decoded::Incomplete,
        [lead, ..] if *lead != LEAD => return Decoded::Invalid,
        [_] => return Decoded::Incomplete,
        [_, inv, ..] if *inv != complement(LEAD) => return Decoded::Invalid,
        [_, _] => return Decoded::Incomplete,
        _ => {}
    }

    match buf[2] {
        CMD_RECEIVE => {
            if buf.len() < RECEIVE_HEADER_LEN {
                return Decoded::Incomplete;
            }
            let Some(len) = declared_len(buf[4], buf[5]) else {
                return Decoded::Invalid;
            };
            let total = RECEIVE_HEADER_LEN + len + CHECKSUM_LEN;
            if buf.len() < total {
                return Decoded::Incomplete;
            }
            if !checksum_matches(&buf[..total]) {
                return Decoded::Invalid;
            }
            Decoded::Data {
                port: buf[3],
                payload: RECEIVE_HEADER_LEN..RECEIVE_HEADER_LEN + len,
                consumed: total,
            }
        }
        command @ (CMD_BEGIN | CMD_TRANSMIT | CMD_ACTIVE_RECEIVE) => {
            if buf.len() >= 4 && buf[3] != complement(command) {
                return Decoded::Invalid;
            }
            if buf.len() < ACK_LEN {
                return Decoded::Incomplete;
            }
            if buf[5] != complement(buf[4]) {
                return Decoded::Invalid;
            }
            Decoded::Ack {
                command,
                status: buf[4],
                consumed: ACK_LEN,
            }
        }
        _ => Decoded::Invalid,
    }
}
