//! Test doubles shared by the integration tests.
//!
//! Every double is a cheap handle over shared state, so a test can keep a
//! clone to inspect traffic after the original was moved into the stack.

#![allow(dead_code)]

use embedded_hal::delay::DelayNs;
use libcellular::network::{LineChannel, Read, Socket, Write};
use libcellular::time::Clock;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Virtual clock: delays advance time instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    elapsed_ns: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ms * 1_000_000);
    }
}

impl DelayNs for MockClock {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }
}

#[derive(Debug, Default)]
struct PortState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    writes: Vec<Vec<u8>>,
    auto_ack: bool,
    ack_status: u8,
    dropped_acks: usize,
    broken: bool,
}

/// Serial port double for the bridge.
///
/// With auto-ack on, every begin/config/transmit frame written is answered
/// with an ack frame, optionally after swallowing the first few.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPort {
    state: Rc<RefCell<PortState>>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acking() -> Self {
        let port = Self::new();
        port.state.borrow_mut().auto_ack = true;
        port
    }

    pub fn set_ack_status(&self, status: u8) {
        self.state.borrow_mut().ack_status = status;
    }

    pub fn drop_acks(&self, count: usize) {
        self.state.borrow_mut().dropped_acks = count;
    }

    pub fn break_port(&self) {
        self.state.borrow_mut().broken = true;
    }

    pub fn inject(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// Every write call, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.borrow().writes.clone()
    }
}

impl Read for ScriptedPort {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut state = self.state.borrow_mut();
        if state.broken {
            return Err(());
        }
        let mut count = 0;
        while count < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl Write for ScriptedPort {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, ()> {
        let mut state = self.state.borrow_mut();
        if state.broken {
            return Err(());
        }
        state.tx.extend_from_slice(buf);
        state.writes.push(buf.to_vec());
        let is_command = buf.len() >= 4
            && buf[0] == 0xAA
            && buf[1] == 0x55
            && matches!(buf[2], 0xCC | 0xCD | 0xCF);
        if state.auto_ack && is_command {
            if state.dropped_acks > 0 {
                state.dropped_acks -= 1;
            } else {
                let status = state.ack_status;
                let ack = [0xAA, 0x55, buf[2], !buf[2], status, !status];
                state.rx.extend(ack);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ModemState {
    script: VecDeque<(String, Vec<String>)>,
    rx: VecDeque<u8>,
    sent: Vec<String>,
    unexpected: Vec<String>,
    read_limit: Option<usize>,
    broken: bool,
}

/// AT modem double.
///
/// Each expectation pairs what the host must send with the text the modem
/// answers. A send that matches the next expectation queues its answer;
/// anything else is recorded and left unanswered.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModem {
    state: Rc<RefCell<ModemState>>,
}

impl ScriptedModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `command` (without `\r\n` for AT commands) and answer with
    /// `reply`, which is queued verbatim.
    pub fn expect(&self, command: &str, reply: &str) -> &Self {
        self.state
            .borrow_mut()
            .script
            .push_back((command.to_string(), vec![reply.to_string()]));
        self
    }

    /// Queue text the modem sends without being asked.
    pub fn unsolicited(&self, text: &str) {
        self.state.borrow_mut().rx.extend(text.bytes());
    }

    /// Hand out at most `bytes` per read, so lines arrive in pieces.
    pub fn limit_reads(&self, bytes: usize) {
        self.state.borrow_mut().read_limit = Some(bytes);
    }

    pub fn break_channel(&self) {
        self.state.borrow_mut().broken = true;
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.borrow().sent.clone()
    }

    pub fn unexpected(&self) -> Vec<String> {
        self.state.borrow().unexpected.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.borrow().script.len()
    }
}

impl LineChannel for ScriptedModem {
    type Error = ();

    fn send(&mut self, data: &[u8]) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        if state.broken {
            return Err(());
        }
        let text = String::from_utf8_lossy(data).trim_end().to_string();
        state.sent.push(text.clone());
        let matches = state
            .script
            .front()
            .is_some_and(|(command, _)| *command == text);
        if matches {
            if let Some((_, replies)) = state.script.pop_front() {
                for reply in replies {
                    state.rx.extend(reply.bytes());
                }
            }
        } else {
            state.unexpected.push(text);
        }
        Ok(())
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut state = self.state.borrow_mut();
        if state.broken {
            return Err(());
        }
        let limit = state.read_limit.unwrap_or(usize::MAX).min(buf.len());
        let mut count = 0;
        while count < limit {
            let Some(byte) = state.rx.pop_front() else {
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
}

#[derive(Debug, Default)]
struct SocketState {
    connected: bool,
    rx: VecDeque<u8>,
    tx: Vec<Vec<u8>>,
    connects: Vec<(String, u16)>,
    disconnects: usize,
    replies: VecDeque<Vec<u8>>,
    fail_send: bool,
}

/// Byte socket double for the MQTT client.
///
/// Bytes can be preloaded, or queued as one reply per send with
/// [`reply_on_send`](MockSocket::reply_on_send).
#[derive(Debug, Clone, Default)]
pub struct MockSocket {
    state: Rc<RefCell<SocketState>>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let socket = Self::new();
        socket.state.borrow_mut().connected = true;
        socket
    }

    pub fn preload(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn reply_on_send(&self, bytes: &[u8]) {
        self.state.borrow_mut().replies.push_back(bytes.to_vec());
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    pub fn fail_sends(&self) {
        self.state.borrow_mut().fail_send = true;
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.borrow().tx.clone()
    }

    pub fn connects(&self) -> Vec<(String, u16)> {
        self.state.borrow().connects.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.borrow().disconnects
    }

    pub fn unread(&self) -> usize {
        self.state.borrow().rx.len()
    }
}

impl Socket for MockSocket {
    type Error = ();

    fn connect(&mut self, host: &str, port: u16) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        state.connects.push((host.to_string(), port));
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        state.disconnects += 1;
        state.connected = false;
        Ok(())
    }

    fn connected(&mut self) -> Result<bool, ()> {
        Ok(self.state.borrow().connected)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        if state.fail_send {
            return Err(());
        }
        state.tx.push(data.to_vec());
        if let Some(reply) = state.replies.pop_front() {
            state.rx.extend(reply);
        }
        Ok(())
    }

    fn available(&mut self) -> Result<usize, ()> {
        Ok(self.state.borrow().rx.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut state = self.state.borrow_mut();
        let mut count = 0;
        while count < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}
