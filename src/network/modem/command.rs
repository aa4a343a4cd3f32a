//! AT command texts, each terminated with `\r\n`.

use super::error::Error;
use core::fmt::Write as _;
use heapless::String;

/// Longest command line the builders produce.
pub const COMMAND_CAPACITY: usize = 128;

/// A formatted command line.
pub type Command = String<COMMAND_CAPACITY>;

/// Probe that something answers on the line.
pub const TEST: &str = "AT\r\n";
/// Stop echoing commands back.
pub const ECHO_OFF: &str = "ATE0\r\n";
/// Echo commands back.
pub const ECHO_ON: &str = "ATE1\r\n";
/// SIM readiness query.
pub const CHECK_READY: &str = "AT+CPIN?\r\n";
/// Attach to the packet domain.
pub const ATTACH: &str = "AT+CGATT=1\r\n";
/// Bring up the wireless bearer.
pub const BRING_UP: &str = "AT+CIICR\r\n";
/// Local IP address query.
pub const LOCAL_IP: &str = "AT+CIFSR\r\n";
/// Network-provided APN query.
pub const GET_APN: &str = "AT+CGNAPN\r\n";
/// Packet-domain attach status query.
pub const ATTACH_STATUS: &str = "AT+CGATT?\r\n";
/// Deactivate the PDP context.
pub const SHUT: &str = "AT+CIPSHUT\r\n";
/// Connection status query.
pub const TCP_STATUS: &str = "AT+CIPSTATUS\r\n";
/// Signal quality query.
pub const SIGNAL_QUALITY: &str = "AT+CSQ\r\n";
/// Leave received data in the modem until it is explicitly fetched.
pub const RX_MANUAL: &str = "AT+CIPRXGET=1\r\n";
/// Number of received bytes waiting in the modem.
pub const RX_AVAILABLE: &str = "AT+CIPRXGET=4\r\n";
/// Payloads after `AT+CIPSEND` are written as hex text.
pub const TX_HEX: &str = "AT+CIPSENDHEX=1\r\n";
/// Power up the GNSS engine.
pub const GNSS_POWER_ON: &str = "AT+CGNSPWR=1\r\n";
/// GNSS navigation record query.
pub const GNSS_INFO: &str = "AT+CGNSINF\r\n";

fn format(args: core::fmt::Arguments<'_>) -> Result<Command, Error> {
    let mut command = Command::new();
    command
        .write_fmt(args)
        .map_err(|_| Error::PayloadTooLarge)?;
    Ok(command)
}

/// `AT+CSTT="<apn>"`
pub fn set_apn(apn: &str) -> Result<Command, Error> {
    format(format_args!("AT+CSTT=\"{}\"\r\n", apn))
}

/// `AT+CIPSTART="TCP","<host>",<port>`
pub fn tcp_connect(host: &str, port: u16) -> Result<Command, Error> {
    format(format_args!("AT+CIPSTART=\"TCP\",\"{}\",{}\r\n", host, port))
}

/// `AT+CIPSEND=<len>`, `len` counted in payload bytes.
pub fn send(len: usize) -> Result<Command, Error> {
    format(format_args!("AT+CIPSEND={}\r\n", len))
}

/// `AT+CIPRXGET=3,<len>`: fetch `len` bytes as hex text.
pub fn read_hex(len: usize) -> Result<Command, Error> {
    format(format_args!("AT+CIPRXGET=3,{}\r\n", len))
}
