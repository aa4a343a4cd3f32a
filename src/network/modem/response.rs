//! Parsers for the structured lines the modem sends back.
//!
//! Every parser takes one line with its `\r\n` already stripped and returns
//! `None` when the line is not the one it looks for. None of them allocate.

/// Received signal strength as reported by `AT+CSQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    /// RSSI index, 0..=31, or 99 when unknown.
    pub rssi: u8,
    /// Bit error rate index, 0..=7, or 99 when unknown.
    pub ber: u8,
}

impl SignalQuality {
    /// Convert the RSSI index to dBm, `None` when the modem does not know.
    pub fn dbm(&self) -> Option<i16> {
        (self.rssi <= 31).then(|| -113 + 2 * i16::from(self.rssi))
    }
}

fn digits(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// A line that ends an exchange with a failure.
pub fn is_failure(line: &str) -> bool {
    matches!(line, "ERROR" | "CONNECT FAIL" | "SEND FAIL")
}

/// Unsolicited notice that received data is waiting in the modem.
pub fn is_data_pending(line: &str) -> bool {
    line == "+CIPRXGET: 1"
}

/// `+CPIN: READY`
pub fn cpin_ready(line: &str) -> bool {
    line.starts_with("+CPIN: READY")
}

/// `+CGNAPN: <0|1>,"<apn>"`, returns the APN.
pub fn apn(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("+CGNAPN: ")?;
    let (valid, quoted) = rest.split_once(',')?;
    if valid != "0" && valid != "1" {
        return None;
    }
    let name = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let well_formed = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.');
    well_formed.then_some(name)
}

/// `+CGATT: <0|1>`
pub fn attach_state(line: &str) -> Option<bool> {
    match line.strip_prefix("+CGATT: ")? {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

/// `+CSQ: <rssi>,<ber>`
pub fn signal_quality(line: &str) -> Option<SignalQuality> {
    let (rssi, ber) = line.strip_prefix("+CSQ: ")?.split_once(',')?;
    Some(SignalQuality {
        rssi: u8::try_from(digits(rssi)?).ok()?,
        ber: u8::try_from(digits(ber)?).ok()?,
    })
}

/// A bare dotted-quad IPv4 address, as printed by `AT+CIFSR`.
pub fn ipv4(line: &str) -> Option<&str> {
    let mut octets = 0;
    for part in line.split('.') {
        if part.len() > 3 || digits(part)? > 255 {
            return None;
        }
        octets += 1;
    }
    (octets == 4).then_some(line)
}

/// `+CIPRXGET: 4,<len>`, bytes waiting in the modem.
pub fn rx_available(line: &str) -> Option<usize> {
    digits(line.strip_prefix("+CIPRXGET: 4,")?)
}

/// `+CIPRXGET: 3,<read>,<left>`, header of a hex read.
///
/// Returns the number of bytes in the hex line that follows and the number
/// still left in the modem.
pub fn rx_hex_header(line: &str) -> Option<(usize, usize)> {
    let (read, left) = line.strip_prefix("+CIPRXGET: 3,")?.split_once(',')?;
    Some((digits(read)?, digits(left)?))
}

/// `STATE: <state>`, returns the state text.
pub fn tcp_state(line: &str) -> Option<&str> {
    let state = line.strip_prefix("STATE: ")?.trim();
    let well_formed =
        !state.is_empty() && state.bytes().all(|b| b.is_ascii_uppercase() || b == b' ');
    well_formed.then_some(state)
}
