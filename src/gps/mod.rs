//! GNSS position from the modem's built-in receiver
//!
//! SIM7000-class modems carry a GNSS engine that is switched on with
//! `AT+CGNSPWR=1` and read with `AT+CGNSINF`. The answer is a single
//! comma-separated record:
//!
//! ```text
//! +CGNSINF: <run>,<fix>,<utc>,<lat>,<lon>,<alt>,<speed>,<course>,...
//! +CGNSINF: 1,1,20211126093015.000,25.033964,121.564468,12.100,0.00,285.3,1,,1.2,1.5,0.9,,11,6,,,42,,
//! ```
//!
//! Until the receiver has a fix most fields are empty, so every measured
//! quantity is an `Option`.

use crate::network::LineChannel;
use crate::network::modem::{Error, Reply, Session, command, session::DEFAULT_REPLY_TIMEOUT_MS};
use crate::time::Clock;

/// Fields the parser looks at, counted from the run status.
pub const CGNSINF_MIN_FIELDS: usize = 8;

/// Errors of the `+CGNSINF` record parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GnssError {
    /// The line is not a `+CGNSINF:` record.
    InvalidPrefix,
    /// Fewer fields than a record carries.
    MissingFields,
    /// A field does not hold what its position requires.
    ParseError,
}

/// UTC timestamp as reported by the receiver (`yyyyMMddhhmmss.sss`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UtcTime {
    /// Four digit year
    pub year: u16,
    /// Month (1-12)
    pub month: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-60)
    pub second: u8,
    /// Milliseconds
    pub millis: u16,
}

/// One navigation record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GnssInfo {
    /// The GNSS engine is powered.
    pub running: bool,
    /// The receiver has a position fix.
    pub fixed: bool,
    /// Time of the fix.
    pub utc: Option<UtcTime>,
    /// Latitude in decimal degrees, north positive.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, east positive.
    pub longitude: Option<f64>,
    /// Altitude above mean sea level in metres.
    pub altitude: Option<f64>,
    /// Speed over ground in km/h.
    pub speed_kmh: Option<f64>,
    /// Course over ground in degrees.
    pub course: Option<f64>,
}

impl GnssInfo {
    /// Latitude and longitude together, when both are known.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

fn flag(value: &str) -> Result<bool, GnssError> {
    match value {
        "0" | "" => Ok(false),
        "1" => Ok(true),
        _ => Err(GnssError::ParseError),
    }
}

fn decimal(value: &str) -> Result<Option<f64>, GnssError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| GnssError::ParseError)
}

fn number<T: core::str::FromStr>(digits: &str) -> Result<T, GnssError> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GnssError::ParseError);
    }
    digits.parse().map_err(|_| GnssError::ParseError)
}

/// Parse a `yyyyMMddhhmmss.sss` timestamp; an empty field is `None`.
pub fn parse_utc(value: &str) -> Result<Option<UtcTime>, GnssError> {
    if value.is_empty() {
        return Ok(None);
    }
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let digits = |text: &str| text.bytes().all(|b| b.is_ascii_digit());
    if whole.len() != 14 || fraction.len() > 3 || !digits(whole) || !digits(fraction) {
        return Err(GnssError::ParseError);
    }

    let millis = match fraction.len() {
        0 => 0,
        n => number::<u16>(fraction)? * 10u16.pow(3 - n as u32),
    };
    let time = UtcTime {
        year: number(&whole[0..4])?,
        month: number(&whole[4..6])?,
        day: number(&whole[6..8])?,
        hour: number(&whole[8..10])?,
        minute: number(&whole[10..12])?,
        second: number(&whole[12..14])?,
        millis,
    };

    let valid = (1..=12).contains(&time.month)
        && (1..=31).contains(&time.day)
        && time.hour <= 23
        && time.minute <= 59
        && time.second <= 60;
    if valid {
        Ok(Some(time))
    } else {
        Err(GnssError::ParseError)
    }
}

/// Parse a `+CGNSINF:` line.
pub fn parse(line: &str) -> Result<GnssInfo, GnssError> {
    let record = line
        .trim()
        .strip_prefix("+CGNSINF:")
        .ok_or(GnssError::InvalidPrefix)?
        .trim_start();

    let mut fields = [""; CGNSINF_MIN_FIELDS];
    let mut found = 0;
    for (slot, field) in fields.iter_mut().zip(record.split(',')) {
        *slot = field.trim();
        found += 1;
    }
    if found < CGNSINF_MIN_FIELDS {
        return Err(GnssError::MissingFields);
    }

    Ok(GnssInfo {
        running: flag(fields[0])?,
        fixed: flag(fields[1])?,
        utc: parse_utc(fields[2])?,
        latitude: decimal(fields[3])?,
        longitude: decimal(fields[4])?,
        altitude: decimal(fields[5])?,
        speed_kmh: decimal(fields[6])?,
        course: decimal(fields[7])?,
    })
}

/// Switch the GNSS engine on (`AT+CGNSPWR=1`).
pub fn power_on<L, C>(session: &mut Session<L, C>) -> Result<(), Error>
where
    L: LineChannel,
    C: Clock,
{
    session.execute(command::GNSS_POWER_ON)
}

/// Read the current navigation record (`AT+CGNSINF`).
///
/// `Ok(None)` when the modem answered without a record. A record that
/// cannot be parsed is [`Error::UnexpectedResponse`].
pub fn query<L, C>(session: &mut Session<L, C>) -> Result<Option<GnssInfo>, Error>
where
    L: LineChannel,
    C: Clock,
{
    let mut record = None;
    session.command(
        command::GNSS_INFO,
        Reply::OK,
        DEFAULT_REPLY_TIMEOUT_MS,
        |line| {
            if line.starts_with("+CGNSINF:") {
                record = Some(parse(line));
            }
        },
    )?;
    match record {
        None => Ok(None),
        Some(Ok(info)) => Ok(Some(info)),
        Some(Err(e)) => {
            warn!("unreadable GNSS record: {:?}", e);
            Err(Error::UnexpectedResponse)
        }
    }
}
