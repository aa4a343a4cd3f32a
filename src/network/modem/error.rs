//! Error types for the AT session

/// Outcome of a failed AT exchange.
///
/// The kinds split into two families. Fatal ones mean the session can no
/// longer be trusted and the modem has to be re-initialised (usually after a
/// power cycle). Transient ones mean the modem answered but not the way we
/// wanted; the same operation may simply be tried again.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The modem never reported a ready SIM within the readiness window.
    ModuleNotReady,
    /// No terminating reply arrived before the timeout.
    NoReply,
    /// The modem answered `ERROR` (or another failure line).
    CommandFailed,
    /// The modem answered, but not with the structured line we asked for.
    UnexpectedResponse,
    /// A command or payload does not fit in the session buffers.
    PayloadTooLarge,
    /// The line channel below the session failed.
    Channel,
}

impl Error {
    /// The session must be re-initialised before it is used again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ModuleNotReady | Error::NoReply | Error::Channel)
    }

    /// Repeating the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CommandFailed | Error::UnexpectedResponse)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ModuleNotReady => defmt::write!(f, "ModuleNotReady"),
            Error::NoReply => defmt::write!(f, "NoReply"),
            Error::CommandFailed => defmt::write!(f, "CommandFailed"),
            Error::UnexpectedResponse => defmt::write!(f, "UnexpectedResponse"),
            Error::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            Error::Channel => defmt::write!(f, "Channel"),
        }
    }
}
