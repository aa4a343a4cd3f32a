//! Last-known connectivity snapshot shared with collaborators
//!
//! The thread that owns the serial port is the only writer: after each
//! connectivity or signal update it calls [`SharedStatus::publish`]. Display
//! and logging tasks call [`SharedStatus::load`] and never touch the port.
//!
//! ```rust
//! use libcellular::status::{Connectivity, SharedStatus, Snapshot};
//!
//! static STATUS: SharedStatus = SharedStatus::new();
//!
//! STATUS.publish(Snapshot { connectivity: Connectivity::Cellular, rssi: Some(18) });
//! assert_eq!(STATUS.load().connectivity, Connectivity::Cellular);
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Marker stored for an unknown signal level.
const RSSI_UNKNOWN: u8 = u8::MAX;

/// Which uplink is currently carrying traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Connectivity {
    /// No uplink
    #[default]
    None = 0,
    /// Wi-Fi uplink
    Wifi = 1,
    /// Cellular uplink through the modem
    Cellular = 2,
}

impl From<u8> for Connectivity {
    fn from(value: u8) -> Self {
        match value {
            1 => Connectivity::Wifi,
            2 => Connectivity::Cellular,
            _ => Connectivity::None,
        }
    }
}

/// A consistent copy of the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    /// Current uplink
    pub connectivity: Connectivity,
    /// Raw `+CSQ` RSSI index (0-31), `None` when unknown
    pub rssi: Option<u8>,
}

/// Single-writer, many-reader holder of the latest [`Snapshot`].
///
/// Both fields are packed into one atomic so readers never observe a
/// connectivity value paired with a stale signal level.
#[derive(Debug)]
pub struct SharedStatus {
    packed: core::sync::atomic::AtomicU16,
    updates: AtomicU8,
}

impl SharedStatus {
    /// An empty snapshot: no uplink, unknown signal.
    pub const fn new() -> Self {
        Self {
            packed: core::sync::atomic::AtomicU16::new(RSSI_UNKNOWN as u16),
            updates: AtomicU8::new(0),
        }
    }

    /// Replace the snapshot. Only the port-owning thread calls this.
    pub fn publish(&self, snapshot: Snapshot) {
        let rssi = snapshot.rssi.unwrap_or(RSSI_UNKNOWN);
        let packed = (u16::from(snapshot.connectivity as u8) << 8) | u16::from(rssi);
        self.packed.store(packed, Ordering::Release);
        self.updates.fetch_add(1, Ordering::Release);
        trace!("status published: connectivity {} rssi {}", snapshot.connectivity as u8, rssi);
    }

    /// Read the latest snapshot.
    pub fn load(&self) -> Snapshot {
        let packed = self.packed.load(Ordering::Acquire);
        let rssi = (packed & 0xFF) as u8;
        Snapshot {
            connectivity: Connectivity::from((packed >> 8) as u8),
            rssi: (rssi != RSSI_UNKNOWN).then_some(rssi),
        }
    }

    /// Wrapping count of [`publish`](Self::publish) calls, for readers that
    /// only redraw on change.
    pub fn generation(&self) -> u8 {
        self.updates.load(Ordering::Acquire)
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}
