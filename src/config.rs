//! Start-up configuration
//!
//! The gateway reads one JSON document at boot. Every section except
//! `broker.host` and `publish.topic` may be left out:
//!
//! ```json
//! {
//!   "serial":  { "device": "/dev/ttyS0", "baud": 115200, "bridged": true, "bridge_port": 1 },
//!   "modem":   { "apn": "internet" },
//!   "broker":  { "host": "broker.example.com", "port": 1883, "client_id": "gw-01",
//!                "keep_alive_seconds": 300, "clean_session": true },
//!   "publish": { "topic": "sensors/air", "qos": 1 }
//! }
//! ```
//!
//! Parsing is allocation free: strings land in `heapless::String` fields
//! and a value longer than its field is a [`Error::Parse`].

use crate::network::application::mqtt::{Options, QoS};
use heapless::String;
use serde::Deserialize;

/// Errors from loading the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The document is not valid JSON or does not fit the schema.
    Parse,
    /// `publish.qos` is neither 0 nor 1.
    InvalidQoS,
}

/// Serial port the modem (or its bridge) hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Serial {
    /// Device path or port name.
    #[serde(default)]
    pub device: String<64>,
    /// Line rate.
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Modem sits behind the framed serial bridge.
    #[serde(default)]
    pub bridged: bool,
    /// Bridge port the modem is wired to.
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u8,
}

/// Modem settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Modem {
    /// APN override; the modem-reported APN is used when absent.
    #[serde(default)]
    pub apn: Option<String<64>>,
}

/// MQTT broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Broker {
    /// Host name or address
    pub host: String<128>,
    /// TCP port
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Client identifier, generated when absent
    #[serde(default)]
    pub client_id: Option<String<64>>,
    /// User name
    #[serde(default)]
    pub username: Option<String<64>>,
    /// Password
    #[serde(default)]
    pub password: Option<String<64>>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u16,
    /// Clean session flag
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
}

/// Where readings are published.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Publish {
    /// Topic name
    pub topic: String<128>,
    /// Raw QoS level, checked by [`Config::qos`]
    #[serde(default)]
    pub qos: u8,
}

/// The whole configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Serial port settings
    #[serde(default)]
    pub serial: Serial,
    /// Modem settings
    #[serde(default)]
    pub modem: Modem,
    /// Broker settings
    pub broker: Broker,
    /// Publish settings
    pub publish: Publish,
}

fn default_baud() -> u32 {
    115_200
}

fn default_bridge_port() -> u8 {
    1
}

fn default_broker_port() -> u16 {
    1883
}

fn default_keep_alive() -> u16 {
    300
}

fn default_clean_session() -> bool {
    true
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            device: String::new(),
            baud: default_baud(),
            bridged: false,
            bridge_port: default_bridge_port(),
        }
    }
}

impl Config {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let (config, _): (Config, usize) = serde_json_core::from_str(json).map_err(|_| {
            error!("configuration is not valid");
            Error::Parse
        })?;
        config.qos()?;
        debug!(
            "configuration loaded: broker port {}, bridged {}",
            config.broker.port,
            config.serial.bridged
        );
        Ok(config)
    }

    /// MQTT client options borrowing from this configuration.
    pub fn mqtt_options(&self) -> Options<'_> {
        let broker = &self.broker;
        let mut options = Options::new(broker.host.as_str());
        options.port = broker.port;
        options.client_id = broker.client_id.as_deref();
        options.username = broker.username.as_deref();
        options.password = broker.password.as_deref();
        options.keep_alive_seconds = broker.keep_alive_seconds;
        options.clean_session = broker.clean_session;
        options
    }

    /// The configured publish QoS.
    pub fn qos(&self) -> Result<QoS, Error> {
        QoS::try_from(self.publish.qos).map_err(|_| Error::InvalidQoS)
    }

    /// The APN override, if one is configured.
    pub fn apn(&self) -> Option<&str> {
        self.modem.apn.as_deref()
    }
}
