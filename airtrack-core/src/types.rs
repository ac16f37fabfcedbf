//! Shared types: typed tracking events and the per-stage rejection taxonomy.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by airtrack-core.
#[derive(Debug, Error)]
pub enum AirtrackError {
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AirtrackError>;

// ---------------------------------------------------------------------------
// Rejection taxonomy
// ---------------------------------------------------------------------------

/// Why a datagram was dropped without producing any event.
///
/// Each decode stage reports its own rejection kind, so every drop reason
/// is observable on its own. All of these are routine, datagram-scoped
/// conditions — none of them stops the receive loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reject {
    /// Datagram does not end with the `$` terminator.
    #[error("missing end character")]
    MissingTerminator,
    /// Datagram does not start with a recognised report-class prefix.
    #[error("unrecognised message prefix")]
    UnknownPrefix,
    /// Fewer fields than any relayable message carries.
    #[error("message too short: {fields} fields")]
    TooShort { fields: usize },
    /// Header field has no `:` separating report class from subtype.
    #[error("no report class separator in header")]
    MalformedHeader,
    /// Hardware identifier is not in the device registry. Expected for
    /// foreign trackers sharing the port.
    #[error("ignoring unknown tracker with imei {imei}")]
    UnknownDevice { imei: String },
    /// Recognised report class but no handler matches the subtype and
    /// field count.
    #[error("message {class}:{subtype} with {fields} fields not relayed")]
    NotRelayed {
        class: String,
        subtype: String,
        fields: usize,
    },
    /// Report class is none of the relayable ones.
    #[error("invalid message type: {class}")]
    UnknownReportClass { class: String },
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Acknowledgement of a command previously sent to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckEvent {
    /// Logical device name.
    pub drd: String,
    /// Acknowledged command type (message subtype).
    pub ctype: String,
    /// Command identifier, normalised to upper-case.
    pub cid: String,
    /// Device-clock send timestamp, verbatim.
    pub sendtime: String,
    /// Original request type.
    pub req: String,
}

/// Device status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub drd: String,
    /// Device operating state.
    pub devstate: String,
    /// Cellular signal strength.
    pub rssi: String,
    /// Input voltage.
    pub voltage: String,
    /// Battery percentage.
    pub battery: String,
    /// Charging flag, verbatim from the device.
    pub charging: String,
    /// True when the device stored the report and sent it late.
    pub buffered: bool,
    pub sendtime: String,
}

/// A single GPS fix from a location report.
///
/// Geo and numeric values are carried as opaque text — downstream
/// consumers interpret units and scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionEvent {
    /// False when the dilution-of-precision field reads `0` (no
    /// satellite fix).
    pub fix: bool,
    pub lat: String,
    pub lon: String,
    pub elev: String,
    pub speed: String,
    pub hdop: String,
    pub drd: String,
    /// GPS fix timestamp, device clock.
    pub fixtime: String,
    pub buffered: bool,
    pub battery: String,
    pub sendtime: String,
}

/// Union of all relayed events.
///
/// Serializes with a `type` tag so consumers can switch on
/// `drdack` / `drdstat` / `drdpos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "drdack")]
    Ack(AckEvent),
    #[serde(rename = "drdstat")]
    Status(StatusEvent),
    #[serde(rename = "drdpos")]
    Position(PositionEvent),
}

impl Event {
    /// Logical device name carried by any event kind.
    pub fn drd(&self) -> &str {
        match self {
            Event::Ack(e) => &e.drd,
            Event::Status(e) => &e.drd,
            Event::Position(e) => &e.drd,
        }
    }

    /// Device-clock send timestamp carried by any event kind.
    pub fn sendtime(&self) -> &str {
        match self {
            Event::Ack(e) => &e.sendtime,
            Event::Status(e) => &e.sendtime,
            Event::Position(e) => &e.sendtime,
        }
    }

    /// The wire-level `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ack(_) => "drdack",
            Event::Status(_) => "drdstat",
            Event::Position(_) => "drdpos",
        }
    }
}

// ---------------------------------------------------------------------------
// Decode summary
// ---------------------------------------------------------------------------

/// Outcome of decoding one accepted datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    /// Events in extraction order.
    pub events: Vec<Event>,
    /// A location batch declared more records than the datagram carried;
    /// the unparseable tail was dropped, earlier records are kept.
    pub truncated: bool,
}

impl Relayed {
    /// A complete decode that produced exactly one event.
    pub fn single(event: Event) -> Self {
        Relayed {
            events: vec![event],
            truncated: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
