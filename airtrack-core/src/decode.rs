//! Classify tokenized air-interface messages and extract typed events.
//!
//! Message routing:
//! - `+ACK:*`                          -> acknowledgement event
//! - `+RESP`/`+BUFF` `GTINF`           -> status event
//! - `+RESP`/`+BUFF` `GTFRI`/`GTRTL`/`GTSOS` -> one position event per
//!   bundled location record
//!
//! `+BUFF` is structurally identical to `+RESP` but marks a report the
//! device stored and sent late; the flag is carried through on the event
//! as `buffered`.

use crate::frame::{self, TokenizedMessage};
use crate::registry::DeviceRegistry;
use crate::types::{AckEvent, Event, PositionEvent, Reject, Relayed, StatusEvent};

/// Fields per location record in a GTFRI-family batch.
pub const RECORD_STRIDE: usize = 12;

/// Offset of the first location record.
pub const FIRST_RECORD: usize = 7;

/// Decode one raw datagram end to end: framing, tokenize, dispatch.
pub fn relay_datagram(buf: &[u8], registry: &DeviceRegistry) -> Result<Relayed, Reject> {
    frame::validate_framing(buf)?;
    let msg = TokenizedMessage::from_datagram(buf);
    dispatch(&msg, registry)
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Classify a tokenized message and run the matching handler.
///
/// Pure and deterministic: each message is classified exactly once from
/// its own content. Messages from devices not in the registry are never
/// relayed.
pub fn dispatch(msg: &TokenizedMessage, registry: &DeviceRegistry) -> Result<Relayed, Reject> {
    if msg.len() < 4 {
        return Err(Reject::TooShort { fields: msg.len() });
    }
    let (class, subtype) = msg.header().ok_or(Reject::MalformedHeader)?;
    let imei = msg.imei().ok_or(Reject::TooShort { fields: msg.len() })?;
    let drd = match registry.lookup(imei) {
        Some(name) => name,
        None => {
            return Err(Reject::UnknownDevice {
                imei: imei.to_string(),
            })
        }
    };

    if class == "+ACK" && msg.len() > 6 {
        decode_ack(drd, subtype, msg)
            .map(|event| Relayed::single(Event::Ack(event)))
            .ok_or(Reject::TooShort { fields: msg.len() })
    } else if class == "+RESP" || class == "+BUFF" {
        let buffered = class == "+BUFF";
        match subtype {
            "GTFRI" | "GTRTL" | "GTSOS" if msg.len() > 20 => {
                let (events, truncated) = decode_location_batch(drd, msg, buffered);
                Ok(Relayed { events, truncated })
            }
            "GTINF" if msg.len() > 24 => decode_status(drd, msg, buffered)
                .map(|event| Relayed::single(Event::Status(event)))
                .ok_or(Reject::TooShort { fields: msg.len() }),
            _ => Err(Reject::NotRelayed {
                class: class.to_string(),
                subtype: subtype.to_string(),
                fields: msg.len(),
            }),
        }
    } else {
        Err(Reject::UnknownReportClass {
            class: class.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Extract an acknowledgement event.
///
/// The protocol appends a fixed-size suffix (request type, command id,
/// send time, serial count) after a variable-length payload, so these
/// fields are counted from the end of the message.
fn decode_ack(drd: &str, subtype: &str, msg: &TokenizedMessage) -> Option<AckEvent> {
    let sendtime = msg.from_end(2)?;
    let cid = msg.from_end(3)?.to_uppercase();
    let req = msg.from_end(4)?;
    Some(AckEvent {
        drd: drd.to_string(),
        ctype: subtype.to_string(),
        cid,
        sendtime: sendtime.to_string(),
        req: req.to_string(),
    })
}

/// Extract a status event from a GTINF report, fixed absolute positions.
fn decode_status(drd: &str, msg: &TokenizedMessage, buffered: bool) -> Option<StatusEvent> {
    Some(StatusEvent {
        drd: drd.to_string(),
        devstate: msg.field(4)?.to_string(),
        rssi: msg.field(6)?.to_string(),
        voltage: msg.field(11)?.to_string(),
        charging: msg.field(12)?.to_string(),
        battery: msg.field(18)?.to_string(),
        buffered,
        sendtime: msg.from_end(2)?.to_string(),
    })
}

/// Extract every location record bundled in a GTFRI/GTRTL/GTSOS report.
///
/// A single datagram can carry several fixes. Returns the events in
/// record order plus a flag set when the declared count exceeded the
/// fields actually present — the unparseable tail is dropped, records
/// already extracted are kept.
fn decode_location_batch(
    drd: &str,
    msg: &TokenizedMessage,
    buffered: bool,
) -> (Vec<Event>, bool) {
    let declared = record_count(msg);
    let mut events = Vec::new();
    for record in 0..declared {
        let base = record * RECORD_STRIDE + FIRST_RECORD;
        match decode_location_record(drd, msg, buffered, base) {
            Some(event) => events.push(Event::Position(event)),
            None => return (events, true),
        }
    }
    (events, false)
}

/// Declared record count, field 6. Non-numeric or missing values fall
/// back to a single record rather than dropping the datagram.
fn record_count(msg: &TokenizedMessage) -> usize {
    msg.field(6).and_then(|v| v.parse().ok()).unwrap_or(1)
}

/// One location record at `base`. Battery and send time sit at fixed
/// trailing offsets shared by every record in the datagram.
fn decode_location_record(
    drd: &str,
    msg: &TokenizedMessage,
    buffered: bool,
    base: usize,
) -> Option<PositionEvent> {
    if msg.len() <= base + 6 {
        return None;
    }
    let hdop = msg.field(base)?;
    let speed = msg.field(base + 1)?;
    let elev = msg.field(base + 3)?;
    let lon = msg.field(base + 4)?;
    let lat = msg.field(base + 5)?;
    let fixtime = msg.field(base + 6)?;
    let battery = msg.from_end(3)?;
    let sendtime = msg.from_end(2)?;
    Some(PositionEvent {
        fix: hdop != "0",
        lat: lat.to_string(),
        lon: lon.to_string(),
        elev: elev.to_string(),
        speed: speed.to_string(),
        hdop: hdop.to_string(),
        drd: drd.to_string(),
        fixtime: fixtime.to_string(),
        buffered,
        battery: battery.to_string(),
        sendtime: sendtime.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
