//! Coercion of ingested JSON payloads into packet records.
//!
//! Senders are not trusted to send well-typed JSON: integer fields may
//! arrive as numbers or numeric strings.

use std::net::Ipv4Addr;

use serde_json::{Map, Value};

use crate::domain::{PacketRecord, Protocol};
use crate::error::PayloadError;

/// Coerce one payload `{length, srcaddr, dstaddr, protocol, srcport, dstport}`
/// into a packet record. Unknown fields (including any `id`) are ignored.
pub fn coerce_payload(value: &Value) -> Result<PacketRecord, PayloadError> {
    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;

    let length = integer_field(object, "length")?;
    let source_address = address_field(object, "srcaddr")?;
    let destination_address = address_field(object, "dstaddr")?;
    let protocol = protocol_field(object)?;
    let source_port = integer_field(object, "srcport")?;
    let destination_port = integer_field(object, "dstport")?;

    Ok(PacketRecord::new(
        length,
        source_address,
        destination_address,
        protocol,
        source_port,
        destination_port,
    ))
}

fn field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, PayloadError> {
    match object.get(name) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn integer_field<T>(object: &Map<String, Value>, name: &'static str) -> Result<T, PayloadError>
where
    T: TryFrom<i64>,
{
    let value = field(object, name)?;
    let invalid = || PayloadError::InvalidInteger {
        field: name,
        value: value.to_string(),
    };

    let parsed = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
                _ => return Err(invalid()),
            },
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    T::try_from(parsed).map_err(|_| PayloadError::OutOfRange {
        field: name,
        value: parsed,
    })
}

fn address_field(object: &Map<String, Value>, name: &'static str) -> Result<Ipv4Addr, PayloadError> {
    let value = field(object, name)?;
    value
        .as_str()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| PayloadError::InvalidAddress {
            field: name,
            value: value.to_string(),
        })
}

fn protocol_field(object: &Map<String, Value>) -> Result<Protocol, PayloadError> {
    let value = field(object, "protocol")?;
    value
        .as_str()
        .ok_or_else(|| PayloadError::InvalidProtocol(value.to_string()))?
        .parse()
        .map_err(PayloadError::InvalidProtocol)
}
