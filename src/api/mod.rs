//! Remote contract of the ticket API and the field mapping to and from the
//! local model.
//!
//! Inbound payloads are read from [`Value`]s by looking up each field under
//! an ordered list of candidate keys (the PascalCase contract name first,
//! then its camelCase and snake_case spellings), so a record decodes the
//! same whichever casing the upstream happened to emit. Outbound bodies are
//! plain serde structs in the exact PascalCase shape the remote expects,
//! with unset fields omitted rather than sent as `null`.

pub mod auth;
pub mod ticket;
pub mod user;

use serde_json::{Map, Value};
use time::{
    format_description::well_known::Rfc3339, macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};
use tracing::warn;

use crate::Error;

/// Fields of a single inbound JSON object.
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    pub fn of(value: &'a Value) -> Result<Self, Error> {
        value.as_object().map(Self).ok_or_else(|| {
            Error::Malformed(format!("expected an object, got {value}"))
        })
    }

    /// First populated value among `keys`: `null` and blank strings count
    /// as absent.
    pub fn value(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().filter_map(|k| self.0.get(*k)).find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
    }

    pub fn object(&self, keys: &[&str]) -> Option<Self> {
        self.value(keys).and_then(Value::as_object).map(Self)
    }

    pub fn str(&self, keys: &[&str]) -> Option<&'a str> {
        self.value(keys).and_then(Value::as_str)
    }

    pub fn string(&self, keys: &[&str]) -> String {
        self.str(keys).map(str::to_owned).unwrap_or_default()
    }

    /// Integer field, accepting numeric strings as well.
    pub fn int(&self, keys: &[&str]) -> Option<i64> {
        match self.value(keys)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn datetime(&self, keys: &[&str]) -> Option<OffsetDateTime> {
        let raw = self.str(keys)?;
        let parsed = parse_datetime(raw);
        if parsed.is_none() {
            warn!(raw, "unparseable timestamp ignored");
        }
        parsed
    }
}

/// Parses RFC 3339 timestamps, and offset-less ones (as emitted for .NET
/// `DateTime` values) as UTC.
pub(crate) fn parse_datetime(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
        PrimitiveDateTime::parse(
            raw,
            format_description!(
                version = 2,
                "[year]-[month]-[day]T[hour]:[minute]:[second]\
                 [optional [.[subsecond]]]"
            ),
        )
        .ok()
        .map(PrimitiveDateTime::assume_utc)
    })
}

pub(crate) fn format_datetime(at: OffsetDateTime) -> Option<String> {
    at.format(&Rfc3339).ok()
}

/// Elements of a list payload: a bare array, or one wrapped by the server
/// (`$values` from .NET reference handling, `data`, `items`).
pub(crate) fn elements(value: &Value) -> Result<&[Value], Error> {
    const WRAPPERS: &[&str] =
        &["$values", "data", "Data", "items", "Items", "value"];

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => WRAPPERS
            .iter()
            .find_map(|k| match map.get(*k) {
                Some(Value::Array(items)) => Some(items.as_slice()),
                Some(inner @ Value::Object(_)) => {
                    elements(inner).ok()
                }
                _ => None,
            })
            .ok_or_else(|| Error::Malformed("expected a list".into())),
        _ => Err(Error::Malformed("expected a list".into())),
    }
}

/// Decodes every element of a list payload, dropping (and logging) the
/// ones that cannot be read instead of failing the whole list.
pub(crate) fn decode_list<T>(
    value: &Value,
    decode: impl Fn(&Value) -> Result<T, Error>,
) -> Result<Vec<T>, Error> {
    Ok(elements(value)?
        .iter()
        .filter_map(|item| {
            decode(item)
                .inspect_err(|e| warn!(error = %e, "list entry dropped"))
                .ok()
        })
        .collect())
}

/// Whether a successful answer is only the generic acknowledgement the
/// transport produces for empty bodies, rather than a record.
pub(crate) fn is_acknowledgement(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.contains_key("message"))
}
