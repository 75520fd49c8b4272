//! Extended attribute framing and value resolution
//!
//! Each attribute is `u32 length` followed by `key \0 raw`. The raw bytes carry
//! no type information, so the value is resolved by an ordered rule table
//! keyed mostly on the attribute name. The first matching rule wins; when its
//! decoder cannot interpret the bytes the value falls back to text or raw.

use std::fmt;
use std::io::Cursor;

use chrono::{Local, NaiveDateTime, TimeZone};
use tracing::{debug, trace};
use uuid::Uuid;

use super::types::Attribute;
use crate::common::binary::{exact, leading, ByteCursor};
use crate::error::{Block, DecodeError};

// =============================================================================
// Typed Values
// =============================================================================

/// Resolved attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    /// Local calendar time
    Timestamp(NaiveDateTime),
    /// Uppercase canonical UUID
    Uuid(String),
    /// Lowercase hex digest
    Hex(String),
    Text(String),
    /// Property list rendered as XML
    Plist(String),
    /// Bytes no rule could interpret
    Raw(Vec<u8>),
}

impl AttributeValue {
    pub fn is_raw(&self) -> bool {
        matches!(self, AttributeValue::Raw(_))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Unsigned(v) => write!(f, "{v}"),
            AttributeValue::Signed(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => f.write_str(&format_float(*v)),
            AttributeValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            AttributeValue::Uuid(s)
            | AttributeValue::Hex(s)
            | AttributeValue::Text(s)
            | AttributeValue::Plist(s) => f.write_str(s),
            AttributeValue::Raw(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

// =============================================================================
// Framing
// =============================================================================

/// Read the attribute count followed by that many attribute records
pub fn read_attribute_table(cursor: &mut ByteCursor<'_>) -> Result<Vec<Attribute>, DecodeError> {
    let count = cursor.read_u32_le(Block::AttributeCount)?;
    // Each record needs at least its 4-byte length; don't trust count for allocation
    let mut attributes = Vec::with_capacity((count as usize).min(cursor.remaining() / 4));
    for index in 0..count {
        attributes.push(read_attribute(cursor, index)?);
    }
    Ok(attributes)
}

/// Read one length-prefixed `key \0 raw` record and resolve its value
pub fn read_attribute(cursor: &mut ByteCursor<'_>, index: u32) -> Result<Attribute, DecodeError> {
    let block = Block::Attribute(index);
    let length = cursor.read_u32_le(block)? as usize;
    let body = cursor.read_bytes(length, block)?;

    let separator = body
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::MalformedAttribute { index })?;
    let key = String::from_utf8_lossy(&body[..separator]).into_owned();
    let raw = body[separator + 1..].to_vec();
    let value = resolve_value(&key, &raw);

    Ok(Attribute { key, value, raw })
}

// =============================================================================
// Resolution Rules
// =============================================================================

/// One entry of the ordered value-resolution table
pub struct ValueRule {
    pub name: &'static str,
    pub matches: fn(&str, &[u8]) -> bool,
    /// None when the bytes don't fit the rule's encoding
    pub decode: fn(&[u8]) -> Option<AttributeValue>,
}

const TIMESTAMP_KEYS: [&str; 4] = ["Install", "LAD", "LMD", "Upgrade"];

const BPLIST_MAGIC: &[u8] = b"bplist";

/// Evaluated top to bottom; the last rule matches everything
pub static VALUE_RULES: &[ValueRule] = &[
    ValueRule {
        name: "assetsd-u16",
        matches: |key, raw| key.contains("assetsd") && raw.len() == 2,
        decode: |raw| exact(raw).map(|b| AttributeValue::Unsigned(u16::from_le_bytes(b) as u64)),
    },
    ValueRule {
        name: "ani-clen-u64",
        // The length check only binds to "clen"
        matches: |key, raw| key.contains("ANI") || (key.contains("clen") && raw.len() == 8),
        decode: |raw| exact(raw).map(|b| AttributeValue::Unsigned(u64::from_le_bytes(b))),
    },
    ValueRule {
        name: "named-timestamp-f64",
        matches: |key, raw| TIMESTAMP_KEYS.contains(&key) && raw.len() == 8,
        decode: decode_f64,
    },
    ValueRule {
        name: "szmodtime-f64",
        matches: |key, _| key.ends_with("szmodtime"),
        decode: decode_f64,
    },
    ValueRule {
        name: "sha1-hex",
        matches: |key, _| key.ends_with("SHA1"),
        decode: |raw| Some(AttributeValue::Hex(hex::encode(raw))),
    },
    ValueRule {
        name: "retired-reason-text",
        matches: |key, _| key.ends_with("retired-reason"),
        decode: |raw| {
            let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            std::str::from_utf8(&raw[..end])
                .ok()
                .map(|s| AttributeValue::Text(s.to_string()))
        },
    },
    ValueRule {
        name: "timezone-offset-i32",
        matches: |key, _| key.ends_with("timeZoneOffset"),
        decode: |raw| exact(raw).map(|b| AttributeValue::Signed(i32::from_le_bytes(b) as i64)),
    },
    ValueRule {
        name: "date-ps-localtime",
        matches: |key, _| key.ends_with("date#PS"),
        decode: |raw| {
            let secs = u32::from_le_bytes(leading(raw)?);
            Local
                .timestamp_opt(secs as i64, 0)
                .earliest()
                .map(|dt| AttributeValue::Timestamp(dt.naive_local()))
        },
    },
    ValueRule {
        name: "uuid",
        // Both spellings occur in the wild
        matches: |key, _| {
            key.ends_with("UUID#PS") || key.ends_with("assestd.UUID") || key.ends_with("assetsd.UUID")
        },
        decode: |raw| {
            Uuid::from_slice(raw)
                .ok()
                .map(|u| AttributeValue::Uuid(u.hyphenated().to_string().to_uppercase()))
        },
    },
    ValueRule {
        name: "bplist",
        matches: |_, raw| raw.starts_with(BPLIST_MAGIC),
        decode: decode_plist,
    },
    ValueRule {
        name: "text-or-raw",
        matches: |_, _| true,
        // Non-UTF-8 bytes are ambiguous; the caller stores them raw
        decode: |raw| std::str::from_utf8(raw).ok().map(|s| AttributeValue::Text(s.to_string())),
    },
];

fn decode_f64(raw: &[u8]) -> Option<AttributeValue> {
    exact(raw).map(|b| AttributeValue::Float(f64::from_le_bytes(b)))
}

fn decode_plist(raw: &[u8]) -> Option<AttributeValue> {
    let value = plist::Value::from_reader(Cursor::new(raw)).ok()?;
    let mut xml = Vec::new();
    value.to_writer_xml(&mut xml).ok()?;
    String::from_utf8(xml).ok().map(AttributeValue::Plist)
}

/// Shortest round-trip digits; scientific notation when the decimal exponent
/// is below -4 or above 15, with a signed exponent of at least two digits
/// (`1e+20`, `1e-05`, `0.0001`, `nan`, `-inf`)
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    // `{:e}` yields the shortest round-trip mantissa, e.g. "-1.25e-7"
    let sci = format!("{:e}", value.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if value.is_sign_negative() { "-" } else { "" };

    // Position of the decimal point relative to the first digit
    let point = exponent + 1;
    if !(-4 < point && point <= 16) {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exp_sign}{:02}", exponent.unsigned_abs());
    }

    let body = if point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else {
        let point = point as usize;
        if point >= digits.len() {
            format!("{digits}{}.0", "0".repeat(point - digits.len()))
        } else {
            format!("{}.{}", &digits[..point], &digits[point..])
        }
    };
    format!("{sign}{body}")
}

fn text_or_raw(raw: &[u8]) -> AttributeValue {
    match std::str::from_utf8(raw) {
        Ok(text) => AttributeValue::Text(text.to_string()),
        Err(_) => AttributeValue::Raw(raw.to_vec()),
    }
}

/// First rule whose predicate accepts this key/value
pub fn matching_rule(key: &str, raw: &[u8]) -> &'static ValueRule {
    VALUE_RULES
        .iter()
        .find(|rule| (rule.matches)(key, raw))
        .unwrap_or(&VALUE_RULES[VALUE_RULES.len() - 1])
}

/// Apply the first matching rule, reporting when its decoder rejects the bytes
pub fn apply_rules(key: &str, raw: &[u8]) -> Result<AttributeValue, DecodeError> {
    let rule = matching_rule(key, raw);
    trace!(key, rule = rule.name, len = raw.len(), "Attribute rule matched");
    (rule.decode)(raw).ok_or_else(|| DecodeError::DecodeAmbiguous {
        key: key.to_string(),
        rule: rule.name,
    })
}

/// Resolve a typed value; never fails
pub fn resolve_value(key: &str, raw: &[u8]) -> AttributeValue {
    match apply_rules(key, raw) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Falling back to text/raw value");
            text_or_raw(raw)
        }
    }
}
