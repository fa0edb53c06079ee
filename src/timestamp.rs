//! Timestamp rendering for `${TIMESTAMP}`
//!
//! The pattern is parsed into chrono format items once, when the template
//! is compiled; each record then only pays for the formatting itself.

use crate::error::{AuditError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{FixedOffset, Local, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::Write;

/// Longest offset accepted for a fixed zone, in hours
const MAX_OFFSET_HOURS: i32 = 18;

/// Zone a formatted timestamp is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    /// Zone of the host system
    Local,
    Fixed(FixedOffset),
    /// IANA region such as `Europe/Stockholm`, daylight saving included
    Named(Tz),
}

impl Zone {
    /// Resolve a zone id: `UTC`/`GMT`/`Z`, `local`/`system`, an offset
    /// such as `+02:00`, `-0530`, `UTC+1`, or an IANA region id
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        let upper = id.to_ascii_uppercase();
        match upper.as_str() {
            "UTC" | "GMT" | "UT" | "Z" | "ETC/UTC" | "ETC/GMT" => return Ok(Zone::Utc),
            "LOCAL" | "SYSTEM" => return Ok(Zone::Local),
            _ => {}
        }

        let offset = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper);
        if let Some(fixed) = parse_offset(offset) {
            return Ok(Zone::Fixed(fixed));
        }

        id.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|_| AuditError::InvalidTimeZone(id.to_string()))
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, digits) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() > 2 => digits.split_at(2),
        None => (digits, "0"),
    };
    if hours.is_empty()
        || !hours.bytes().all(|b| b.is_ascii_digit())
        || !minutes.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > MAX_OFFSET_HOURS || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// How `${TIMESTAMP}` renders epoch milliseconds
#[derive(Debug, Clone)]
pub enum TimestampFormat {
    /// Raw epoch milliseconds
    Raw,
    /// Pattern applied in a zone
    Formatted {
        items: Vec<Item<'static>>,
        zone: Zone,
    },
}

impl TimestampFormat {
    /// Build from the configured pattern and zone
    ///
    /// Without a pattern the raw millis are rendered; a zone without a
    /// pattern is still validated. A pattern without a zone renders in
    /// the system zone.
    pub fn new(pattern: Option<&str>, zone: Option<&str>) -> Result<Self> {
        let zone = zone.map(Zone::parse).transpose()?.unwrap_or(Zone::Local);
        let Some(pattern) = pattern else {
            return Ok(TimestampFormat::Raw);
        };

        if pattern.is_empty() {
            return Err(AuditError::InvalidTimeFormat {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }
        let items = StrftimeItems::new(pattern)
            .parse_to_owned()
            .map_err(|e| AuditError::InvalidTimeFormat {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(TimestampFormat::Formatted { items, zone })
    }

    pub fn format(&self, millis: u64) -> String {
        let (items, zone) = match self {
            TimestampFormat::Raw => return millis.to_string(),
            TimestampFormat::Formatted { items, zone } => (items, zone),
        };

        let Some(instant) = i64::try_from(millis)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        else {
            return millis.to_string();
        };

        let mut out = String::new();
        let written = match zone {
            Zone::Utc => write!(out, "{}", instant.format_with_items(items.iter())),
            Zone::Local => write!(
                out,
                "{}",
                instant.with_timezone(&Local).format_with_items(items.iter())
            ),
            Zone::Fixed(offset) => write!(
                out,
                "{}",
                instant.with_timezone(offset).format_with_items(items.iter())
            ),
            Zone::Named(tz) => write!(
                out,
                "{}",
                instant.with_timezone(tz).format_with_items(items.iter())
            ),
        };
        if written.is_err() {
            return millis.to_string();
        }
        out
    }
}
