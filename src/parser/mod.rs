//! Access-log line parsing and normalization
//!
//! Two historical log layouts are supported:
//! - shape (a): free-text combined-log lines carrying a bracketed
//!   timestamp and a double-quoted request line
//! - shape (b): space-delimited rows with the client address in field 0,
//!   the date/time pair split across fields 3 and 4 and the resource in
//!   field 5
//!
//! Parsing is line-local. A malformed line yields empty/zero fields and
//! never aborts an import; only blank lines are skipped entirely.

use chrono::DateTime;
use std::net::Ipv4Addr;

/// Normalized output of parsing one log line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedRecord {
    /// Raw client address, only present for shape (b) rows
    pub client: Option<String>,

    /// Requested resource, raw (not URL-decoded); empty when the line
    /// carries none
    pub resource: String,

    /// Seconds since epoch, UTC; `None` when the date is unparseable
    pub timestamp: Option<i64>,
}

/// Parse one raw log line into a normalized record.
///
/// Returns `None` for blank lines, which are skipped and do not count
/// toward an import's record count. Shape detection: six or more fields
/// with a bracketed field 3 is a delimited row; anything else falls back
/// to combined-log free-text extraction. A canonical combined-log line
/// satisfies the positional layout too and takes the delimited path,
/// which additionally yields its client address for enrichment.
pub fn parse_line(line: &str) -> Option<ParsedRecord> {
    if line.trim().is_empty() {
        return None;
    }
    let fields = split_fields(line);
    if fields.len() >= 6 && fields[3].starts_with('[') {
        Some(parse_delimited(&fields))
    } else {
        Some(parse_combined(line))
    }
}

/// Split a line into space-delimited fields, honoring double quotes.
///
/// Quotes group a field containing separators and are stripped from the
/// value. Runs of separators collapse; the result carries no empty
/// fields.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ' ' if !quoted => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }

    fields
}

/// Parse a combined-log-style free-text line (shape a).
///
/// The bracketed `[day/month/year:hour:minute:second zone]` timestamp
/// and the content of the first double-quoted field are extracted.
/// Either may be absent: a missing bracket leaves the timestamp unset,
/// a missing quote leaves the resource empty.
pub fn parse_combined(line: &str) -> ParsedRecord {
    let timestamp = extract_bracketed(line)
        .map(normalize_date_boundary)
        .and_then(|text| parse_timestamp(&text));
    let resource = extract_quoted(line).unwrap_or_default().to_string();

    ParsedRecord {
        client: None,
        resource,
        timestamp,
    }
}

/// Parse a pre-tokenized delimited row (shape b).
///
/// Field 0 is the client address. Fields 3 and 4 carry the bracketed
/// date/time pair: concatenated, brackets stripped, the literal `:`
/// between date and time replaced by a space before date parsing.
/// Field 5 is the resource, stored raw.
pub fn parse_delimited(fields: &[String]) -> ParsedRecord {
    let timestamp = match (fields.get(3), fields.get(4)) {
        (Some(date), Some(time)) => {
            let joined = format!("{date}{time}");
            let stripped = joined.trim_start_matches('[').trim_end_matches(']');
            parse_timestamp(&stripped.replacen(':', " ", 1))
        }
        _ => None,
    };

    ParsedRecord {
        client: fields.first().cloned(),
        resource: fields.get(5).cloned().unwrap_or_default(),
        timestamp,
    }
}

/// Parse a normalized `day/month/year hour:minute:second [zone]` string
/// into epoch seconds.
///
/// The zone offset may follow the time with or without a separating
/// space. A string missing the zone entirely still parses: it is treated
/// as UTC by appending an explicit UTC offset first. Unparseable input
/// yields `None`, never "now".
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    for fmt in ["%d/%b/%Y %H:%M:%S %z", "%d/%b/%Y %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.timestamp());
        }
    }
    DateTime::parse_from_str(&format!("{text} +0000"), "%d/%b/%Y %H:%M:%S %z")
        .ok()
        .map(|dt| dt.timestamp())
}

/// Convert a dotted-quad IPv4 address to its 32-bit integer form
pub fn ipv4_to_u32(addr: &str) -> Option<u32> {
    addr.parse::<Ipv4Addr>().ok().map(u32::from)
}

fn extract_bracketed(line: &str) -> Option<&str> {
    let start = line.find('[')? + 1;
    let end = line[start..].find(']')? + start;
    Some(&line[start..end])
}

fn extract_quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let end = line[start..].find('"')? + start;
    Some(&line[start..end])
}

/// Insert a space after the day/month/year portion so the ambiguous
/// `/year:` token boundary survives date parsing:
/// `10/Jan/2020:08:15:00 +0000` becomes `10/Jan/2020 08:15:00 +0000`.
fn normalize_date_boundary(text: &str) -> String {
    let bytes = text.as_bytes();
    for i in 0..bytes.len().saturating_sub(5) {
        if bytes[i] == b'/'
            && bytes[i + 1..i + 5].iter().all(u8::is_ascii_digit)
            && bytes[i + 5] == b':'
        {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..i + 5]);
            out.push(' ');
            out.push_str(&text[i + 6..]);
            return out;
        }
    }
    text.to_string()
}
