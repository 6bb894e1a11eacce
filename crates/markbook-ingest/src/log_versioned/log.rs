//! Submission log parsing
//!
//! One event per line: `<label> <N>\t<Www Mmm dd HH:MM:SS YYYY>\t<text>`,
//! with the time in the submission server's local zone.

use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, TimeZone, Utc};

const LOG_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub number: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLineError {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

fn to_utc(naive: NaiveDateTime, utc_offset_minutes: Option<i32>) -> Option<DateTime<Utc>> {
    let local = match utc_offset_minutes {
        Some(minutes) => {
            let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
            offset.from_local_datetime(&naive).single()?.with_timezone(&Utc)
        }
        None => match Local.from_local_datetime(&naive) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            // repeated hour at a DST fold: take the first occurrence
            LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
            LocalResult::None => return None,
        },
    };
    Some(local)
}

/// Parse one non-blank log line
pub fn parse_line(line: &str, utc_offset_minutes: Option<i32>) -> Result<LogEntry, String> {
    let mut fields = line.splitn(3, '\t');
    let label = fields.next().unwrap_or_default();
    let time = fields
        .next()
        .ok_or_else(|| "missing tab-separated timestamp".to_string())?;

    let number = label
        .split_whitespace()
        .last()
        .ok_or_else(|| "missing sequence number".to_string())?
        .parse::<u32>()
        .map_err(|e| format!("bad sequence number: {}", e))?;

    let time = time.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&time, LOG_TIME_FORMAT)
        .map_err(|e| format!("bad timestamp '{}': {}", time, e))?;
    let timestamp = to_utc(naive, utc_offset_minutes)
        .ok_or_else(|| format!("timestamp '{}' does not exist in the log zone", time))?;

    Ok(LogEntry { number, timestamp })
}

/// Parse a whole log, skipping blank lines
pub fn parse_log(text: &str, utc_offset_minutes: Option<i32>) -> Result<Vec<LogEntry>, LogLineError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_line(line.trim(), utc_offset_minutes).map_err(|reason| LogLineError {
                line: i + 1,
                reason,
            })
        })
        .collect()
}
