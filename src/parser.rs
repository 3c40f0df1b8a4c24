use super::{Record, TEMP_DELIMITER, TEMP_SUFFIX, TS_FORMAT_A, TS_FORMAT_B};
use crate::error::{ConvertError, ParseError};
use chrono::prelude::*;
use tracing::{debug, info, warn};

/// What to do with a malformed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// log the pair, skip it, keep going
    Tolerant,
    /// abort the whole run on the first malformed pair
    Strict,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Tolerant
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tolerant" => Ok(ErrorPolicy::Tolerant),
            "strict" => Ok(ErrorPolicy::Strict),
            other => Err(format!("unknown error policy: {}", other)),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Tolerant => write!(f, "tolerant"),
            ErrorPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Result of parsing one timestamp/temperature pair.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Accepted(Record),
    /// both halves are checked, so a pair may carry two reasons
    Skipped(Vec<ParseError>),
}

/// A pair (or trailing line) that did not make it into the records.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    /// 1-based line number of the first line of the pair
    pub line: usize,
    pub reasons: Vec<ParseError>,
}

/// Records in input order plus whatever had to be dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub records: Vec<Record>,
    /// number of complete pairs seen, accepted or not
    pub pairs: usize,
    pub skipped: Vec<SkippedPair>,
}

impl ParseReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Turns alternating timestamp / temperature lines into records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineRecordParser {
    policy: ErrorPolicy,
}

impl LineRecordParser {
    pub fn new(policy: ErrorPolicy) -> LineRecordParser {
        LineRecordParser { policy }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Splits the whole text into lines and parses them.
    pub fn parse_str(&self, text: &str) -> Result<ParseReport, ConvertError> {
        let lines: Vec<&str> = text.lines().collect();
        self.parse_lines(&lines)
    }

    /// Consumes the lines two at a time, from the first one.
    /// An odd trailing line is always reported and skipped, whatever the policy.
    /// With the strict policy the first malformed pair is returned as an error
    /// and the remaining pairs are never looked at.
    pub fn parse_lines<S: AsRef<str>>(&self, lines: &[S]) -> Result<ParseReport, ConvertError> {
        let mut report = ParseReport {
            records: Vec::with_capacity(lines.len() / 2),
            pairs: 0,
            skipped: Vec::new(),
        };
        let mut chunks = lines.chunks_exact(2);
        for (i, pair) in chunks.by_ref().enumerate() {
            let line = i * 2 + 1;
            report.pairs += 1;
            let (ts_text, temp_text) = (pair[0].as_ref().trim(), pair[1].as_ref().trim());
            match self.policy {
                ErrorPolicy::Strict => {
                    let record = parse_pair_strict(ts_text, temp_text)
                        .map_err(|source| ConvertError::Strict { line, source })?;
                    report.records.push(record);
                }
                ErrorPolicy::Tolerant => match parse_pair(ts_text, temp_text) {
                    ParseOutcome::Accepted(record) => report.records.push(record),
                    ParseOutcome::Skipped(reasons) => {
                        for reason in reasons.iter() {
                            warn!("line {}: {}", line, reason);
                        }
                        report.skipped.push(SkippedPair { line, reasons });
                    }
                },
            }
        }
        if let [last] = chunks.remainder() {
            let line = lines.len();
            let reason = ParseError::UnpairedTrailingLine {
                line,
                text: last.as_ref().trim().to_string(),
            };
            warn!("{}", reason);
            report.skipped.push(SkippedPair {
                line,
                reasons: vec![reason],
            });
        }
        info!(
            "parsed {} pairs: {} records, {} skipped ({} policy)",
            report.pairs,
            report.records.len(),
            report.skipped_count(),
            self.policy
        );
        Ok(report)
    }
}

/// Parses both halves independently and accepts the pair only if both succeed.
pub fn parse_pair(ts_text: &str, temp_text: &str) -> ParseOutcome {
    match (parse_timestamp(ts_text), parse_temperature(temp_text)) {
        (Ok(t), Ok(c)) => ParseOutcome::Accepted(Record::new(t, c)),
        (t, c) => ParseOutcome::Skipped(t.err().into_iter().chain(c.err()).collect()),
    }
}

/// Timestamp first; the temperature is not touched if the timestamp fails.
fn parse_pair_strict(ts_text: &str, temp_text: &str) -> Result<Record, ParseError> {
    let t = parse_timestamp(ts_text)?;
    let c = parse_temperature(temp_text)?;
    Ok(Record::new(t, c))
}

/// Tries format A, then format B.
/// The leading weekday must be a valid name but is not checked against the date.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, ParseError> {
    let text = text.trim();
    let unrecognized = || ParseError::UnrecognizedTimestampFormat(text.to_string());
    let (weekday, rest) = text
        .split_once(char::is_whitespace)
        .ok_or_else(unrecognized)?;
    weekday.parse::<Weekday>().map_err(|_| unrecognized())?;
    // month, AM/PM and the UTC literal all match in any case
    let rest = rest.trim_start().to_uppercase();
    let rest = rest.as_str();
    if let Ok(t) = NaiveDateTime::parse_from_str(rest, TS_FORMAT_A) {
        return Ok(t);
    }
    match NaiveDateTime::parse_from_str(rest, TS_FORMAT_B) {
        Ok(t) => Ok(t),
        Err(e) => {
            debug!("{}: {}", text, e);
            Err(unrecognized())
        }
    }
}

/// Extracts the number in `<label>=<number>'C`.
/// Everything after the first `=` is the payload, so a second `=` makes it non-numeric.
pub fn parse_temperature(text: &str) -> Result<f64, ParseError> {
    let text = text.trim();
    let (_, payload) = text
        .split_once(TEMP_DELIMITER)
        .ok_or_else(|| ParseError::MissingDelimiter(text.to_string()))?;
    let payload = payload.strip_suffix(TEMP_SUFFIX).unwrap_or(payload).trim();
    match payload.parse::<f64>() {
        // nan and inf parse, but cannot be stored as a cell value
        Ok(c) if c.is_finite() => Ok(c),
        _ => Err(ParseError::NonNumericPayload(text.to_string())),
    }
}
