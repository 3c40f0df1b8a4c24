use chrono::prelude::*;
use tracing_subscriber::EnvFilter;
pub mod convert;
pub mod error;
pub mod parser;
pub mod plot;
pub mod xlsx;

pub use error::{ConvertError, ParseError};
pub use parser::{ErrorPolicy, LineRecordParser, ParseOutcome, ParseReport, SkippedPair};

pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Timestamp format A, without the leading weekday: `Nov 9 22:05:01 UTC 2024`
pub const TS_FORMAT_A: &str = "%b %d %H:%M:%S UTC %Y";
/// Timestamp format B, without the leading weekday: `09 Nov 2024 02:35:25 AM UTC`
pub const TS_FORMAT_B: &str = "%d %b %Y %I:%M:%S %p UTC";

pub const TEMP_DELIMITER: char = '=';
pub const TEMP_SUFFIX: &str = "'C";

pub const HEADER_DATETIME: &str = "Date/Time";
pub const HEADER_TEMPERATURE: &str = "Temperature (°C)";
pub const CHART_TITLE: &str = "Temperature Over Time";

/// One validated reading, immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    time: NaiveDateTime,
    celsius: f64,
}

impl Record {
    pub fn new(time: NaiveDateTime, celsius: f64) -> Record {
        Record { time, celsius }
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn celsius(&self) -> f64 {
        self.celsius
    }
}

/// Installs the stderr subscriber used by both binaries.
/// `RUST_LOG` wins over the verbose switch when set.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn min_and_max<T: std::cmp::PartialOrd + Copy>(s: &[T]) -> Option<(T, T)> {
    let mut self_iter = s.iter();
    let (mut min, mut max) = match self_iter.next() {
        Some(v) => (*v, *v),
        None => return None,
    };
    for es in self_iter {
        if *es > max {
            max = *es
        }
        if *es < min {
            min = *es
        }
    }
    Some((min, max))
}

pub fn suitable_xfmt(d: chrono::Duration) -> &'static str {
    if d > chrono::Duration::weeks(1) {
        "%y-%m-%d"
    } else if d > chrono::Duration::days(1) {
        "%m-%d %H"
    } else {
        "%d %H:%M"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_and_max_of_unordered_values() {
        assert_eq!(min_and_max(&[3.5, -1.0, 7.25, 0.0]), Some((-1.0, 7.25)));
        assert_eq!(min_and_max::<f64>(&[]), None);
    }

    #[test]
    fn xfmt_follows_span() {
        assert_eq!(suitable_xfmt(chrono::Duration::hours(3)), "%d %H:%M");
        assert_eq!(suitable_xfmt(chrono::Duration::days(3)), "%m-%d %H");
        assert_eq!(suitable_xfmt(chrono::Duration::weeks(3)), "%y-%m-%d");
    }
}
