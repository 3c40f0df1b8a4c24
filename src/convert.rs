use super::VERSION;
use crate::error::ConvertError;
use crate::parser::{ErrorPolicy, LineRecordParser, ParseReport};
use crate::xlsx::{RecordSink, XlsxEmitter};
use clap::{App, Arg};
use std::path::{Path, PathBuf};
use tracing::info;

/// Settings of one conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub policy: ErrorPolicy,
    pub verbose: bool,
}

/// Takes the CLI arguments for the conversion to xlsx.
pub fn parse_cli() -> Result<ConvertConfig, ConvertError> {
    let arg_input = Arg::with_name("input")
        .help("temperature log, alternating timestamp and temperature lines")
        .required(true)
        .index(1);
    let arg_output = Arg::with_name("output")
        .help("name of the output xlsx file, defaults to the input with the .xlsx extension")
        .short("o")
        .long("output")
        .takes_value(true);
    let arg_policy = Arg::with_name("policy")
        .help("what to do with malformed pairs")
        .long_help("tolerant skips and logs malformed pairs; strict stops at the first one and writes nothing")
        .short("p")
        .long("policy")
        .takes_value(true)
        .possible_values(&["tolerant", "strict"])
        .default_value("tolerant");
    let arg_verbose = Arg::with_name("verbose")
        .help("print verbose information")
        .short("v")
        .long("verbose")
        .takes_value(false)
        .required(false);
    let cli_args = App::new("templog_xlsx")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to convert a temperature log to an xlsx workbook with a line chart")
        .arg(arg_input)
        .arg(arg_output)
        .arg(arg_policy)
        .arg(arg_verbose)
        .get_matches();

    let input = PathBuf::from(cli_args.value_of("input").unwrap_or_default());
    let output = match cli_args.value_of("output") {
        Some(p) => PathBuf::from(p),
        None => derive_output_path(&input, "xlsx")?,
    };
    let policy = cli_args
        .value_of("policy")
        .unwrap_or_default()
        .parse::<ErrorPolicy>()
        .unwrap_or_default();
    Ok(ConvertConfig {
        input,
        output,
        policy,
        verbose: cli_args.is_present("verbose"),
    })
}

/// Replaces the final extension of `input` with `extension`, or appends it.
/// Refuses a result equal to the input, which would be overwritten.
pub fn derive_output_path(input: &Path, extension: &str) -> Result<PathBuf, ConvertError> {
    let mut output = input.to_path_buf();
    output.set_extension(extension);
    if output == input {
        return Err(ConvertError::InvalidInputPath(input.to_path_buf()));
    }
    Ok(output)
}

/// Reads the whole input file and parses it with the configured policy.
pub fn read_records(input: &Path, policy: ErrorPolicy) -> Result<ParseReport, ConvertError> {
    let text = std::fs::read_to_string(input).map_err(|source| ConvertError::InputUnreadable {
        path: input.to_path_buf(),
        source,
    })?;
    let parser = LineRecordParser::new(policy);
    info!(
        "read {} lines from {}, {} policy",
        text.lines().count(),
        input.display(),
        parser.policy()
    );
    parser.parse_str(&text)
}

/// Compares resolved paths when both exist, so `./log.xlsx` and `log.xlsx` match.
/// An output that does not exist yet cannot be the input.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Parses the input and hands the records to `sink`.
/// A strict failure returns before the sink is touched.
pub fn run_with_sink<S: RecordSink>(
    config: &ConvertConfig,
    sink: &S,
) -> Result<ParseReport, ConvertError> {
    let report = read_records(&config.input, config.policy)?;
    sink.emit(&report.records)?;
    Ok(report)
}

/// Full conversion to the xlsx at `config.output`.
pub fn run(config: &ConvertConfig) -> Result<ParseReport, ConvertError> {
    if same_file(&config.input, &config.output) {
        return Err(ConvertError::InvalidInputPath(config.input.clone()));
    }
    run_with_sink(config, &XlsxEmitter::new(&config.output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;
    use std::cell::RefCell;
    use std::io::Write;

    #[derive(Default)]
    struct Collect {
        rows: RefCell<Option<Vec<Record>>>,
    }

    impl RecordSink for Collect {
        fn emit(&self, records: &[Record]) -> Result<(), ConvertError> {
            *self.rows.borrow_mut() = Some(records.to_vec());
            Ok(())
        }
    }

    fn config(input: PathBuf, policy: ErrorPolicy) -> ConvertConfig {
        ConvertConfig {
            output: input.with_extension("xlsx"),
            input,
            policy,
            verbose: false,
        }
    }

    const GOOD_BAD_GOOD: &str = "Sat Nov 9 22:05:01 UTC 2024\ntemp=40.1'C\n\
        Sat Nov 9 22:06:01 UTC 2024\ntemp=??'C\n\
        Sat Nov 9 22:07:01 UTC 2024\ntemp=41.0'C\n";

    #[test]
    fn output_path_replaces_last_extension() {
        assert_eq!(
            derive_output_path(Path::new("logs/temp.2024.log"), "xlsx").unwrap(),
            PathBuf::from("logs/temp.2024.xlsx")
        );
        assert_eq!(
            derive_output_path(Path::new("temp.txt"), "svg").unwrap(),
            PathBuf::from("temp.svg")
        );
    }

    #[test]
    fn output_path_without_extension_is_appended() {
        assert_eq!(
            derive_output_path(Path::new("data.d/templog"), "xlsx").unwrap(),
            PathBuf::from("data.d/templog.xlsx")
        );
    }

    #[test]
    fn output_path_equal_to_input_is_refused() {
        assert!(matches!(
            derive_output_path(Path::new("temp.xlsx"), "xlsx"),
            Err(ConvertError::InvalidInputPath(_))
        ));
    }

    #[test]
    fn tolerant_run_hands_good_records_to_sink() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input.write_all(GOOD_BAD_GOOD.as_bytes()).unwrap();
        let sink = Collect::default();
        let report = run_with_sink(
            &config(input.path().to_path_buf(), ErrorPolicy::Tolerant),
            &sink,
        )
        .unwrap();
        assert_eq!(report.skipped_count(), 1);
        let rows = sink.rows.borrow().clone().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].celsius(), 41.0);
    }

    #[test]
    fn strict_run_never_reaches_sink() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input.write_all(GOOD_BAD_GOOD.as_bytes()).unwrap();
        let sink = Collect::default();
        let err = run_with_sink(
            &config(input.path().to_path_buf(), ErrorPolicy::Strict),
            &sink,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Strict { line: 3, .. }));
        assert!(sink.rows.borrow().is_none());
    }

    #[test]
    fn missing_input_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(&dir.path().join("nope.log"), ErrorPolicy::Tolerant).unwrap_err();
        assert!(matches!(err, ConvertError::InputUnreadable { .. }));
    }
}
