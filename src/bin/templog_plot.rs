use templog_xlsx::convert::read_records;
use templog_xlsx::init_logging;
use templog_xlsx::plot::{parse_cli, plot_records};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_cli()?;
    init_logging(config.verbose);
    info!(
        "read data from {} and plot to {}",
        config.input.display(),
        config.output.display()
    );
    let report = read_records(&config.input, config.policy)?;
    plot_records(&report.records, &config.output)?;
    println!("Plot has been written to {}", config.output.display());
    Ok(())
}
