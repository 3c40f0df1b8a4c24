use templog_xlsx::convert::{parse_cli, run};
use templog_xlsx::init_logging;
use tracing::{error, info};

fn main() {
    let config = match parse_cli() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_logging(config.verbose);
    info!(
        "read data from {} and save to {} ({} policy)",
        config.input.display(),
        config.output.display(),
        config.policy
    );
    match run(&config) {
        Ok(_) => println!(
            "Data and chart have been successfully written to {}",
            config.output.display()
        ),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
