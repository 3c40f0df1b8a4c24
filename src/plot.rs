use super::{min_and_max, suitable_xfmt, Record, CHART_TITLE, VERSION};
use crate::convert::derive_output_path;
use crate::error::ConvertError;
use crate::parser::ErrorPolicy;
use chrono::prelude::*;
use clap::{App, Arg};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// Settings of the plotting tool.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub policy: ErrorPolicy,
    pub verbose: bool,
}

/// Takes the CLI arguments that control the plotting of the temperature log.
pub fn parse_cli() -> Result<PlotConfig, ConvertError> {
    let arg_input = Arg::with_name("input")
        .help("temperature log, alternating timestamp and temperature lines")
        .required(true)
        .index(1);
    let arg_svgout = Arg::with_name("output_svgfile")
        .help("name of the output svg file")
        .short("o")
        .long("svgfile")
        .takes_value(true);
    let arg_policy = Arg::with_name("policy")
        .help("what to do with malformed pairs")
        .short("p")
        .long("policy")
        .takes_value(true)
        .possible_values(&["tolerant", "strict"])
        .default_value("tolerant");
    let arg_verbose = Arg::with_name("verbose")
        .help("print verbose information")
        .short("v")
        .long("verbose")
        .takes_value(false);
    let cli_args = App::new("templog_plot")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to plot the temperature log")
        .arg(arg_input)
        .arg(arg_svgout)
        .arg(arg_policy)
        .arg(arg_verbose)
        .get_matches();
    let input = PathBuf::from(cli_args.value_of("input").unwrap_or_default());
    let output = match cli_args.value_of("output_svgfile") {
        Some(p) => PathBuf::from(p),
        None => derive_output_path(&input, "svg")?,
    };
    let policy = cli_args
        .value_of("policy")
        .unwrap_or_default()
        .parse::<ErrorPolicy>()
        .unwrap_or_default();
    Ok(PlotConfig {
        input,
        output,
        policy,
        verbose: cli_args.is_present("verbose"),
    })
}

/// plots the temperature series to svg, in record order
pub fn plot_records(records: &[Record], fout: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let times: Vec<NaiveDateTime> = records.iter().map(|r| r.time()).collect();
    let temps: Vec<f64> = records.iter().map(|r| r.celsius()).collect();
    let (xmindt, xmaxdt) = min_and_max(&times[..]).ok_or("no records to plot")?;
    let (ymin, ymax) = min_and_max(&temps[..]).ok_or("no records to plot")?;

    let xspan: chrono::Duration = xmaxdt - xmindt;
    let xmargin: chrono::Duration = if xspan == chrono::Duration::zero() {
        chrono::Duration::minutes(1)
    } else {
        xspan / 20
    };
    let xminlocal = TimeZone::from_utc_datetime(&Utc, &(xmindt - xmargin));
    let xmaxlocal = TimeZone::from_utc_datetime(&Utc, &(xmaxdt + xmargin));
    let xfmt = suitable_xfmt(xspan);
    let yspan = if ymax > ymin { (ymax - ymin) / 10f64 } else { 1. };
    let ymin = ymin - yspan;
    let ymax = ymax + yspan;

    let root = SVGBackend::new(fout, (1600, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(CHART_TITLE, ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(100)
        .build_cartesian_2d(xminlocal..xmaxlocal, ymin..ymax)?;
    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(RGBColor(150, 150, 150).stroke_width(2))
        .set_all_tick_mark_size(2)
        .label_style(("sans-serif", 24))
        .y_desc("temperature [°C]")
        .x_labels(14) // max number of labels
        .x_label_formatter(&|x: &DateTime<Utc>| x.format(xfmt).to_string())
        .y_label_formatter(&|x: &f64| format!("{:5}", x))
        .x_desc(format!("datetime [{}]", xfmt.replace("%", "")))
        .draw()?;

    let line = LineSeries::new(
        times
            .iter()
            .zip(temps.iter())
            .map(|(x, y)| (TimeZone::from_utc_datetime(&Utc, x), *y)),
        RGBColor(180, 10, 10).stroke_width(3),
    );
    chart.draw_series(line)?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(plot_records(&[], &dir.path().join("empty.svg")).is_err());
    }
}
