mod baseline;
mod classify;
mod config;
mod convert;
mod edf_write;
mod error;
mod pdf_extract;
mod signal;
mod waveform;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Args, Config};
use crate::convert::Conversion;
use crate::signal::RowReport;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from(Args::parse());
    convert::run(&config, |conversion| print_report(conversion, &config))?;

    let file_size = std::fs::metadata(&config.output_path)?.len();
    println!("\nEDF file written: {}", config.output_path.display());
    println!("File size: {} bytes", file_size);

    Ok(())
}

/// Print baselines, per-row results and signal totals.
fn print_report(conversion: &Conversion, config: &Config) {
    println!(
        "Baselines (PDF y-coordinates): {:?}",
        conversion
            .baselines
            .iter()
            .map(|b| format!("{:.1}", b.y))
            .collect::<Vec<_>>()
    );

    for report in &conversion.signal.rows {
        match report {
            RowReport::Samples {
                row,
                count,
                x_start,
                x_end,
                min_mv,
                max_mv,
            } => println!(
                "Row {}: {} samples, x:[{:.1}-{:.1}], range [{:.3}, {:.3}] mV",
                row, count, x_start, x_end, min_mv, max_mv
            ),
            RowReport::Empty { row } => println!("Row {}: no data", row),
        }
    }

    let signal = &conversion.signal;
    let (min_v, max_v) = signal.range().unwrap_or_default();

    println!("\nTotal samples: {}", signal.samples.len());
    println!("Duration: {:.2} seconds", conversion.duration_secs(config));
    println!("Sampling rate: {} Hz", config.sample_rate);
    println!("Voltage range: [{:.3}, {:.3}] mV", min_v, max_v);
}
