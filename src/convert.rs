use anyhow::Result;
use tracing::info;

use crate::baseline::{locate_baselines, Baseline};
use crate::config::Config;
use crate::edf_write::{write_edf_file, EdfChannel};
use crate::error::ConvertError;
use crate::pdf_extract::{load_page_primitives, DrawingPrimitive};
use crate::signal::{reconstruct, Signal};
use crate::waveform::extract_waveform_rows;

/// Result of turning one chart page into a calibrated signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub baselines: Vec<Baseline>,
    pub signal: Signal,
    /// Data range widened by the configured margin; written as the EDF
    /// physical range.
    pub physical_range: (f64, f64),
}

impl Conversion {
    pub fn duration_secs(&self, config: &Config) -> f64 {
        self.signal.duration_secs(config.sample_rate)
    }
}

/// Locate baselines, extract waveform rows and reconstruct the voltage
/// signal from a page's drawing primitives.
pub fn convert(
    primitives: &[DrawingPrimitive],
    config: &Config,
) -> Result<Conversion, ConvertError> {
    let baselines = locate_baselines(primitives, config)?;
    let rows = extract_waveform_rows(primitives, &baselines, config);
    let signal = reconstruct(
        &rows,
        &baselines,
        config.cal_pt_per_mv,
        config.x_dedup_tolerance,
    );

    let physical_range = signal
        .physical_range(config.physical_margin)
        .ok_or(ConvertError::NoSamples)?;

    Ok(Conversion {
        baselines,
        signal,
        physical_range,
    })
}

/// Read the configured PDF page, convert it, and write the EDF+ file.
/// `report` sees the conversion before the file is written. Nothing is
/// written when the conversion fails.
pub fn run(config: &Config, report: impl FnOnce(&Conversion)) -> Result<Conversion> {
    info!(path = %config.input_path.display(), "loading PDF");
    let primitives = load_page_primitives(&config.input_path, config.page_index)?;

    let conversion = convert(&primitives, config)?;
    report(&conversion);

    let (physical_min, physical_max) = conversion.physical_range;
    let channel = EdfChannel {
        label: format!("EKG {}", config.lead_name),
        sample_rate: config.sample_rate,
        physical_min,
        physical_max,
    };
    write_edf_file(
        &config.output_path,
        &config.metadata,
        &channel,
        &conversion.signal.samples,
    )?;
    info!(path = %config.output_path.display(), "EDF file written");

    Ok(conversion)
}
