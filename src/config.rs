use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::Parser;
use std::path::PathBuf;

const DEFAULT_PDF_PATH: &str = "kardiamobile-1l-ecg.pdf";
const DEFAULT_EDF_PATH: &str = "kardiamobile-1l-ecg.edf";

const BIRTH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1970, 5, 4) {
    Some(date) => date,
    None => panic!("invalid birth date"),
};

const START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2026, 2, 13) {
    Some(date) => date,
    None => panic!("invalid start date"),
};

const START_TIME: NaiveTime = match NaiveTime::from_hms_opt(22, 42, 0) {
    Some(time) => time,
    None => panic!("invalid start time"),
};

/// Convert a KardiaMobile 1-lead ECG PDF into an EDF+ recording.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Source PDF exported from the Kardia app.
    #[arg(default_value = DEFAULT_PDF_PATH)]
    pub input: PathBuf,

    /// Destination EDF+ file.
    #[arg(default_value = DEFAULT_EDF_PATH)]
    pub output: PathBuf,
}

/// Patient sex as encoded in the EDF+ patient identification field.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub fn edf_code(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "X",
        }
    }
}

/// Patient and recording details carried unchanged into the EDF header.
#[derive(Debug, Clone)]
pub struct RecordingMetadata {
    pub patient_name: String,
    pub sex: Sex,
    pub birth_date: NaiveDate,
    pub start: NaiveDateTime,
    pub equipment: String,
    pub annotation: String,
    pub physical_unit: String,
    pub transducer: String,
    pub prefilter: String,
}

impl Default for RecordingMetadata {
    fn default() -> Self {
        Self {
            patient_name: "Joel_Henderson".to_string(),
            sex: Sex::Male,
            birth_date: BIRTH_DATE,
            start: NaiveDateTime::new(START_DATE, START_TIME),
            equipment: "KardiaMobile_1L".to_string(),
            annotation: "Normal_Sinus_Rhythm_HR_76_BPM".to_string(),
            physical_unit: "mV".to_string(),
            transducer: "KardiaMobile 1L electrode".to_string(),
            prefilter: "Enhanced Filter, 50Hz mains".to_string(),
        }
    }
}

/// Everything the conversion needs, passed explicitly into the core.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Zero-based page index; the chart is on the second page.
    pub page_index: usize,
    /// Calibration: 1 mV = 28.346 PDF points (10mm at 2.8346 pt/mm).
    pub cal_pt_per_mv: f64,
    pub sample_rate: usize,
    pub lead_name: String,
    /// Number of chart rows, one baseline each.
    pub baseline_count: usize,
    /// Baselines at or below this y are outside the visible page area.
    pub visible_y_cutoff: f64,
    /// Minimum x-span for a horizontal line to count as a baseline.
    pub baseline_min_span: f64,
    /// Maximum |dy| for a line to count as horizontal.
    pub horizontal_tolerance: f64,
    /// Tolerance for treating a segment start as the previous segment end.
    pub endpoint_tolerance: f64,
    /// Waveform paths farther than this from every baseline are dropped.
    pub max_row_distance: f64,
    /// Adjacent points closer than this in x are boundary duplicates.
    pub x_dedup_tolerance: f64,
    /// Margin added around the data range for the EDF physical range.
    pub physical_margin: f64,
    pub metadata: RecordingMetadata,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_PDF_PATH),
            output_path: PathBuf::from(DEFAULT_EDF_PATH),
            page_index: 1,
            cal_pt_per_mv: 28.346,
            sample_rate: 300,
            lead_name: "I".to_string(),
            baseline_count: 4,
            visible_y_cutoff: 760.0,
            baseline_min_span: 500.0,
            horizontal_tolerance: 0.01,
            endpoint_tolerance: 0.001,
            max_row_distance: 80.0,
            x_dedup_tolerance: 0.01,
            physical_margin: 0.1,
            metadata: RecordingMetadata::default(),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            input_path: args.input,
            output_path: args.output,
            ..Self::default()
        }
    }
}
