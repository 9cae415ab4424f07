use anyhow::{ensure, Context, Result};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::config::RecordingMetadata;

const DIGITAL_MIN: i16 = -32768;
const DIGITAL_MAX: i16 = 32767;

/// One second per data record.
const RECORD_DURATION_SECS: usize = 1;

/// Annotation channel size per record, matching pyedflib's default.
const ANNOTATION_SAMPLES: usize = 57;

/// The single ECG channel written to the file.
#[derive(Debug, Clone, PartialEq)]
pub struct EdfChannel {
    pub label: String,
    pub sample_rate: usize,
    pub physical_min: f64,
    pub physical_max: f64,
}

/// Write a space-padded ASCII field of exact width.
fn write_field<W: Write>(out: &mut W, value: &str, width: usize) -> Result<()> {
    let mut buf = value.as_bytes().to_vec();
    buf.resize(width, b' '); // right-pad with spaces
    buf.truncate(width); // ensure exact width
    out.write_all(&buf)?;
    Ok(())
}

/// EDF+ fields separate subfields with spaces, so spaces inside one become '_'.
fn edf_plus_word(value: &str) -> String {
    if value.is_empty() {
        "X".to_string()
    } else {
        value.replace(' ', "_")
    }
}

/// Date in the EDF+ `dd-MMM-yyyy` form, e.g. `04-MAY-1970`.
fn edf_plus_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string().to_uppercase()
}

/// Patient identification subfields: code, sex, birthdate, name.
fn patient_field(meta: &RecordingMetadata) -> String {
    format!(
        "X {} {} {}",
        meta.sex.edf_code(),
        edf_plus_date(meta.birth_date),
        edf_plus_word(&meta.patient_name)
    )
}

/// Recording identification subfields: start date, admin code, technician,
/// equipment, then free text.
fn recording_field(meta: &RecordingMetadata) -> String {
    let mut field = format!(
        "Startdate {} X X {}",
        edf_plus_date(meta.start.date()),
        edf_plus_word(&meta.equipment)
    );
    if !meta.annotation.is_empty() {
        field.push(' ');
        field.push_str(&meta.annotation);
    }
    field
}

/// Convert a physical voltage value to a 16-bit digital value.
fn voltage_to_digital(voltage: f64, phys_min: f64, phys_max: f64) -> i16 {
    let dig_min = DIGITAL_MIN as f64;
    let dig_max = DIGITAL_MAX as f64;
    let scaled = dig_min + (voltage - phys_min) / (phys_max - phys_min) * (dig_max - dig_min);
    scaled.round().clamp(dig_min, dig_max) as i16
}

/// Build EDF+ TAL (Time-stamped Annotation List) bytes for a data record.
fn make_annotation_bytes(onset_seconds: usize, annotation_samples: usize) -> Vec<u8> {
    let tal = format!("+{}\x14\x14", onset_seconds);
    let mut bytes = tal.into_bytes();
    let total_bytes = annotation_samples * 2;
    bytes.resize(total_bytes, 0); // null-pad to fill annotation channel
    bytes
}

/// Format a floating point number for an EDF header field (max 8 chars).
fn format_edf_num(val: f64) -> String {
    // Try full precision, progressively reduce if too long
    for precision in (0..=6).rev() {
        let s = format!("{:.prec$}", val, prec = precision);
        if s.len() <= 8 {
            return s;
        }
    }
    format!("{:.0}", val)
}

/// Write the ECG signal as an EDF+ stream: header, then one-second records
/// of ECG samples followed by the annotation channel.
pub fn write_edf<W: Write>(
    out: &mut W,
    meta: &RecordingMetadata,
    channel: &EdfChannel,
    signal: &[f64],
) -> Result<()> {
    ensure!(channel.sample_rate > 0, "sample rate must be positive");

    // Digitize against the rounded values a reader finds in the header
    let phys_min_field = format_edf_num(channel.physical_min);
    let phys_max_field = format_edf_num(channel.physical_max);
    let phys_min: f64 = phys_min_field.parse()?;
    let phys_max: f64 = phys_max_field.parse()?;
    ensure!(
        phys_max > phys_min,
        "physical range [{}, {}] is empty",
        phys_min_field,
        phys_max_field
    );

    let samples_per_record = channel.sample_rate * RECORD_DURATION_SECS;
    let n_records = signal.len().div_ceil(samples_per_record);
    let n_signals: usize = 2; // EKG + Annotations
    let header_bytes = 256 + n_signals * 256;

    // === Main header (256 bytes) ===
    write_field(out, "0", 8)?; // version
    write_field(out, &patient_field(meta), 80)?;
    write_field(out, &recording_field(meta), 80)?;
    write_field(out, &meta.start.format("%d.%m.%y").to_string(), 8)?;
    write_field(out, &meta.start.format("%H.%M.%S").to_string(), 8)?;
    write_field(out, &header_bytes.to_string(), 8)?;
    write_field(out, "EDF+C", 44)?; // reserved (EDF+ continuous)
    write_field(out, &n_records.to_string(), 8)?;
    write_field(out, &RECORD_DURATION_SECS.to_string(), 8)?;
    write_field(out, &n_signals.to_string(), 4)?;

    // === Signal headers (interleaved: all labels, then all transducers, etc.) ===
    write_field(out, &channel.label, 16)?;
    write_field(out, "EDF Annotations", 16)?;

    write_field(out, &meta.transducer, 80)?;
    write_field(out, "", 80)?;

    write_field(out, &meta.physical_unit, 8)?;
    write_field(out, "", 8)?;

    write_field(out, &phys_min_field, 8)?;
    write_field(out, "-1", 8)?;

    write_field(out, &phys_max_field, 8)?;
    write_field(out, "1", 8)?;

    write_field(out, &DIGITAL_MIN.to_string(), 8)?;
    write_field(out, &DIGITAL_MIN.to_string(), 8)?;

    write_field(out, &DIGITAL_MAX.to_string(), 8)?;
    write_field(out, &DIGITAL_MAX.to_string(), 8)?;

    write_field(out, &meta.prefilter, 80)?;
    write_field(out, "", 80)?;

    write_field(out, &samples_per_record.to_string(), 8)?;
    write_field(out, &ANNOTATION_SAMPLES.to_string(), 8)?;

    write_field(out, "", 32)?;
    write_field(out, "", 32)?;

    // === Data records ===
    for rec in 0..n_records {
        let start = rec * samples_per_record;
        for idx in start..start + samples_per_record {
            // The last record is padded with 0 mV
            let phys_val = signal.get(idx).copied().unwrap_or(0.0);
            let dig_val = voltage_to_digital(phys_val, phys_min, phys_max);
            out.write_all(&dig_val.to_le_bytes())?;
        }

        let annotation_bytes =
            make_annotation_bytes(rec * RECORD_DURATION_SECS, ANNOTATION_SAMPLES);
        out.write_all(&annotation_bytes)?;
    }

    debug!(n_records, samples = signal.len(), "wrote EDF data records");
    Ok(())
}

/// Create `path` and write the recording to it.
pub fn write_edf_file(
    path: &Path,
    meta: &RecordingMetadata,
    channel: &EdfChannel,
    signal: &[f64],
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create EDF file: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_edf(&mut out, meta, channel, signal)?;
    out.flush()?;
    Ok(())
}
