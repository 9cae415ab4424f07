use tracing::warn;

use crate::baseline::Baseline;
use crate::pdf_extract::Point;

/// Per-row outcome of the reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub enum RowReport {
    Samples {
        row: usize,
        count: usize,
        x_start: f64,
        x_end: f64,
        min_mv: f64,
        max_mv: f64,
    },
    /// No waveform points were assigned to this row; it adds no samples.
    Empty { row: usize },
}

/// The reconstructed single-lead signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Voltages in millivolts, rows concatenated top to bottom.
    pub samples: Vec<f64>,
    pub rows: Vec<RowReport>,
}

impl Signal {
    /// Smallest and largest sample, or `None` for an empty signal.
    pub fn range(&self) -> Option<(f64, f64)> {
        min_max(&self.samples)
    }

    /// Data range widened outward by `margin` on each side.
    pub fn physical_range(&self, margin: f64) -> Option<(f64, f64)> {
        self.range().map(|(lo, hi)| (lo - margin, hi + margin))
    }

    pub fn duration_secs(&self, sample_rate: usize) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some((lo, hi))
}

/// Drop points whose x is within `tolerance` of the last kept point.
/// Removes the boundary vertex repeated where two strokes meet.
pub fn dedup_by_x(points: &[Point], tolerance: f64) -> Vec<Point> {
    let mut deduped: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if deduped.last().map_or(true, |last| (p.x - last.x).abs() > tolerance) {
            deduped.push(p);
        }
    }
    deduped
}

/// Convert (x, y) points to voltage values in millivolts.
///
/// In the top-left coordinate system, y increases downward,
/// so voltage = (baseline - y) / scale.
pub fn points_to_voltage(points: &[Point], baseline_y: f64, cal_pt_per_mv: f64) -> Vec<f64> {
    points
        .iter()
        .map(|p| (baseline_y - p.y) / cal_pt_per_mv)
        .collect()
}

/// Process all rows: deduplicate, convert to voltages, concatenate in row
/// order. Empty rows are skipped without inserting a gap.
pub fn reconstruct(
    rows: &[Vec<Point>],
    baselines: &[Baseline],
    cal_pt_per_mv: f64,
    x_tolerance: f64,
) -> Signal {
    let mut samples = Vec::new();
    let mut reports = Vec::with_capacity(baselines.len());

    for baseline in baselines {
        let row = baseline.row;
        let points = rows.get(row).map(Vec::as_slice).unwrap_or_default();
        let deduped = dedup_by_x(points, x_tolerance);

        let (Some(first), Some(last)) = (deduped.first(), deduped.last()) else {
            warn!(row, "no waveform data in row");
            reports.push(RowReport::Empty { row });
            continue;
        };

        let voltages = points_to_voltage(&deduped, baseline.y, cal_pt_per_mv);
        let (min_mv, max_mv) = min_max(&voltages).unwrap_or_default();
        reports.push(RowReport::Samples {
            row,
            count: voltages.len(),
            x_start: first.x,
            x_end: last.x,
            min_mv,
            max_mv,
        });
        samples.extend(voltages);
    }

    Signal {
        samples,
        rows: reports,
    }
}
