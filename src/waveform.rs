use tracing::{debug, trace};

use crate::baseline::Baseline;
use crate::classify::{classify, PrimitiveClass};
use crate::config::Config;
use crate::pdf_extract::{DrawingPrimitive, Point};

/// Waveform points per row, indexed by row; each row is sorted by x.
pub type RowPoints = Vec<Vec<Point>>;

/// Flatten the line commands of `primitive` into a polyline.
///
/// Consecutive segments usually share an endpoint, so a segment's start is
/// only kept when it differs from the last point by more than `tolerance`.
pub fn polyline_points(primitive: &DrawingPrimitive, tolerance: f64) -> Vec<Point> {
    let mut points: Vec<Point> = Vec::new();
    for (p1, p2) in primitive.lines() {
        if !points.last().is_some_and(|last| last.near(&p1, tolerance)) {
            points.push(p1);
        }
        points.push(p2);
    }
    points
}

/// Row whose baseline is nearest the mean y of `points`, if it is closer
/// than `max_distance`.
pub fn nearest_row(points: &[Point], baselines: &[Baseline], max_distance: f64) -> Option<usize> {
    if points.is_empty() {
        return None;
    }
    let y_center = points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64;

    let mut best: Option<(usize, f64)> = None;
    for (row, baseline) in baselines.iter().enumerate() {
        let dist = (y_center - baseline.y).abs();
        if best.map_or(true, |(_, min_dist)| dist < min_dist) {
            best = Some((row, dist));
        }
    }

    best.filter(|&(_, dist)| dist < max_distance)
        .map(|(row, _)| row)
}

/// Extract ECG waveform points grouped by row.
///
/// For a 1-lead PDF, the single lead is displayed across multiple rows,
/// each representing a consecutive time segment. Every waveform path is
/// assigned whole to one row; paths far from all baselines are dropped.
pub fn extract_waveform_rows(
    primitives: &[DrawingPrimitive],
    baselines: &[Baseline],
    config: &Config,
) -> RowPoints {
    let mut rows: RowPoints = vec![Vec::new(); baselines.len()];

    for primitive in primitives {
        if classify(primitive) != PrimitiveClass::Waveform {
            continue;
        }

        let points = polyline_points(primitive, config.endpoint_tolerance);
        match nearest_row(&points, baselines, config.max_row_distance) {
            Some(row) => {
                trace!(row, points = points.len(), "waveform path");
                rows[row].extend(points);
            }
            None => debug!(points = points.len(), "dropping waveform path far from baselines"),
        }
    }

    for points in &mut rows {
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
    }

    rows
}
