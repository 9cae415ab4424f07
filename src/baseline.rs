use tracing::{debug, warn};

use crate::classify::{classify, PrimitiveClass};
use crate::config::Config;
use crate::error::ConvertError;
use crate::pdf_extract::DrawingPrimitive;

/// Zero-voltage level of one chart row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Row index, 0 at the top of the page.
    pub row: usize,
    /// Page y-coordinate of the row center.
    pub y: f64,
}

/// y-coordinates of the long horizontal lines in `primitive` that lie in
/// the visible page area, in drawing order.
fn visible_rules(primitive: &DrawingPrimitive, config: &Config) -> Vec<f64> {
    primitive
        .lines()
        .filter(|(p1, p2)| {
            (p1.y - p2.y).abs() < config.horizontal_tolerance
                && (p2.x - p1.x).abs() > config.baseline_min_span
        })
        .map(|(p1, _)| p1.y)
        .filter(|&y| y < config.visible_y_cutoff)
        .collect()
}

/// Find the baseline of each row from the horizontal grid lines.
///
/// The 1-lead PDF displays the single lead across several rows on one page,
/// each with a horizontal baseline at its center. The first baseline-class
/// path holding enough full-width rules wins; its first
/// `config.baseline_count` rules become rows 0.. in drawing order.
pub fn locate_baselines(
    primitives: &[DrawingPrimitive],
    config: &Config,
) -> Result<Vec<Baseline>, ConvertError> {
    let expected = config.baseline_count;
    let mut found = 0;

    for primitive in primitives {
        if classify(primitive) != PrimitiveClass::Baseline {
            continue;
        }

        let rules = visible_rules(primitive, config);
        debug!(rules = rules.len(), "baseline candidate path");
        if rules.len() >= expected {
            let baselines: Vec<Baseline> = rules
                .into_iter()
                .take(expected)
                .enumerate()
                .map(|(row, y)| Baseline { row, y })
                .collect();

            if baselines.windows(2).any(|w| w[0].y >= w[1].y) {
                warn!("baselines are not ordered top to bottom");
            }
            return Ok(baselines);
        }
        found = found.max(rules.len());
    }

    Err(ConvertError::BaselineNotFound { found, expected })
}
