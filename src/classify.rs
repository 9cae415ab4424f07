use crate::pdf_extract::{DrawingPrimitive, BLACK};

/// Stroke width bounds (exclusive) shared by the grid and the trace.
/// The default-weight page frame falls outside them.
pub const STROKE_WIDTH_MIN: f64 = 0.35;
pub const STROKE_WIDTH_MAX: f64 = 0.45;

/// The baseline grid path has at least this many draw commands.
pub const BASELINE_MIN_COMMANDS: usize = 4;

/// ECG trace paths are dense polylines with at least this many commands.
pub const WAVEFORM_MIN_COMMANDS: usize = 40;

/// What a drawing primitive represents on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveClass {
    /// The thin black path carrying the row baselines.
    Baseline,
    /// A segment of the drawn ECG trace.
    Waveform,
    /// Frame, text decoration, fills and everything else.
    Ignored,
}

fn has_trace_width(primitive: &DrawingPrimitive) -> bool {
    primitive
        .stroke_width
        .is_some_and(|w| STROKE_WIDTH_MIN < w && w < STROKE_WIDTH_MAX)
}

/// Classify a primitive by its stroke color, stroke width and command count.
///
/// Grid paths in the Kardia export are stroked in pure black, while the
/// trace is rendered in a different color, so the two rules are told apart
/// by color alone. A path without a stroke color is not black.
pub fn classify(primitive: &DrawingPrimitive) -> PrimitiveClass {
    if !has_trace_width(primitive) {
        return PrimitiveClass::Ignored;
    }

    let n = primitive.commands.len();
    let is_black = primitive.stroke_color == Some(BLACK);

    if is_black {
        if n >= BASELINE_MIN_COMMANDS {
            return PrimitiveClass::Baseline;
        }
    } else if n >= WAVEFORM_MIN_COMMANDS && n != 1 {
        return PrimitiveClass::Waveform;
    }

    PrimitiveClass::Ignored
}
