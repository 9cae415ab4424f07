use anyhow::{anyhow, Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::path::Path;
use tracing::debug;

use crate::error::ConvertError;

/// Stroke color as (r, g, b), each channel in 0.0..=1.0.
pub type Rgb = (f64, f64, f64);

pub const BLACK: Rgb = (0.0, 0.0, 0.0);

/// A 2D point in top-left-origin page coordinates (y increases downward).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True when both coordinates are within `tolerance` of `other`.
    pub fn near(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// One path-construction command, already transformed to page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Straight segment from the first point to the second.
    Line(Point, Point),
    /// Cubic Bézier: start, two control points, end.
    Curve(Point, Point, Point, Point),
    /// Rectangle corners in drawing order.
    Rect([Point; 4]),
}

/// A painted path from the page content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingPrimitive {
    /// Stroke color, or `None` for fill-only paths.
    pub stroke_color: Option<Rgb>,
    /// Stroke width in PDF user units, or `None` for fill-only paths.
    pub stroke_width: Option<f64>,
    pub commands: Vec<DrawCommand>,
}

impl DrawingPrimitive {
    /// Iterate over the endpoints of every `Line` command, in order.
    pub fn lines(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Line(p1, p2) => Some((*p1, *p2)),
            _ => None,
        })
    }
}

/// Graphics state tracked during content stream parsing.
#[derive(Clone)]
struct GraphicsState {
    /// Current transformation matrix [a, b, c, d, e, f].
    ctm: [f64; 6],
    stroke_color: Rgb,
    line_width: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            stroke_color: BLACK,
            line_width: 1.0,
        }
    }
}

/// Multiply two 2D affine transformation matrices.
/// Each matrix is [a, b, c, d, e, f] representing:
///   | a c e |
///   | b d f |
///   | 0 0 1 |
/// Result = m1 * m2 (m2 applied first, then m1).
fn multiply_ctm(m1: &[f64; 6], m2: &[f64; 6]) -> [f64; 6] {
    [
        m1[0] * m2[0] + m1[2] * m2[1],
        m1[1] * m2[0] + m1[3] * m2[1],
        m1[0] * m2[2] + m1[2] * m2[3],
        m1[1] * m2[2] + m1[3] * m2[3],
        m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
        m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
    ]
}

/// Transform a raw PDF coordinate through the CTM, then flip y to top-left origin.
fn transform_point(x: f64, y: f64, ctm: &[f64; 6], page_height: f64) -> Point {
    let x_pdf = ctm[0] * x + ctm[2] * y + ctm[4];
    let y_pdf = ctm[1] * x + ctm[3] * y + ctm[5];
    Point::new(x_pdf, page_height - y_pdf)
}

fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> Rgb {
    ((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

/// Map a stroke color operator and its operands to RGB.
fn stroke_color(operator: &str, values: &[f64]) -> Option<Rgb> {
    match (operator, values) {
        ("G" | "SC" | "SCN", &[v]) => Some((v, v, v)),
        ("RG" | "SC" | "SCN", &[r, g, b]) => Some((r, g, b)),
        ("K" | "SC" | "SCN", &[c, m, y, k]) => Some(cmyk_to_rgb(c, m, y, k)),
        _ => None,
    }
}

/// Extract a numeric value from a lopdf Object.
fn obj_f64(obj: &Object) -> Result<f64> {
    match obj {
        Object::Real(f) => Ok(*f as f64),
        Object::Integer(i) => Ok(*i as f64),
        _ => Err(anyhow!("Expected number, got {:?}", obj)),
    }
}

/// Read all operands of `op` as numbers.
fn operands_f64(op: &Operation) -> Result<Vec<f64>> {
    op.operands.iter().map(obj_f64).collect()
}

/// Dereference an Object if it's a Reference, otherwise return as-is.
fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).map_err(|e| anyhow!("{}", e)),
        _ => Ok(obj),
    }
}

/// Get the page height from the MediaBox (checking page dict, then parent).
pub fn get_page_height(doc: &Document, page_id: ObjectId) -> Result<f64> {
    get_page_height_inner(doc, page_id, 0)
}

fn get_page_height_inner(doc: &Document, obj_id: ObjectId, depth: usize) -> Result<f64> {
    if depth > 10 {
        return Ok(792.0); // default US Letter
    }
    let obj = doc.get_object(obj_id)?;
    let dict = obj.as_dict().map_err(|e| anyhow!("{}", e))?;

    if let Ok(mb) = dict.get(b"MediaBox") {
        if let Object::Array(arr) = deref(doc, mb)? {
            if arr.len() == 4 {
                return obj_f64(&arr[3]);
            }
        }
    }

    if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
        return get_page_height_inner(doc, *parent_id, depth + 1);
    }

    Ok(792.0)
}

/// Load the PDF at `path` and return the painted paths of the page at
/// zero-based `page_index`.
pub fn load_page_primitives(path: &Path, page_index: usize) -> Result<Vec<DrawingPrimitive>> {
    let doc = Document::load(path)
        .with_context(|| format!("Failed to open PDF: {}", path.display()))?;

    let page_number = page_index as u32 + 1;
    let pages = doc.get_pages();
    let &page_id = pages
        .get(&page_number)
        .ok_or(ConvertError::PageNotFound(page_number))?;

    let page_height = get_page_height(&doc, page_id)?;
    debug!(page_number, page_height, "reading page content");

    extract_paths(&doc, page_id, page_height)
        .with_context(|| format!("Failed to read page {} content", page_number))
}

/// Extract all painted drawing paths from a PDF page's content stream.
pub fn extract_paths(
    doc: &Document,
    page_id: ObjectId,
    page_height: f64,
) -> Result<Vec<DrawingPrimitive>> {
    let content_bytes = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_bytes).map_err(|e| anyhow!("{}", e))?;
    primitives_from_operations(&content.operations, page_height)
}

/// Path under construction between painting operators.
#[derive(Default)]
struct PathBuilder {
    commands: Vec<DrawCommand>,
    current: Point,
    subpath_start: Point,
}

impl PathBuilder {
    fn move_to(&mut self, p: Point) {
        self.current = p;
        self.subpath_start = p;
    }

    fn line_to(&mut self, p: Point) {
        self.commands.push(DrawCommand::Line(self.current, p));
        self.current = p;
    }

    fn curve_to(&mut self, c1: Point, c2: Point, end: Point) {
        self.commands.push(DrawCommand::Curve(self.current, c1, c2, end));
        self.current = end;
    }

    fn close(&mut self) {
        if !self.current.near(&self.subpath_start, 0.001) {
            self.commands.push(DrawCommand::Line(self.current, self.subpath_start));
        }
        self.current = self.subpath_start;
    }

    /// Hand the collected commands to a new primitive, if there are any.
    fn finish(&mut self, stroke: Option<&GraphicsState>, paths: &mut Vec<DrawingPrimitive>) {
        if self.commands.is_empty() {
            return;
        }
        paths.push(DrawingPrimitive {
            stroke_color: stroke.map(|s| s.stroke_color),
            stroke_width: stroke.map(|s| s.line_width),
            commands: std::mem::take(&mut self.commands),
        });
    }
}

/// Walk content stream operations and collect every painted path.
pub fn primitives_from_operations(
    ops: &[Operation],
    page_height: f64,
) -> Result<Vec<DrawingPrimitive>> {
    let mut paths = Vec::new();
    let mut state = GraphicsState::default();
    let mut state_stack: Vec<GraphicsState> = Vec::new();
    let mut path = PathBuilder::default();
    let pt = |x: f64, y: f64, state: &GraphicsState| {
        transform_point(x, y, &state.ctm, page_height)
    };

    for op in ops {
        match op.operator.as_str() {
            "q" => state_stack.push(state.clone()),
            "Q" => {
                if let Some(s) = state_stack.pop() {
                    state = s;
                }
            }

            "cm" => {
                if let [a, b, c, d, e, f] = operands_f64(op)?[..] {
                    state.ctm = multiply_ctm(&state.ctm, &[a, b, c, d, e, f]);
                }
            }

            "w" => {
                if let Some(w) = op.operands.first() {
                    state.line_width = obj_f64(w)?;
                }
            }

            // Pattern colors carry a name operand and have no RGB equivalent
            "RG" | "G" | "K" | "SC" | "SCN" => {
                if let Ok(values) = operands_f64(op) {
                    if let Some(color) = stroke_color(&op.operator, &values) {
                        state.stroke_color = color;
                    }
                }
            }

            "m" => {
                if let [x, y] = operands_f64(op)?[..] {
                    path.move_to(pt(x, y, &state));
                }
            }

            "l" => {
                if let [x, y] = operands_f64(op)?[..] {
                    path.line_to(pt(x, y, &state));
                }
            }

            "c" => {
                if let [x1, y1, x2, y2, x3, y3] = operands_f64(op)?[..] {
                    path.curve_to(pt(x1, y1, &state), pt(x2, y2, &state), pt(x3, y3, &state));
                }
            }

            // First control point coincides with the current point
            "v" => {
                if let [x2, y2, x3, y3] = operands_f64(op)?[..] {
                    let start = path.current;
                    path.curve_to(start, pt(x2, y2, &state), pt(x3, y3, &state));
                }
            }

            // Second control point coincides with the end point
            "y" => {
                if let [x1, y1, x3, y3] = operands_f64(op)?[..] {
                    let end = pt(x3, y3, &state);
                    path.curve_to(pt(x1, y1, &state), end, end);
                }
            }

            "h" => path.close(),

            "re" => {
                if let [rx, ry, rw, rh] = operands_f64(op)?[..] {
                    let corners = [
                        pt(rx, ry, &state),
                        pt(rx + rw, ry, &state),
                        pt(rx + rw, ry + rh, &state),
                        pt(rx, ry + rh, &state),
                    ];
                    path.commands.push(DrawCommand::Rect(corners));
                    path.move_to(corners[0]);
                }
            }

            "S" | "B" | "B*" => path.finish(Some(&state), &mut paths),

            "s" | "b" | "b*" => {
                path.close();
                path.finish(Some(&state), &mut paths);
            }

            // Fill only: no stroke style
            "f" | "F" | "f*" => path.finish(None, &mut paths),

            "n" => path.commands.clear(),

            _ => {}
        }
    }

    debug!(count = paths.len(), "extracted drawing paths");
    Ok(paths)
}

/// Save a PDF whose pages draw `pages` in order. The page tree carries a
/// 612x800 MediaBox; the first page overrides it with 612x500.
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, pages: &[Vec<Operation>]) -> Result<()> {
    use lopdf::{dictionary, Stream};

    let media_box = |height: i64| {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(height),
        ])
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for (i, ops) in pages.iter().enumerate() {
        let content = Content {
            operations: ops.clone(),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if i == 0 {
            page.set("MediaBox", media_box(500));
        }
        kids.push(doc.add_object(page).into());
    }

    let count = kids.len() as i64;
    let page_tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => media_box(800),
    };
    doc.objects.insert(pages_id, Object::Dictionary(page_tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn int(v: i64) -> Object {
        Object::Integer(v)
    }

    #[test]
    fn stroked_line_is_flipped_to_top_left_origin() {
        let ops = vec![
            op("m", vec![int(10), int(700)]),
            op("l", vec![int(600), int(700)]),
            op("S", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 792.0).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].commands,
            vec![DrawCommand::Line(Point::new(10.0, 92.0), Point::new(600.0, 92.0))]
        );
        assert_eq!(paths[0].stroke_color, Some(BLACK));
        assert_eq!(paths[0].stroke_width, Some(1.0));
    }

    #[test]
    fn screen_space_matrix_keeps_coordinates() {
        let ops = vec![
            op("q", vec![]),
            op("cm", vec![int(1), int(0), int(0), int(-1), int(0), int(792)]),
            op("m", vec![int(5), int(100)]),
            op("l", vec![int(15), int(120)]),
            op("S", vec![]),
            op("Q", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 792.0).unwrap();
        assert_eq!(
            paths[0].commands,
            vec![DrawCommand::Line(Point::new(5.0, 100.0), Point::new(15.0, 120.0))]
        );
    }

    #[test]
    fn width_and_color_restore_after_q() {
        let ops = vec![
            op("q", vec![]),
            op("w", vec![Object::Real(0.4)]),
            op("RG", vec![Object::Real(0.5), int(0), int(0)]),
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(1), int(1)]),
            op("S", vec![]),
            op("Q", vec![]),
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(1), int(1)]),
            op("S", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 792.0).unwrap();
        assert_eq!(paths.len(), 2);
        let w = paths[0].stroke_width.unwrap();
        assert!((w - 0.4).abs() < 1e-6);
        let (r, g, b) = paths[0].stroke_color.unwrap();
        assert!((r - 0.5).abs() < 1e-6 && g == 0.0 && b == 0.0);
        assert_eq!(paths[1].stroke_width, Some(1.0));
        assert_eq!(paths[1].stroke_color, Some(BLACK));
    }

    #[test]
    fn gray_and_cmyk_colors_convert_to_rgb() {
        let ops = vec![
            op("G", vec![int(1)]),
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(1), int(1)]),
            op("S", vec![]),
            op("K", vec![int(0), int(0), int(0), int(1)]),
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(1), int(1)]),
            op("S", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 792.0).unwrap();
        assert_eq!(paths[0].stroke_color, Some((1.0, 1.0, 1.0)));
        assert_eq!(paths[1].stroke_color, Some(BLACK));
    }

    #[test]
    fn fill_only_path_has_no_stroke_style() {
        let ops = vec![
            op("re", vec![int(0), int(0), int(10), int(10)]),
            op("f", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 100.0).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].stroke_color, None);
        assert_eq!(paths[0].stroke_width, None);
        assert!(matches!(paths[0].commands[0], DrawCommand::Rect(_)));
        assert_eq!(paths[0].lines().count(), 0);
    }

    #[test]
    fn close_adds_segment_back_to_start() {
        let ops = vec![
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(10), int(0)]),
            op("l", vec![int(10), int(10)]),
            op("s", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 0.0).unwrap();
        let lines: Vec<_> = paths[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], (Point::new(10.0, -10.0), Point::new(0.0, 0.0)));
    }

    #[test]
    fn curves_are_kept_but_not_lines() {
        let ops = vec![
            op("m", vec![int(0), int(0)]),
            op("c", vec![int(1), int(1), int(2), int(1), int(3), int(0)]),
            op("v", vec![int(4), int(1), int(5), int(0)]),
            op("S", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 0.0).unwrap();
        assert_eq!(paths[0].commands.len(), 2);
        assert_eq!(paths[0].lines().count(), 0);
        match paths[0].commands[1] {
            DrawCommand::Curve(start, c1, _, end) => {
                assert_eq!(start, Point::new(3.0, 0.0));
                assert_eq!(c1, start);
                assert_eq!(end, Point::new(5.0, 0.0));
            }
            ref other => panic!("expected curve, got {:?}", other),
        }
    }

    #[test]
    fn pattern_color_is_ignored() {
        let ops = vec![
            op("RG", vec![int(1), int(0), int(0)]),
            op("SCN", vec![Object::Name(b"P0".to_vec())]),
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(1), int(1)]),
            op("S", vec![]),
        ];
        let paths = primitives_from_operations(&ops, 0.0).unwrap();
        assert_eq!(paths[0].stroke_color, Some((1.0, 0.0, 0.0)));
    }

    #[test]
    fn end_path_without_painting_is_discarded() {
        let ops = vec![
            op("m", vec![int(0), int(0)]),
            op("l", vec![int(10), int(0)]),
            op("n", vec![]),
            op("S", vec![]),
        ];
        assert!(primitives_from_operations(&ops, 0.0).unwrap().is_empty());
    }

    #[test]
    fn non_numeric_operand_is_an_error() {
        let ops = vec![op("w", vec![Object::Name(b"bad".to_vec())])];
        assert!(primitives_from_operations(&ops, 0.0).is_err());
    }

    fn horizontal_rule(y: i64) -> Vec<Operation> {
        vec![
            op("m", vec![int(10), int(y)]),
            op("l", vec![int(600), int(y)]),
            op("S", vec![]),
        ]
    }

    #[test]
    fn page_height_comes_from_own_or_inherited_media_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.pdf");
        write_test_pdf(&path, &[horizontal_rule(100), horizontal_rule(700)]).unwrap();

        let doc = Document::load(&path).unwrap();
        let pages = doc.get_pages();
        assert_eq!(get_page_height(&doc, pages[&1]).unwrap(), 500.0);
        assert_eq!(get_page_height(&doc, pages[&2]).unwrap(), 800.0);
    }

    #[test]
    fn loads_second_page_by_zero_based_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.pdf");
        write_test_pdf(&path, &[horizontal_rule(100), horizontal_rule(700)]).unwrap();

        let paths = load_page_primitives(&path, 1).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].commands,
            vec![DrawCommand::Line(Point::new(10.0, 100.0), Point::new(600.0, 100.0))]
        );
    }

    #[test]
    fn missing_page_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.pdf");
        write_test_pdf(&path, &[horizontal_rule(100), horizontal_rule(700)]).unwrap();

        let err = load_page_primitives(&path, 5).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConvertError>(),
            Some(&ConvertError::PageNotFound(6))
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pdf");
        let err = load_page_primitives(&path, 1).unwrap_err();
        assert!(err.to_string().contains("Failed to open PDF"));
    }
}
