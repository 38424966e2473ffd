//! Lattice table extraction from PDF pages using lopdf
//!
//! The rest of the crate consumes extraction only through the
//! [`TableExtractor`] trait: an extraction area in top-down page units goes
//! in, a raw row/column table comes out. [`LatticeExtractor`] is the lopdf
//! implementation used by the CLI; tests substitute in-memory fakes.

use crate::ScheduleError;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// Extraction rectangle in top-down page units.
///
/// The refinement engine mutates a working copy of this between extraction
/// calls; the raw tables it produces are immutable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl Area {
    pub fn new(top: f32, left: f32, bottom: f32, right: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        y >= self.top && y <= self.bottom && x >= self.left && x <= self.right
    }
}

/// Raw table produced by one extraction call.
///
/// Rows are in reading order across all pages. The column count is a primary
/// correctness signal for area refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Widest row in the table.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Cells of one column, top to bottom. Rows too short to reach the
    /// column contribute an empty cell.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |r| r.get(col).map(String::as_str).unwrap_or(""))
    }
}

/// The extraction collaborator contract: one raw table per call, clipped to
/// the requested area.
pub trait TableExtractor {
    fn extract(&self, area: &Area) -> Result<RawTable, ScheduleError>;
}

/// A positioned text fragment on a page, in top-down coordinates.
#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    x: f32,
    y: f32,
}

/// Fallback page height when the MediaBox is missing (A4 in points).
const DEFAULT_PAGE_HEIGHT: f32 = 842.0;

/// Same-row Y tolerance and new-column X gap for grid clustering.
/// Lattice notices have generous cell padding, so these are fixed.
const ROW_TOLERANCE: f32 = 6.0;
const COLUMN_GAP: f32 = 15.0;

/// Lattice-style extractor backed by lopdf.
///
/// Loads the document once; every `extract` call walks all pages, clips the
/// positioned text fragments to the area, and clusters them into a grid.
/// Page tables are concatenated in document order.
pub struct LatticeExtractor {
    doc: Document,
}

impl LatticeExtractor {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScheduleError> {
        Ok(Self {
            doc: Document::load(path)?,
        })
    }

    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }
}

impl TableExtractor for LatticeExtractor {
    fn extract(&self, area: &Area) -> Result<RawTable, ScheduleError> {
        let pages = self.doc.get_pages();
        let mut rows = Vec::new();

        for (_, &page_id) in pages.iter() {
            let height = page_height(&self.doc, page_id);
            let fragments: Vec<Fragment> = page_fragments(&self.doc, page_id, height)?
                .into_iter()
                .filter(|f| area.contains(f.x, f.y))
                .collect();
            rows.extend(build_grid(fragments));
        }

        Ok(RawTable::new(rows))
    }
}

/// Page height from the MediaBox, for flipping PDF bottom-left coordinates
/// into top-down page units.
fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|dict| dict.get(b"MediaBox").ok())
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| arr.get(3))
        .and_then(|obj| match obj {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .unwrap_or(DEFAULT_PAGE_HEIGHT)
}

/// Multiply two 2D transformation matrices in `[a, b, c, d, e, f]` form.
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Walk a page's content stream and collect positioned text fragments.
///
/// Tracks just enough graphics/text state for tabular notices: the CTM
/// stack, the text and line matrices, and the current font for decoding.
fn page_fragments(
    doc: &Document,
    page_id: ObjectId,
    page_height: f32,
) -> Result<Vec<Fragment>, ScheduleError> {
    use lopdf::content::Content;

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| ScheduleError::Parse(e.to_string()))?;
    let content =
        Content::decode(&content_data).map_err(|e| ScheduleError::Parse(e.to_string()))?;

    let mut fragments = Vec::new();

    let mut ctm = IDENTITY;
    let mut ctm_stack: Vec<[f32; 6]> = Vec::new();
    let mut text_matrix = IDENTITY;
    let mut line_matrix = IDENTITY;
    let mut current_font = String::new();
    let mut font_size: f32 = 12.0;
    let mut in_text = false;

    let mut emit = |text: String, text_matrix: &[f32; 6], ctm: &[f32; 6]| {
        if text.trim().is_empty() {
            return;
        }
        let combined = multiply_matrices(text_matrix, ctm);
        fragments.push(Fragment {
            text,
            x: combined[4],
            y: page_height - combined[5],
        });
    };

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let m = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    ctm = multiply_matrices(&m, &ctm);
                }
            }
            "BT" => {
                in_text = true;
                text_matrix = IDENTITY;
                line_matrix = IDENTITY;
            }
            "ET" => in_text = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        current_font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        font_size = size;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    line_matrix[4] += get_number(&op.operands[0]).unwrap_or(0.0);
                    line_matrix[5] += get_number(&op.operands[1]).unwrap_or(0.0);
                    text_matrix = line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        text_matrix[i] = get_number(operand).unwrap_or(IDENTITY[i]);
                    }
                    line_matrix = text_matrix;
                }
            }
            "T*" => {
                line_matrix[5] -= font_size * 1.2;
                text_matrix = line_matrix;
            }
            "Tj" => {
                if in_text && !op.operands.is_empty() {
                    if let Some(text) = decode_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        emit(text, &text_matrix, &ctm);
                    }
                }
            }
            "TJ" => {
                if in_text && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let mut combined = String::new();
                        for item in array {
                            if let Some(text) = decode_operand(item, doc, &fonts, &current_font) {
                                combined.push_str(&text);
                            }
                        }
                        emit(combined, &text_matrix, &ctm);
                    }
                }
            }
            "'" => {
                line_matrix[5] -= font_size * 1.2;
                text_matrix = line_matrix;
                if !op.operands.is_empty() {
                    if let Some(text) = decode_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        emit(text, &text_matrix, &ctm);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(fragments)
}

/// Decode a string operand using the current font's encoding, with UTF-16BE
/// and Latin-1 fallbacks.
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

/// Cluster clipped fragments into a row/column grid.
///
/// Column centers are computed over the whole clipped region so every row
/// lands on the same grid; multiple fragments in one cell are joined with a
/// carriage return so the cleaning stage can explode them back out.
fn build_grid(mut fragments: Vec<Fragment>) -> Vec<Vec<String>> {
    if fragments.is_empty() {
        return Vec::new();
    }

    let columns = column_centers(&fragments);
    if columns.is_empty() {
        return Vec::new();
    }

    fragments.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    // Group into row clusters top to bottom.
    let mut rows: Vec<Vec<Fragment>> = Vec::new();
    for fragment in fragments {
        let same_row = rows
            .last()
            .and_then(|r| r.last())
            .map(|prev| (fragment.y - prev.y).abs() < ROW_TOLERANCE)
            .unwrap_or(false);
        if same_row {
            if let Some(row) = rows.last_mut() {
                row.push(fragment);
            }
        } else {
            rows.push(vec![fragment]);
        }
    }

    // Assign each fragment to its nearest column center.
    let mut grid = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = vec![String::new(); columns.len()];
        for fragment in row {
            let col = nearest_column(&columns, fragment.x);
            if !cells[col].is_empty() {
                cells[col].push('\r');
            }
            cells[col].push_str(&fragment.text);
        }
        grid.push(cells);
    }

    grid
}

/// Column cluster centers across the whole clipped region, left to right.
fn column_centers(fragments: &[Fragment]) -> Vec<f32> {
    let mut xs: Vec<f32> = fragments.iter().map(|f| f.x).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut centers = Vec::new();
    let mut cluster: Vec<f32> = vec![xs[0]];

    for &x in &xs[1..] {
        let center = cluster.iter().sum::<f32>() / cluster.len() as f32;
        if x - center > COLUMN_GAP {
            centers.push(center);
            cluster = vec![x];
        } else {
            cluster.push(x);
        }
    }
    centers.push(cluster.iter().sum::<f32>() / cluster.len() as f32);

    centers
}

fn nearest_column(columns: &[f32], x: f32) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, &col) in columns.iter().enumerate() {
        let dist = (x - col).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f32, y: f32) -> Fragment {
        Fragment {
            text: text.into(),
            x,
            y,
        }
    }

    #[test]
    fn test_grid_clustering() {
        let fragments = vec![
            frag("Date", 100.0, 50.0),
            frag("Street", 200.0, 50.0),
            frag("01;January", 100.0, 70.0),
            frag("3", 200.0, 70.5),
        ];

        let grid = build_grid(fragments);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec!["Date".to_string(), "Street".to_string()]);
        assert_eq!(grid[1], vec!["01;January".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_grid_joins_stacked_cell_fragments() {
        // Two fragments in the same row cluster and column become one cell
        // with an embedded carriage return.
        let fragments = vec![frag("6:30am", 100.0, 50.0), frag("7:00am", 100.0, 54.0)];

        let grid = build_grid(fragments);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0], vec!["6:30am\r7:00am".to_string()]);
    }

    #[test]
    fn test_column_count_ragged_rows() {
        let table = RawTable::new(vec![
            vec!["a".into()],
            vec!["b".into(), "c".into(), "d".into()],
        ]);
        assert_eq!(table.column_count(), 3);
        let first: Vec<&str> = table.column(0).collect();
        assert_eq!(first, vec!["a", "b"]);
        let last: Vec<&str> = table.column(2).collect();
        assert_eq!(last, vec!["", "d"]);
    }

    #[test]
    fn test_area_contains() {
        let area = Area::new(40.0, 100.0, 920.0, 300.0);
        assert!(area.contains(150.0, 500.0));
        assert!(!area.contains(350.0, 500.0));
        assert!(!area.contains(150.0, 30.0));
    }
}
