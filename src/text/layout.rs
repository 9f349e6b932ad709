//! Reading-order reconstruction for a single page
//!
//! The text layer of a PDF page yields positioned fragments in content-stream
//! order, which is rarely the order a person reads them. Fragments are grouped
//! into visual lines by baseline Y, lines are emitted top to bottom, and the
//! fragments of each line left to right.
//!
//! Coordinates follow the PDF convention: origin at the bottom-left of the
//! page, Y increasing upward. A larger Y is therefore higher on the page.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Maximum baseline distance for two fragments to share a line
pub const Y_TOLERANCE: f64 = 5.0;

/// A positioned run of text emitted by the text layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFragment {
    pub text: String,
    pub baseline_x: f64,
    pub baseline_y: f64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, baseline_x: f64, baseline_y: f64) -> Self {
        Self {
            text: text.into(),
            baseline_x,
            baseline_y,
        }
    }
}

/// Fragments assigned to one visual line
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    /// Representative baseline of the line
    pub y: f64,
    /// Fragments ordered left to right
    pub fragments: Vec<TextFragment>,
}

impl LineGroup {
    /// Fragment texts joined by a single space
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How fragments are clustered into lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineGrouping {
    /// A line is keyed by the Y of the first fragment that opened it and the
    /// key never moves. Output can depend on processing order when fragments
    /// drift across more than one tolerance.
    #[default]
    Anchored,
    /// Fragments are sorted by Y and split wherever the gap between
    /// neighbours exceeds the tolerance. Independent of input order.
    #[serde(rename = "gap")]
    GapSplit,
}

/// Page-local text layout reconstructor
#[derive(Debug, Clone, Copy)]
pub struct ReadingOrder {
    tolerance: f64,
    grouping: LineGrouping,
}

impl Default for ReadingOrder {
    fn default() -> Self {
        Self {
            tolerance: Y_TOLERANCE,
            grouping: LineGrouping::Anchored,
        }
    }
}

impl ReadingOrder {
    pub fn new(grouping: LineGrouping) -> Self {
        Self {
            grouping,
            ..Default::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn grouping(&self) -> LineGrouping {
        self.grouping
    }

    /// Reconstruct the page text: lines top to bottom joined by `\n`
    pub fn reconstruct(&self, fragments: &[TextFragment]) -> String {
        self.group_lines(fragments)
            .iter()
            .map(LineGroup::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Group fragments into lines, ordered top to bottom
    pub fn group_lines(&self, fragments: &[TextFragment]) -> Vec<LineGroup> {
        let usable: Vec<TextFragment> = fragments.iter().filter_map(normalize).collect();

        let mut lines = match self.grouping {
            LineGrouping::Anchored => self.group_anchored(usable),
            LineGrouping::GapSplit => self.group_by_gaps(usable),
        };

        for line in &mut lines {
            // Stable: equal X keeps processing order
            line.fragments
                .sort_by(|a, b| a.baseline_x.total_cmp(&b.baseline_x));
        }

        lines
    }

    fn group_anchored(&self, fragments: Vec<TextFragment>) -> Vec<LineGroup> {
        let mut buckets: BTreeMap<OrderedFloat<f64>, Vec<TextFragment>> = BTreeMap::new();

        for fragment in fragments {
            let y = fragment.baseline_y;
            // Buckets are scanned in ascending Y; the lowest match wins
            let key = buckets
                .keys()
                .copied()
                .find(|anchor| (anchor.0 - y).abs() <= self.tolerance)
                .unwrap_or(OrderedFloat(y));
            buckets.entry(key).or_default().push(fragment);
        }

        buckets
            .into_iter()
            .rev()
            .map(|(y, fragments)| LineGroup { y: y.0, fragments })
            .collect()
    }

    fn group_by_gaps(&self, mut fragments: Vec<TextFragment>) -> Vec<LineGroup> {
        fragments.sort_by(|a, b| b.baseline_y.total_cmp(&a.baseline_y));

        let mut lines: Vec<LineGroup> = Vec::new();
        let mut previous_y: Option<f64> = None;

        for fragment in fragments {
            let y = fragment.baseline_y;
            match (previous_y, lines.last_mut()) {
                (Some(prev), Some(line)) if prev - y <= self.tolerance => {
                    line.fragments.push(fragment);
                }
                _ => lines.push(LineGroup {
                    y,
                    fragments: vec![fragment],
                }),
            }
            previous_y = Some(y);
        }

        lines
    }
}

/// Reconstruct page text with the default tolerance and anchored grouping
pub fn reconstruct_page_text(fragments: &[TextFragment]) -> String {
    ReadingOrder::default().reconstruct(fragments)
}

/// Drop empty or unpositioned fragments and flatten embedded newlines
fn normalize(fragment: &TextFragment) -> Option<TextFragment> {
    if fragment.text.trim().is_empty() {
        return None;
    }
    if !fragment.baseline_x.is_finite() || !fragment.baseline_y.is_finite() {
        return None;
    }

    Some(TextFragment {
        text: fragment.text.replace(['\r', '\n'], " "),
        baseline_x: fragment.baseline_x,
        baseline_y: fragment.baseline_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f64, y: f64) -> TextFragment {
        TextFragment::new(text, x, y)
    }

    #[test]
    fn test_same_line_sorted_left_to_right() {
        let fragments = vec![frag("World", 50.0, 100.0), frag("Hello", 0.0, 100.0)];
        assert_eq!(reconstruct_page_text(&fragments), "Hello World");
    }

    #[test]
    fn test_lines_top_to_bottom() {
        let fragments = vec![frag("Line1", 0.0, 200.0), frag("Line2", 0.0, 100.0)];
        assert_eq!(reconstruct_page_text(&fragments), "Line1\nLine2");

        let reversed = vec![frag("Line2", 0.0, 100.0), frag("Line1", 0.0, 200.0)];
        assert_eq!(reconstruct_page_text(&reversed), "Line1\nLine2");
    }

    #[test]
    fn test_tolerance_boundary() {
        let merged = vec![frag("a", 0.0, 100.0), frag("b", 10.0, 104.0)];
        assert_eq!(reconstruct_page_text(&merged), "a b");

        let at_limit = vec![frag("a", 0.0, 100.0), frag("b", 10.0, 105.0)];
        assert_eq!(reconstruct_page_text(&at_limit), "a b");

        let split = vec![frag("a", 0.0, 100.0), frag("b", 10.0, 106.0)];
        assert_eq!(reconstruct_page_text(&split), "b\na");
    }

    #[test]
    fn test_whitespace_fragments_discarded() {
        let fragments = vec![frag("   ", 0.0, 0.0), frag("Hi", 0.0, 0.0)];
        assert_eq!(reconstruct_page_text(&fragments), "Hi");
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(reconstruct_page_text(&[]), "");
        assert_eq!(reconstruct_page_text(&[frag("\n", 0.0, 0.0)]), "");
    }

    #[test]
    fn test_embedded_newlines_become_spaces() {
        let fragments = vec![frag("two\nparts", 0.0, 10.0)];
        assert_eq!(reconstruct_page_text(&fragments), "two parts");
    }

    #[test]
    fn test_unpositioned_fragments_skipped() {
        let fragments = vec![frag("ghost", f64::NAN, 10.0), frag("real", 0.0, 10.0)];
        assert_eq!(reconstruct_page_text(&fragments), "real");
    }

    #[test]
    fn test_equal_x_keeps_input_order() {
        let fragments = vec![frag("first", 5.0, 50.0), frag("second", 5.0, 50.0)];
        assert_eq!(reconstruct_page_text(&fragments), "first second");

        let swapped = vec![frag("second", 5.0, 50.0), frag("first", 5.0, 50.0)];
        assert_eq!(reconstruct_page_text(&swapped), "second first");
    }

    #[test]
    fn test_permutations_agree_on_separated_lines() {
        let fragments = vec![
            frag("c", 30.0, 300.0),
            frag("a", 0.0, 300.0),
            frag("b", 15.0, 302.0),
            frag("z", 0.0, 150.0),
            frag("y", 40.0, 148.0),
        ];
        let expected = "a b c\nz y";

        let mut reversed = fragments.clone();
        reversed.reverse();
        let mut rotated = fragments.clone();
        rotated.rotate_left(2);

        for order in [LineGrouping::Anchored, LineGrouping::GapSplit] {
            let reader = ReadingOrder::new(order);
            assert_eq!(reader.reconstruct(&fragments), expected);
            assert_eq!(reader.reconstruct(&reversed), expected);
            assert_eq!(reader.reconstruct(&rotated), expected);
        }
    }

    #[test]
    fn test_anchored_grouping_depends_on_processing_order() {
        // 100 -> 104 -> 108: each step within tolerance, the ends are not
        let ascending = vec![
            frag("a", 0.0, 100.0),
            frag("b", 10.0, 104.0),
            frag("c", 20.0, 108.0),
        ];
        assert_eq!(reconstruct_page_text(&ascending), "c\na b");

        let descending = vec![
            frag("c", 20.0, 108.0),
            frag("b", 10.0, 104.0),
            frag("a", 0.0, 100.0),
        ];
        assert_eq!(reconstruct_page_text(&descending), "b c\na");

        let lines = ReadingOrder::default().group_lines(&descending);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].y, 108.0);
        assert_eq!(lines[1].y, 100.0);
    }

    #[test]
    fn test_anchored_prefers_lowest_matching_bucket() {
        // Buckets at 100 and 108 both lie within 5 of 104
        let fragments = vec![
            frag("low", 0.0, 100.0),
            frag("high", 0.0, 108.0),
            frag("mid", 10.0, 104.0),
        ];
        assert_eq!(reconstruct_page_text(&fragments), "high\nlow mid");
    }

    #[test]
    fn test_gap_split_is_order_independent() {
        let reader = ReadingOrder::new(LineGrouping::GapSplit);
        let ascending = vec![
            frag("a", 0.0, 100.0),
            frag("b", 10.0, 104.0),
            frag("c", 20.0, 108.0),
        ];
        let mut descending = ascending.clone();
        descending.reverse();

        // The chain stays one line because no single gap exceeds tolerance
        assert_eq!(reader.reconstruct(&ascending), "a b c");
        assert_eq!(reader.reconstruct(&descending), "a b c");

        let lines = reader.group_lines(&ascending);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].y, 108.0);
    }

    #[test]
    fn test_gap_split_separates_lines() {
        let reader = ReadingOrder::new(LineGrouping::GapSplit);
        let fragments = vec![
            frag("bottom", 0.0, 10.0),
            frag("top", 0.0, 100.0),
            frag("middle", 0.0, 50.0),
        ];
        assert_eq!(reader.reconstruct(&fragments), "top\nmiddle\nbottom");
    }

    #[test]
    fn test_custom_tolerance() {
        let fragments = vec![frag("a", 0.0, 100.0), frag("b", 10.0, 104.0)];
        let strict = ReadingOrder::default().with_tolerance(2.0);
        assert_eq!(strict.reconstruct(&fragments), "b\na");
    }
}
