//! YOLO label text files: one object per line, `class_id` followed by
//! normalized coordinates.

use std::fs;
use std::path::Path;

use log::warn;

use crate::error::{CropError, Result};
use crate::geometry::{BoundingBox, OrientedBox, Point};

/// `class_id` plus four `(x, y)` pairs.
pub const POLYGON_TOKENS: usize = 9;

/// How to treat polygon lines with more than [`POLYGON_TOKENS`] tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePolicy {
    /// Anything but exactly nine tokens is malformed.
    Strict,
    /// Extra tokens are dropped with a warning; short lines are still malformed.
    Truncate,
}

/// A four-point polygon annotation in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonLabel {
    pub class_id: u32,
    pub points: [Point; 4],
}

impl PolygonLabel {
    pub fn coords(&self) -> [f64; 8] {
        let mut out = [0.0; 8];
        for (i, p) in self.points.iter().enumerate() {
            out[2 * i] = p.x;
            out[2 * i + 1] = p.y;
        }
        out
    }
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Blank,
    Polygon {
        label: PolygonLabel,
        /// Tokens dropped under [`LinePolicy::Truncate`].
        dropped: usize,
    },
}

pub fn parse_polygon_line(
    line: &str,
    policy: LinePolicy,
) -> std::result::Result<ParsedLine, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(ParsedLine::Blank);
    }

    let dropped = match parts.len() {
        n if n == POLYGON_TOKENS => 0,
        n if n > POLYGON_TOKENS && policy == LinePolicy::Truncate => n - POLYGON_TOKENS,
        n => {
            return Err(format!(
                "expected {} values, got {}",
                POLYGON_TOKENS, n
            ))
        }
    };

    let class_id: u32 = parts[0]
        .parse()
        .map_err(|_| format!("invalid class id '{}'", parts[0]))?;

    let mut coords = [0.0f64; 8];
    for (slot, token) in coords.iter_mut().zip(&parts[1..POLYGON_TOKENS]) {
        *slot = token
            .parse()
            .map_err(|_| format!("invalid coordinate '{}'", token))?;
    }

    let mut points = [Point::default(); 4];
    for (i, point) in points.iter_mut().enumerate() {
        *point = Point::new(coords[2 * i], coords[2 * i + 1]);
    }

    Ok(ParsedLine::Polygon {
        label: PolygonLabel { class_id, points },
        dropped,
    })
}

/// Polygons read from one label file, with the number of lines skipped.
#[derive(Debug, Default)]
pub struct LabelFile {
    pub polygons: Vec<PolygonLabel>,
    pub skipped: usize,
}

/// Read every polygon in `path`. Malformed lines are logged and skipped.
pub fn read_polygon_labels(path: &Path, policy: LinePolicy) -> Result<LabelFile> {
    let content = fs::read_to_string(path)?;
    let mut file = LabelFile::default();

    for (idx, line) in content.lines().enumerate() {
        match parse_polygon_line(line, policy) {
            Ok(ParsedLine::Blank) => {}
            Ok(ParsedLine::Polygon { label, dropped }) => {
                if dropped > 0 {
                    warn!(
                        "Truncated {} extra values in {:?} (line {})",
                        dropped,
                        path,
                        idx + 1
                    );
                }
                file.polygons.push(label);
            }
            Err(reason) => {
                let err = CropError::Label {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason,
                };
                warn!("{}. Skipping this annotation.", err);
                file.skipped += 1;
            }
        }
    }

    Ok(file)
}

/// Swap the class of one label line from `old_class` to `new_class`.
///
/// Only lines with at least a full box (five values) are touched. The line
/// comes back trimmed with single spaces, plus whether the class changed.
pub fn relabel_line(line: &str, old_class: u32, new_class: u32) -> (String, bool) {
    let new_id = new_class.to_string();
    let mut parts: Vec<&str> = line.split_whitespace().collect();
    let matches = parts.len() >= 5 && parts[0].parse::<u32>() == Ok(old_class);
    if matches {
        parts[0] = &new_id;
    }
    (parts.join(" "), matches)
}

pub fn format_bbox(class_id: u32, bb: &BoundingBox) -> String {
    format!("{} {:.6} {:.6} {:.6} {:.6}", class_id, bb.cx, bb.cy, bb.w, bb.h)
}

pub fn format_obb(class_id: u32, rect: &OrientedBox) -> String {
    format!(
        "{} {:.6} {:.6} {:.6} {:.6} {:.6}",
        class_id, rect.cx, rect.cy, rect.w, rect.h, rect.angle
    )
}

/// Box followed by `x y visibility` for each corner. Every corner of a
/// labelled polygon counts as visible.
pub fn format_pose(class_id: u32, bb: &BoundingBox, points: &[Point]) -> String {
    let mut line = format_bbox(class_id, bb);
    for p in points {
        line.push_str(&format!(" {} {} 1", p.x, p.y));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LINE: &str = "0 0.1 0.2 0.5 0.2 0.5 0.4 0.1 0.4";

    fn polygon(parsed: ParsedLine) -> (PolygonLabel, usize) {
        match parsed {
            ParsedLine::Polygon { label, dropped } => (label, dropped),
            ParsedLine::Blank => panic!("expected a polygon"),
        }
    }

    #[test]
    fn test_parse_polygon_line() {
        let (label, dropped) = polygon(parse_polygon_line(LINE, LinePolicy::Strict).unwrap());
        assert_eq!(dropped, 0);
        assert_eq!(label.class_id, 0);
        assert_eq!(label.points[1], Point::new(0.5, 0.2));
        assert_eq!(label.coords()[7], 0.4);
    }

    #[test]
    fn test_truncate_policy() {
        let long = format!("{} 0.9 0.9", LINE);
        assert!(parse_polygon_line(&long, LinePolicy::Strict).is_err());
        let (label, dropped) = polygon(parse_polygon_line(&long, LinePolicy::Truncate).unwrap());
        assert_eq!(dropped, 2);
        assert_eq!(label.points[3], Point::new(0.1, 0.4));
    }

    #[test]
    fn test_short_and_invalid_lines() {
        assert!(parse_polygon_line("0 0.1 0.2", LinePolicy::Truncate).is_err());
        let bad_class = "a 0.1 0.2 0.5 0.2 0.5 0.4 0.1 0.4";
        assert!(parse_polygon_line(bad_class, LinePolicy::Strict).is_err());
        assert!(parse_polygon_line("0 0.1 x 0.5 0.2 0.5 0.4 0.1 0.4", LinePolicy::Strict).is_err());
        assert_eq!(parse_polygon_line("   ", LinePolicy::Strict), Ok(ParsedLine::Blank));
    }

    #[test]
    fn test_read_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", LINE).unwrap();
        writeln!(file, "1 0.3").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "2 0.2 0.2 0.3 0.2 0.3 0.3 0.2 0.3").unwrap();

        let labels = read_polygon_labels(file.path(), LinePolicy::Strict).unwrap();
        assert_eq!(labels.polygons.len(), 2);
        assert_eq!(labels.skipped, 1);
        assert_eq!(labels.polygons[1].class_id, 2);
    }

    #[test]
    fn test_relabel_line() {
        assert_eq!(
            relabel_line("3 0.5 0.5 0.2 0.1", 3, 0),
            ("0 0.5 0.5 0.2 0.1".to_string(), true)
        );
        assert_eq!(
            relabel_line("  3\t0.5  0.5 0.2 0.1 ", 3, 7),
            ("7 0.5 0.5 0.2 0.1".to_string(), true)
        );
        assert_eq!(relabel_line("3 0.5 0.5", 3, 0), ("3 0.5 0.5".to_string(), false));
        assert_eq!(relabel_line("13 0.5 0.5 0.2 0.1", 3, 0).1, false);
        assert_eq!(relabel_line("", 3, 0), (String::new(), false));
    }

    #[test]
    fn test_format_lines() {
        let bb = BoundingBox {
            cx: 0.3,
            cy: 0.3,
            w: 0.4,
            h: 0.2,
        };
        assert_eq!(format_bbox(1, &bb), "1 0.300000 0.300000 0.400000 0.200000");

        let rect = OrientedBox {
            cx: 0.5,
            cy: 0.5,
            w: 0.2,
            h: 0.1,
            angle: 0.25,
        };
        assert_eq!(format_obb(0, &rect), "0 0.500000 0.500000 0.200000 0.100000 0.250000");

        let points = [Point::new(0.1, 0.2), Point::new(0.5, 0.2)];
        assert_eq!(
            format_pose(0, &bb, &points),
            "0 0.300000 0.300000 0.400000 0.200000 0.1 0.2 1 0.5 0.2 1"
        );
    }
}
