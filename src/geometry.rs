use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix3, Vector3};

/// Triangle areas at or below this (in squared coordinate units) count as collinear.
const DEGENERATE_AREA: f64 = 1e-9;

/// A 2D point. Whether it lives in normalized [0, 1] space or pixel space is
/// up to the caller; the helpers that convert between the two say which.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn sum(&self) -> f64 {
        self.x + self.y
    }

    /// Column difference of an `(x, y)` row, i.e. `y - x`.
    fn diff(&self) -> f64 {
        self.y - self.x
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Four corner points. After [`order_corners`] the order is
/// top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Build a quad from eight normalized values `x1 y1 ... x4 y4`, scaled to
    /// pixel space for an image of `width` x `height`. Order is preserved.
    pub fn from_normalized(values: &[f64; 8], width: u32, height: u32) -> Self {
        let mut points = [Point::default(); 4];
        for (i, point) in points.iter_mut().enumerate() {
            *point = Point::new(values[2 * i], values[2 * i + 1]);
        }
        Quad(points).denormalize(width, height)
    }

    pub fn denormalize(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Quad(self.0.map(|p| Point::new(p.x * w, p.y * h)))
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn top_right(&self) -> Point {
        self.0[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.0[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.0[3]
    }

    /// Pixel extent of a canonical quad as `(full_width, full_height)`.
    ///
    /// Each is the larger of the two opposing edges, measured along a single
    /// axis (top/bottom x-span, left/right y-span).
    pub fn edge_extent(&self) -> (f64, f64) {
        let left_height = self.bottom_left().y - self.top_left().y;
        let right_height = self.bottom_right().y - self.top_right().y;
        let top_width = self.top_right().x - self.top_left().x;
        let bottom_width = self.bottom_right().x - self.bottom_left().x;
        (top_width.max(bottom_width), left_height.max(right_height))
    }

    /// Signed shoelace area. Positive for clockwise order in image coordinates.
    pub fn area(&self) -> f64 {
        let p = &self.0;
        let mut twice = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += p[i].x * p[j].y - p[j].x * p[i].y;
        }
        twice / 2.0
    }

    /// True when any three of the corners are collinear or coincident.
    ///
    /// A projective transform from such a quad to a rectangle does not exist.
    pub fn is_degenerate(&self) -> bool {
        let p = &self.0;
        if p.iter().any(|pt| !pt.x.is_finite() || !pt.y.is_finite()) {
            return true;
        }
        (0..4).any(|skip| {
            let tri: Vec<&Point> = (0..4).filter(|&i| i != skip).map(|i| &p[i]).collect();
            triangle_area(tri[0], tri[1], tri[2]).abs() <= DEGENERATE_AREA
        })
    }
}

fn triangle_area(a: &Point, b: &Point, c: &Point) -> f64 {
    ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)) / 2.0
}

/// Assign corner roles using the sum/difference rule.
///
/// Minimum `x + y` is top-left, maximum is bottom-right. Minimum `y - x` is
/// top-right, maximum is bottom-left. Ties go to the earliest input point.
/// Past roughly 45 degrees of rotation, or for non-convex input, two roles can
/// land on the same point; [`Quad::is_degenerate`] catches that downstream.
pub fn order_corners(points: &[Point; 4]) -> Quad {
    let pick = |key: fn(&Point) -> f64, want_max: bool| -> Point {
        let mut best = points[0];
        for p in &points[1..] {
            let better = if want_max {
                key(p) > key(&best)
            } else {
                key(p) < key(&best)
            };
            if better {
                best = *p;
            }
        }
        best
    };

    Quad([
        pick(Point::sum, false),
        pick(Point::diff, false),
        pick(Point::sum, true),
        pick(Point::diff, true),
    ])
}

/// Axis-aligned box in YOLO center form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

/// Rotated box; `angle` is in radians within `[0, pi/2)` and gives the
/// direction of the `w` side measured from the x axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub angle: f64,
}

/// Tight axis-aligned box around a polygon.
pub fn bounding_box(points: &[Point]) -> BoundingBox {
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    BoundingBox {
        cx: (min_x + max_x) / 2.0,
        cy: (min_y + max_y) / 2.0,
        w: max_x - min_x,
        h: max_y - min_y,
    }
}

/// Convex hull by Andrew's monotone chain, counter-clockwise, no repeated end point.
fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: &Point, a: &Point, b: &Point| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Minimum-area enclosing rectangle via rotating calipers over the hull edges.
///
/// Returns `None` for an empty point set.
pub fn min_area_rect(points: &[Point]) -> Option<OrientedBox> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return None,
        1 => {
            return Some(OrientedBox {
                cx: hull[0].x,
                cy: hull[0].y,
                w: 0.0,
                h: 0.0,
                angle: 0.0,
            })
        }
        _ => {}
    }

    let mut best: Option<(f64, OrientedBox)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = (dx / len, dy / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let pu = p.x * ux + p.y * uy;
            let pv = p.x * vx + p.y * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let (w, h) = (max_u - min_u, max_v - min_v);
        let area = w * h;
        if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
            let mu = (min_u + max_u) / 2.0;
            let mv = (min_v + max_v) / 2.0;
            let rect = OrientedBox {
                cx: mu * ux + mv * vx,
                cy: mu * uy + mv * vy,
                w,
                h,
                angle: uy.atan2(ux),
            };
            best = Some((area, rect));
        }
    }

    best.map(|(_, rect)| normalize_angle(rect))
}

/// Fold the angle into `[0, pi/2)`; every quarter turn swaps the sides.
fn normalize_angle(mut rect: OrientedBox) -> OrientedBox {
    const EPS: f64 = 1e-9;
    while rect.angle < -EPS {
        rect.angle += FRAC_PI_2;
        std::mem::swap(&mut rect.w, &mut rect.h);
    }
    while rect.angle >= FRAC_PI_2 - EPS {
        rect.angle -= FRAC_PI_2;
        std::mem::swap(&mut rect.w, &mut rect.h);
    }
    if rect.angle.abs() <= EPS {
        rect.angle = 0.0;
    }
    rect
}

/// Map a point through a projective matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = Vector3::new(x, y, 1.0);
    let result = matrix * p;
    (result.x / result.z, result.y / result.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pts(raw: [(f64, f64); 4]) -> [Point; 4] {
        raw.map(Point::from)
    }

    #[test]
    fn test_order_shuffled_rectangle() {
        let shuffled = pts([(100.0, 40.0), (10.0, 10.0), (10.0, 40.0), (100.0, 10.0)]);
        let quad = order_corners(&shuffled);
        assert_eq!(quad.top_left(), Point::new(10.0, 10.0));
        assert_eq!(quad.top_right(), Point::new(100.0, 10.0));
        assert_eq!(quad.bottom_right(), Point::new(100.0, 40.0));
        assert_eq!(quad.bottom_left(), Point::new(10.0, 40.0));
    }

    #[test]
    fn test_order_tilted_plate() {
        let tilted = pts([(52.0, 30.0), (12.0, 18.0), (48.0, 62.0), (8.0, 50.0)]);
        let quad = order_corners(&tilted);
        assert_eq!(quad.top_left(), Point::new(12.0, 18.0));
        assert_eq!(quad.top_right(), Point::new(52.0, 30.0));
        assert_eq!(quad.bottom_right(), Point::new(48.0, 62.0));
        assert_eq!(quad.bottom_left(), Point::new(8.0, 50.0));
    }

    #[test]
    fn test_order_tie_keeps_first() {
        // A diamond: left and top share the minimum sum with the first listed winning.
        let diamond = pts([(0.0, 10.0), (10.0, 0.0), (20.0, 10.0), (10.0, 20.0)]);
        let quad = order_corners(&diamond);
        assert_eq!(quad.top_left(), Point::new(0.0, 10.0));
        assert_eq!(quad.bottom_right(), Point::new(20.0, 10.0));
    }

    #[test]
    fn test_edge_extent_uses_longer_edges() {
        let quad = order_corners(&pts([(0.0, 0.0), (100.0, 5.0), (90.0, 45.0), (5.0, 50.0)]));
        let (w, h) = quad.edge_extent();
        assert_eq!(w, 100.0);
        assert_eq!(h, 50.0);
    }

    #[test]
    fn test_degenerate_detection() {
        let line = Quad(pts([(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]));
        assert!(line.is_degenerate());

        let repeated = Quad(pts([(0.0, 0.0), (10.0, 0.0), (10.0, 0.0), (0.0, 10.0)]));
        assert!(repeated.is_degenerate());

        let rect = Quad(pts([(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]));
        assert!(!rect.is_degenerate());
        assert_eq!(rect.area(), 50.0);
    }

    #[test]
    fn test_from_normalized() {
        let quad = Quad::from_normalized(&[0.1, 0.2, 0.5, 0.2, 0.5, 0.4, 0.1, 0.4], 200, 100);
        assert_eq!(quad.0[0], Point::new(20.0, 20.0));
        assert_eq!(quad.0[2], Point::new(100.0, 40.0));
    }

    #[test]
    fn test_bounding_box() {
        let bb = bounding_box(&pts([(0.2, 0.1), (0.6, 0.15), (0.55, 0.3), (0.25, 0.25)]));
        assert!((bb.cx - 0.4).abs() < 1e-12);
        assert!((bb.cy - 0.2).abs() < 1e-12);
        assert!((bb.w - 0.4).abs() < 1e-12);
        assert!((bb.h - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_min_area_rect_axis_aligned() {
        let rect = min_area_rect(&pts([(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)])).unwrap();
        assert!((rect.cx - 2.0).abs() < 1e-9);
        assert!((rect.cy - 1.0).abs() < 1e-9);
        assert!((rect.w - 4.0).abs() < 1e-9);
        assert!((rect.h - 2.0).abs() < 1e-9);
        assert_eq!(rect.angle, 0.0);
    }

    #[test]
    fn test_min_area_rect_rotated() {
        // Square of side sqrt(2) rotated 45 degrees around (1, 1).
        let rect = min_area_rect(&pts([(1.0, 0.0), (2.0, 1.0), (1.0, 2.0), (0.0, 1.0)])).unwrap();
        assert!((rect.cx - 1.0).abs() < 1e-9);
        assert!((rect.cy - 1.0).abs() < 1e-9);
        assert!((rect.w * rect.h - 2.0).abs() < 1e-9);
        assert!((rect.angle - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn test_min_area_rect_empty() {
        assert!(min_area_rect(&[]).is_none());
    }

    #[test]
    fn test_transform_point_identity() {
        let (x, y) = transform_point(&Matrix3::identity(), 3.0, 4.0);
        assert_eq!((x, y), (3.0, 4.0));
    }

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f64..1000.0, -1000.0f64..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        /// Re-ordering an ordered quad leaves it unchanged.
        #[test]
        fn prop_ordering_is_idempotent(
            a in point_strategy(), b in point_strategy(),
            c in point_strategy(), d in point_strategy(),
        ) {
            let once = order_corners(&[a, b, c, d]);
            let twice = order_corners(&once.0);
            prop_assert_eq!(once, twice);
        }

        /// Corner roles bound the sum and difference of every input point.
        #[test]
        fn prop_ordering_respects_sum_and_diff_bounds(
            a in point_strategy(), b in point_strategy(),
            c in point_strategy(), d in point_strategy(),
        ) {
            let input = [a, b, c, d];
            let quad = order_corners(&input);
            for p in &input {
                prop_assert!(quad.top_left().sum() <= p.sum());
                prop_assert!(p.sum() <= quad.bottom_right().sum());
                prop_assert!(quad.top_right().diff() <= p.diff());
                prop_assert!(p.diff() <= quad.bottom_left().diff());
            }
        }
    }
}
