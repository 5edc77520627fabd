use serde::{Deserialize, Serialize};

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box given by its top-left and bottom-right corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn area(&self) -> i64 {
        (self.x2 - self.x1) as i64 * (self.y2 - self.y1) as i64
    }

    /// Bottom-center point, roughly where a standing person's feet are
    pub fn bottom_center(&self) -> (f64, f64) {
        ((self.x1 as f64 + self.x2 as f64) / 2.0, self.y2 as f64)
    }

    /// Intersection over union with another box.
    ///
    /// Zero when the boxes do not overlap or the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        if ix2 < ix1 || iy2 < iy1 {
            return 0.0;
        }

        let intersection = (ix2 - ix1) as i64 * (iy2 - iy1) as i64;
        let union = self.area() + other.area() - intersection;

        if union == 0 {
            return 0.0;
        }

        intersection as f64 / union as f64
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Even-odd ray casting test over a closed vertex loop.
///
/// Points lying on the bottom or right edge of a convex shape count as inside;
/// zone matching depends on that for feet resting on a zone's lower border.
pub fn point_in_polygon(point: (f64, f64), polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n == 0 {
        return false;
    }

    let (x, y) = point;
    let mut inside = false;
    let mut xinters = 0.0;

    let (mut p1x, mut p1y) = (polygon[0].x as f64, polygon[0].y as f64);
    for i in 1..=n {
        let vertex = polygon[i % n];
        let (p2x, p2y) = (vertex.x as f64, vertex.y as f64);

        if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
            if p1y != p2y {
                xinters = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
            }
            if p1x == p2x || x <= xinters {
                inside = !inside;
            }
        }

        p1x = p2x;
        p1y = p2y;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 100),
        ]
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(100, 100, 200, 200);
        assert_eq!(b.iou(&b), 1.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(200, 200, 300, 300);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_partial_overlap() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 50, 150, 150);
        // 2500 / (10000 + 10000 - 2500)
        assert!((a.iou(&b) - 0.142857).abs() < 1e-4);
    }

    #[test]
    fn iou_with_degenerate_box_is_zero() {
        let zone = BoundingBox::new(10, 10, 10, 10);
        assert_eq!(zone.iou(&zone), 0.0);
        assert_eq!(zone.iou(&BoundingBox::new(0, 0, 50, 50)), 0.0);
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(100, 0, 200, 100);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn point_inside_square() {
        assert!(point_in_polygon((50.0, 50.0), &square()));
    }

    #[test]
    fn point_outside_square() {
        assert!(!point_in_polygon((150.0, 150.0), &square()));
        assert!(!point_in_polygon((-1.0, 50.0), &square()));
    }

    #[test]
    fn point_on_bottom_edge_counts_as_inside() {
        let zone = vec![
            Point::new(100, 100),
            Point::new(200, 100),
            Point::new(200, 200),
            Point::new(100, 200),
        ];
        assert!(point_in_polygon((150.0, 200.0), &zone));
        assert!(!point_in_polygon((150.0, 100.0), &zone));
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // U shape opening upwards
        let u = vec![
            Point::new(0, 0),
            Point::new(30, 0),
            Point::new(30, 70),
            Point::new(70, 70),
            Point::new(70, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 100),
        ];
        assert!(!point_in_polygon((50.0, 30.0), &u));
        assert!(point_in_polygon((15.0, 30.0), &u));
        assert!(point_in_polygon((50.0, 90.0), &u));
    }

    #[test]
    fn empty_polygon_contains_nothing() {
        assert!(!point_in_polygon((0.0, 0.0), &[]));
    }

    #[test]
    fn bottom_center_uses_lower_edge() {
        let b = BoundingBox::new(120, 80, 180, 200);
        assert_eq!(b.bottom_center(), (150.0, 200.0));
    }
}
