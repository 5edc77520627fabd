use crate::analytics::geometry::{BoundingBox, Point};
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Shape tag as stored in the database and in zone config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    #[default]
    Rectangle,
    Polygon,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Rectangle => "rectangle",
            ZoneKind::Polygon => "polygon",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.trim().to_lowercase().as_str() {
            "rectangle" | "rect" => Ok(ZoneKind::Rectangle),
            "polygon" => Ok(ZoneKind::Polygon),
            other => Err(Error::Config(format!("Unknown zone shape '{}'", other))),
        }
    }
}

/// Raw point list: `[x1, y1, x2, y2]` or `[[x, y], ...]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoiPoints {
    Flat(Vec<i32>),
    Points(Vec<[i32; 2]>),
}

/// Zone geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneShape {
    Rectangle(BoundingBox),
    Polygon(Vec<Point>),
}

impl ZoneShape {
    pub fn kind(&self) -> ZoneKind {
        match self {
            ZoneShape::Rectangle(_) => ZoneKind::Rectangle,
            ZoneShape::Polygon(_) => ZoneKind::Polygon,
        }
    }

    /// Build a shape from its tag and raw points, rejecting malformed input
    pub fn from_roi(kind: ZoneKind, roi: &RoiPoints) -> Result<Self, Error> {
        match (kind, roi) {
            (ZoneKind::Rectangle, RoiPoints::Flat(v)) if v.len() == 4 => {
                Ok(ZoneShape::Rectangle(normalized_box(v[0], v[1], v[2], v[3])))
            }
            (ZoneKind::Rectangle, RoiPoints::Points(p)) if p.len() == 2 => Ok(
                ZoneShape::Rectangle(normalized_box(p[0][0], p[0][1], p[1][0], p[1][1])),
            ),
            (ZoneKind::Rectangle, _) => Err(Error::Config(
                "Rectangle zone needs [x1, y1, x2, y2] or two corner points".to_string(),
            )),
            (ZoneKind::Polygon, RoiPoints::Points(p)) if p.len() >= 3 => Ok(ZoneShape::Polygon(
                p.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
            )),
            (ZoneKind::Polygon, _) => Err(Error::Config(
                "Polygon zone needs at least three [x, y] points".to_string(),
            )),
        }
    }

    pub fn to_roi(&self) -> RoiPoints {
        match self {
            ZoneShape::Rectangle(b) => RoiPoints::Flat(b.to_array().to_vec()),
            ZoneShape::Polygon(points) => {
                RoiPoints::Points(points.iter().map(|p| [p.x, p.y]).collect())
            }
        }
    }
}

fn normalized_box(ax: i32, ay: i32, bx: i32, by: i32) -> BoundingBox {
    BoundingBox::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

/// Monitored seat area inside one camera's view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Unique within a channel
    pub id: String,
    pub label: String,
    pub store_id: String,
    pub channel_id: i32,
    pub shape: ZoneShape,
}

/// Row of the `seats` table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZoneRow {
    pub seat_id: String,
    pub store_id: String,
    pub channel_id: Option<i32>,
    pub roi_type: String,
    pub roi_polygon: serde_json::Value,
    pub seat_label: Option<String>,
}

impl TryFrom<ZoneRow> for Zone {
    type Error = Error;

    fn try_from(row: ZoneRow) -> Result<Self, Self::Error> {
        let kind = ZoneKind::parse(&row.roi_type)?;
        let roi: RoiPoints = serde_json::from_value(row.roi_polygon).map_err(|e| {
            Error::Serialization(format!("Invalid ROI for seat {}: {}", row.seat_id, e))
        })?;
        let shape = ZoneShape::from_roi(kind, &roi)
            .map_err(|e| Error::Config(format!("Seat {}: {}", row.seat_id, e)))?;

        Ok(Zone {
            label: row.seat_label.unwrap_or_else(|| row.seat_id.clone()),
            id: row.seat_id,
            store_id: row.store_id,
            channel_id: row.channel_id.unwrap_or_default(),
            shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rectangle_from_flat_points_is_normalized() {
        let shape =
            ZoneShape::from_roi(ZoneKind::Rectangle, &RoiPoints::Flat(vec![200, 200, 100, 100]))
                .unwrap();
        assert_eq!(shape, ZoneShape::Rectangle(BoundingBox::new(100, 100, 200, 200)));
    }

    #[test]
    fn rectangle_from_corner_points() {
        let shape = ZoneShape::from_roi(
            ZoneKind::Rectangle,
            &RoiPoints::Points(vec![[10, 20], [30, 40]]),
        )
        .unwrap();
        assert_eq!(shape, ZoneShape::Rectangle(BoundingBox::new(10, 20, 30, 40)));
    }

    #[test]
    fn polygon_needs_three_points() {
        let err = ZoneShape::from_roi(ZoneKind::Polygon, &RoiPoints::Points(vec![[0, 0], [1, 1]]));
        assert!(err.is_err());
        let err = ZoneShape::from_roi(ZoneKind::Polygon, &RoiPoints::Flat(vec![0, 0, 1, 1]));
        assert!(err.is_err());
    }

    #[test]
    fn row_converts_to_polygon_zone() {
        let row = ZoneRow {
            seat_id: "A-01".to_string(),
            store_id: "oryudong".to_string(),
            channel_id: Some(2),
            roi_type: "polygon".to_string(),
            roi_polygon: json!([[100, 100], [200, 100], [200, 200], [100, 200]]),
            seat_label: None,
        };
        let zone = Zone::try_from(row).unwrap();
        assert_eq!(zone.label, "A-01");
        assert_eq!(zone.channel_id, 2);
        assert_eq!(zone.shape.kind(), ZoneKind::Polygon);
    }

    #[test]
    fn row_with_garbage_roi_is_rejected() {
        let row = ZoneRow {
            seat_id: "A-09".to_string(),
            store_id: "oryudong".to_string(),
            channel_id: Some(1),
            roi_type: "polygon".to_string(),
            roi_polygon: json!({"x": 1}),
            seat_label: Some("A-09".to_string()),
        };
        assert!(Zone::try_from(row).is_err());
    }
}
