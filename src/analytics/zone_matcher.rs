use crate::analytics::detection::Detection;
use crate::analytics::geometry::point_in_polygon;
use crate::db::models::{Zone, ZoneShape};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Occupied,
    Empty,
}

/// Outcome of matching one zone against a frame's detections
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub status: MatchStatus,
    /// 1.0 for a polygon hit, otherwise the best IoU seen before the loop ended
    pub score: f64,
    pub matched_detection: Option<Detection>,
}

impl MatchResult {
    pub fn is_occupied(&self) -> bool {
        self.status == MatchStatus::Occupied
    }

    fn empty(score: f64) -> Self {
        Self {
            status: MatchStatus::Empty,
            score,
            matched_detection: None,
        }
    }
}

/// Match every zone independently; zones may share a detection.
pub fn match_zones(
    zones: &[Zone],
    detections: &[Detection],
    iou_threshold: f64,
) -> HashMap<String, MatchResult> {
    zones
        .iter()
        .map(|zone| (zone.id.clone(), match_zone(zone, detections, iou_threshold)))
        .collect()
}

pub fn match_zone(zone: &Zone, detections: &[Detection], iou_threshold: f64) -> MatchResult {
    match &zone.shape {
        ZoneShape::Polygon(points) => {
            // Feet position: bottom center of the person box
            detections
                .iter()
                .find(|d| point_in_polygon(d.bbox.bottom_center(), points))
                .map(|d| MatchResult {
                    status: MatchStatus::Occupied,
                    score: 1.0,
                    matched_detection: Some(*d),
                })
                .unwrap_or_else(|| MatchResult::empty(0.0))
        }
        ZoneShape::Rectangle(rect) => {
            let mut max_iou = 0.0_f64;
            for detection in detections {
                let iou = detection.bbox.iou(rect);
                if iou > max_iou {
                    max_iou = iou;
                }
                // Stop at the first box over the threshold; later boxes are not scored
                if iou > iou_threshold {
                    return MatchResult {
                        status: MatchStatus::Occupied,
                        score: max_iou,
                        matched_detection: Some(*detection),
                    };
                }
            }
            MatchResult::empty(max_iou)
        }
    }
}
