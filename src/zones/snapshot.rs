use crate::db::models::{RoiPoints, Zone, ZoneKind, ZoneShape};
use crate::error::Error;
use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_RESOLUTION: [u32; 2] = [1920, 1080];

/// One seat entry of a zone config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatEntry {
    pub id: String,
    pub roi: RoiPoints,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: ZoneKind,
}

/// Zone config exchange format, also used for the local snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub camera_id: String,
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default)]
    pub seats: Vec<SeatEntry>,
}

fn default_resolution() -> [u32; 2] {
    DEFAULT_RESOLUTION
}

impl ZoneConfig {
    pub fn from_zones(store_id: &str, channel_id: i32, zones: &[Zone]) -> Self {
        Self {
            camera_id: camera_id(store_id, channel_id),
            resolution: DEFAULT_RESOLUTION,
            seats: zones
                .iter()
                .map(|z| SeatEntry {
                    id: z.id.clone(),
                    roi: z.shape.to_roi(),
                    label: z.label.clone(),
                    kind: z.shape.kind(),
                })
                .collect(),
        }
    }

    /// Convert to zones, skipping seats whose geometry does not fit their type
    pub fn to_zones(&self, store_id: &str, channel_id: i32) -> Vec<Zone> {
        self.seats
            .iter()
            .filter_map(|seat| match ZoneShape::from_roi(seat.kind, &seat.roi) {
                Ok(shape) => Some(Zone {
                    id: seat.id.clone(),
                    label: if seat.label.is_empty() {
                        seat.id.clone()
                    } else {
                        seat.label.clone()
                    },
                    store_id: store_id.to_string(),
                    channel_id,
                    shape,
                }),
                Err(e) => {
                    warn!("Skipping seat {} in {}: {}", seat.id, self.camera_id, e);
                    None
                }
            })
            .collect()
    }
}

pub fn camera_id(store_id: &str, channel_id: i32) -> String {
    format!("{}_channel_{}", store_id, channel_id)
}

pub fn snapshot_path(dir: &Path, store_id: &str, channel_id: i32) -> PathBuf {
    dir.join(format!("{}_{}.json", store_id, channel_id))
}

/// Write zones to `{dir}/{store}_{channel}.json`
pub fn save_snapshot(dir: &Path, store_id: &str, channel_id: i32, zones: &[Zone]) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Io(format!("Failed to create {}: {}", dir.display(), e)))?;

    let path = snapshot_path(dir, store_id, channel_id);
    let json = serde_json::to_string_pretty(&ZoneConfig::from_zones(store_id, channel_id, zones))?;

    // Replace atomically
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| Error::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, &path)
        .map_err(|e| Error::Io(format!("Failed to replace {}: {}", path.display(), e)))?;

    Ok(())
}

/// Read a snapshot; `None` when the file does not exist
pub fn load_snapshot(dir: &Path, store_id: &str, channel_id: i32) -> Result<Option<Vec<Zone>>> {
    let path = snapshot_path(dir, store_id, channel_id);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: ZoneConfig = serde_json::from_str(&content)
        .map_err(|e| Error::Serialization(format!("Invalid zone file {}: {}", path.display(), e)))?;

    Ok(Some(config.to_zones(store_id, channel_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::geometry::{BoundingBox, Point};

    fn zones() -> Vec<Zone> {
        vec![
            Zone {
                id: "A-01".to_string(),
                label: "Window 1".to_string(),
                store_id: "oryudong".to_string(),
                channel_id: 3,
                shape: ZoneShape::Rectangle(BoundingBox::new(100, 100, 200, 200)),
            },
            Zone {
                id: "A-02".to_string(),
                label: "A-02".to_string(),
                store_id: "oryudong".to_string(),
                channel_id: 3,
                shape: ZoneShape::Polygon(vec![
                    Point::new(300, 100),
                    Point::new(400, 100),
                    Point::new(400, 200),
                ]),
            },
        ]
    }

    #[test]
    fn parses_exchange_format() {
        let json = r#"{
            "camera_id": "oryudong_channel_1",
            "resolution": [1920, 1080],
            "seats": [
                {"id": "A-01", "roi": [100, 100, 200, 200], "label": "A-01"},
                {"id": "A-02", "roi": [[300, 100], [400, 100], [400, 200], [300, 200]],
                 "label": "A-02", "type": "polygon"}
            ]
        }"#;
        let config: ZoneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seats[0].kind, ZoneKind::Rectangle);
        assert_eq!(config.seats[1].kind, ZoneKind::Polygon);

        let zones = config.to_zones("oryudong", 1);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].shape, ZoneShape::Rectangle(BoundingBox::new(100, 100, 200, 200)));
    }

    #[test]
    fn mismatched_seat_is_skipped() {
        let json = r#"{
            "camera_id": "x",
            "seats": [
                {"id": "bad", "roi": [1, 2, 3, 4], "type": "polygon"},
                {"id": "good", "roi": [1, 2, 3, 4]}
            ]
        }"#;
        let config: ZoneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.resolution, DEFAULT_RESOLUTION);
        let zones = config.to_zones("s", 1);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].id, "good");
        assert_eq!(zones[0].label, "good");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        save_snapshot(dir.path(), "oryudong", 3, &zones()).unwrap();

        assert!(dir.path().join("oryudong_3.json").exists());
        let loaded = load_snapshot(dir.path(), "oryudong", 3).unwrap().unwrap();
        assert_eq!(loaded, zones());
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(dir.path(), "oryudong", 9).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(snapshot_path(dir.path(), "oryudong", 1), "{ not json").unwrap();
        assert!(load_snapshot(dir.path(), "oryudong", 1).is_err());
    }
}
