//! # Object tracks
//!
//! Tracks are produced by the detection collaborator as a nested structure: object category to
//! per-frame entries, each mapping a track ID to an attribute record. This module derives
//! positions from bounding boxes, and corrects them by estimated camera movement.

use crate::movement::Movement;
use crate::utils::{self, BBox};
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Category whose position is taken at the box centre rather than at its foot.
pub const BALL_CATEGORY: &str = "ball";

/// Attributes of a single object in a single frame.
///
/// Attributes unknown to this crate are preserved as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<na::Point2<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_adjusted: Option<na::Point2<f32>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Objects visible within a single frame, keyed by track ID.
pub type FrameTracks = BTreeMap<u32, TrackInfo>;

/// All tracks of a sequence, keyed by object category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tracks(pub BTreeMap<String, Vec<FrameTracks>>);

impl Deref for Tracks {
    type Target = BTreeMap<String, Vec<FrameTracks>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Tracks {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Tracks {
    fn records_mut(&mut self) -> impl Iterator<Item = (&str, usize, &mut TrackInfo)> {
        self.0.iter_mut().flat_map(|(category, frames)| {
            frames.iter_mut().enumerate().flat_map(move |(frame, tracks)| {
                let category = category.as_str();
                tracks.values_mut().map(move |info| (category, frame, info))
            })
        })
    }

    /// Make every category hold exactly `frames` entries.
    ///
    /// Missing frames are filled with empty entries, excess ones are dropped.
    pub fn normalise_len(&mut self, frames: usize) {
        for entries in self.0.values_mut() {
            entries.resize_with(frames, Default::default);
        }
    }

    /// Derive `position` from `bbox` for every record that has a box.
    ///
    /// The ball is positioned at its box centre, everything else at the bottom centre of the
    /// box. Boxes containing NaN produce no position.
    pub fn add_positions(&mut self) {
        for (category, _, info) in self.records_mut() {
            if let Some(bbox) = info.bbox {
                let position = if category == BALL_CATEGORY {
                    utils::center_of_bbox(bbox)
                } else {
                    utils::foot_position(bbox)
                };
                if position.is_some() {
                    info.position = position;
                }
            }
        }
    }

    /// Add `position_adjusted` to every record with a `position`.
    ///
    /// The adjusted position is the raw position minus the camera movement of the record's frame.
    /// Frames past the end of `movement` are skipped.
    pub fn add_adjusted_positions(&mut self, movement: &[Movement]) {
        for (_, frame, info) in self.records_mut() {
            if let (Some(position), Some(m)) = (info.position, movement.get(frame)) {
                info.position_adjusted = Some(position - m.as_vector());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn record(position: Option<(f32, f32)>) -> TrackInfo {
        TrackInfo {
            position: position.map(|(x, y)| na::Point2::new(x, y)),
            ..Default::default()
        }
    }

    fn sample_tracks() -> Tracks {
        let mut tracks = Tracks::default();
        tracks.insert(
            "players".into(),
            vec![
                [(1, record(Some((100.0, 50.0)))), (2, record(None))].into(),
                [(1, record(Some((104.0, 52.0))))].into(),
                [(1, record(Some((110.0, 55.0))))].into(),
            ],
        );
        tracks
    }

    #[test]
    fn adjusted_is_raw_minus_movement() {
        let mut tracks = sample_tracks();
        let movement = vec![
            Movement::ZERO,
            Movement::new(6.0, -2.0),
            Movement::new(-3.5, 1.0),
        ];

        tracks.add_adjusted_positions(&movement);

        let players = &tracks["players"];
        assert_eq!(
            players[0][&1].position_adjusted,
            Some(na::Point2::new(100.0, 50.0))
        );
        assert_eq!(
            players[1][&1].position_adjusted,
            Some(na::Point2::new(98.0, 54.0))
        );
        assert_eq!(
            players[2][&1].position_adjusted,
            Some(na::Point2::new(113.5, 54.0))
        );
    }

    #[test]
    fn no_position_no_adjustment() {
        let mut tracks = sample_tracks();
        tracks.add_adjusted_positions(&[Movement::new(1.0, 1.0); 3]);
        assert_eq!(tracks["players"][0][&2].position_adjusted, None);
    }

    #[test]
    fn frames_past_movement_are_skipped() {
        let mut tracks = sample_tracks();
        tracks.add_adjusted_positions(&[Movement::ZERO, Movement::new(1.0, 0.0)]);

        let players = &tracks["players"];
        assert!(players[1][&1].position_adjusted.is_some());
        assert_eq!(players[2][&1].position_adjusted, None);
    }

    #[test]
    fn correction_roundtrip() {
        let raw = na::Point2::new(321.25f32, 87.5);
        let movement = Movement::new(13.7, -4.3);

        let adjusted = raw - movement.as_vector();
        let restored = adjusted - (-movement.as_vector());

        assert_approx_eq!(restored.x, raw.x, 1e-4);
        assert_approx_eq!(restored.y, raw.y, 1e-4);
    }

    #[test]
    fn positions_from_boxes() {
        let mut tracks = Tracks::default();
        let boxed = |bbox| TrackInfo {
            bbox: Some(bbox),
            ..Default::default()
        };
        tracks.insert(
            "players".into(),
            vec![[
                (3, boxed([10.0, 10.0, 30.0, 50.0])),
                (4, boxed([f32::NAN, 10.0, 30.0, 50.0])),
            ]
            .into()],
        );
        tracks.insert(
            BALL_CATEGORY.into(),
            vec![[(1, boxed([10.0, 10.0, 20.0, 20.0]))].into()],
        );

        tracks.add_positions();

        assert_eq!(
            tracks["players"][0][&3].position,
            Some(na::Point2::new(20.0, 50.0))
        );
        assert_eq!(tracks["players"][0][&4].position, None);
        assert_eq!(
            tracks[BALL_CATEGORY][0][&1].position,
            Some(na::Point2::new(15.0, 15.0))
        );
    }

    #[test]
    fn normalise_pads_and_truncates() {
        let mut tracks = sample_tracks();
        tracks.insert("ball".into(), vec![]);

        tracks.normalise_len(2);
        assert_eq!(tracks["players"].len(), 2);
        assert_eq!(tracks["ball"].len(), 2);
        assert!(tracks["ball"][1].is_empty());
    }

    #[test]
    fn json_keeps_unknown_attributes() {
        let json = r#"{"players":[{"7":{"bbox":[0.0,0.0,10.0,20.0],"team":1}}]}"#;
        let mut tracks: Tracks = serde_json::from_str(json).unwrap();

        tracks.add_positions();
        tracks.add_adjusted_positions(&[Movement::new(2.0, 0.0)]);

        let info = &tracks["players"][0][&7];
        assert_eq!(info.extra["team"], serde_json::json!(1));
        assert_eq!(info.position_adjusted, Some(na::Point2::new(3.0, 20.0)));

        let out = serde_json::to_value(&tracks).unwrap();
        assert_eq!(out["players"][0]["7"]["team"], serde_json::json!(1));
    }
}
