//! Track identity assignment.
//!
//! `TrackerState` owns the tracking state of one streaming session: it
//! assigns stable `track_id`s to detections across consecutive frames by
//! greedy IoU association against the boxes seen on the previous frames.
//!
//! One state instance belongs to exactly one session. Sharing it across two
//! independent streams leaks identities across unrelated videos; the loop
//! constructs a fresh state per session. Skipped or out-of-order frames
//! degrade association quality but are not an error.

use crate::detect::result::{BoundingBox, Detection};

/// The two supported tracker configurations, selectable per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerKind {
    ByteTrack,
    BotSort,
}

impl TrackerKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "bytetrack" => Some(TrackerKind::ByteTrack),
            "botsort" => Some(TrackerKind::BotSort),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackerKind::ByteTrack => "bytetrack",
            TrackerKind::BotSort => "botsort",
        }
    }

    fn params(&self) -> TrackerParams {
        match self {
            TrackerKind::ByteTrack => TrackerParams {
                match_iou: 0.3,
                max_lost: 30,
            },
            TrackerKind::BotSort => TrackerParams {
                match_iou: 0.25,
                max_lost: 60,
            },
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct TrackerParams {
    /// Minimum IoU for a detection to continue an existing track.
    match_iou: f32,
    /// Frames a track survives without a matching detection.
    max_lost: u32,
}

#[derive(Clone, Debug)]
struct Track {
    id: u32,
    bbox: BoundingBox,
    label: String,
    lost: u32,
}

/// Per-session tracking state.
pub struct TrackerState {
    kind: TrackerKind,
    params: TrackerParams,
    tracks: Vec<Track>,
    next_id: u32,
}

impl TrackerState {
    pub fn new(kind: TrackerKind) -> Self {
        Self {
            kind,
            params: kind.params(),
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn kind(&self) -> TrackerKind {
        self.kind
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Drop all tracks and restart identity numbering. Called when a state
    /// instance is reused for a new stream.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }

    /// Assign track ids to the detections of the next frame in temporal
    /// order. Highest-confidence detections match first; each existing track
    /// continues into at most one detection.
    pub fn assign(&mut self, detections: &mut [Detection]) {
        let mut order: Vec<usize> = (0..detections.len()).collect();
        order.sort_by(|&a, &b| {
            detections[b]
                .confidence
                .partial_cmp(&detections[a].confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut matched = vec![false; self.tracks.len()];
        for &det_index in &order {
            let detection = &detections[det_index];
            let mut best: Option<(usize, f32)> = None;
            for (track_index, track) in self.tracks.iter().enumerate() {
                if matched[track_index] || track.label != detection.label {
                    continue;
                }
                let iou = track.bbox.iou(&detection.bbox);
                if iou < self.params.match_iou {
                    continue;
                }
                if best.map_or(true, |(_, best_iou)| iou > best_iou) {
                    best = Some((track_index, iou));
                }
            }

            match best {
                Some((track_index, _)) => {
                    matched[track_index] = true;
                    let track = &mut self.tracks[track_index];
                    track.bbox = detection.bbox;
                    track.lost = 0;
                    detections[det_index].track_id = Some(track.id);
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(Track {
                        id,
                        bbox: detection.bbox,
                        label: detection.label.clone(),
                        lost: 0,
                    });
                    matched.push(true);
                    detections[det_index].track_id = Some(id);
                }
            }
        }

        // Age out tracks that went unmatched this frame.
        let max_lost = self.params.max_lost;
        for (track_index, track) in self.tracks.iter_mut().enumerate() {
            if !matched.get(track_index).copied().unwrap_or(true) {
                track.lost += 1;
            }
        }
        self.tracks.retain(|track| track.lost <= max_lost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, label: &str, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(x, y, 20.0, 20.0), label, confidence)
    }

    #[test]
    fn overlapping_detections_keep_their_id_across_frames() {
        let mut tracker = TrackerState::new(TrackerKind::ByteTrack);

        let mut first = vec![det(10.0, 10.0, "crack", 0.9)];
        tracker.assign(&mut first);
        let id = first[0].track_id.unwrap();

        // Small motion: still well above the match threshold.
        let mut second = vec![det(12.0, 11.0, "crack", 0.8)];
        tracker.assign(&mut second);
        assert_eq!(second[0].track_id, Some(id));
    }

    #[test]
    fn disjoint_detection_opens_a_new_track() {
        let mut tracker = TrackerState::new(TrackerKind::ByteTrack);

        let mut first = vec![det(10.0, 10.0, "crack", 0.9)];
        tracker.assign(&mut first);
        let mut second = vec![det(200.0, 200.0, "crack", 0.9)];
        tracker.assign(&mut second);

        assert_ne!(first[0].track_id, second[0].track_id);
    }

    #[test]
    fn labels_do_not_cross_match() {
        let mut tracker = TrackerState::new(TrackerKind::ByteTrack);

        let mut first = vec![det(10.0, 10.0, "crack", 0.9)];
        tracker.assign(&mut first);
        let mut second = vec![det(10.0, 10.0, "pothole", 0.9)];
        tracker.assign(&mut second);

        assert_ne!(first[0].track_id, second[0].track_id);
    }

    #[test]
    fn reset_restarts_identity_numbering() {
        let mut tracker = TrackerState::new(TrackerKind::BotSort);

        let mut first = vec![det(10.0, 10.0, "crack", 0.9)];
        tracker.assign(&mut first);
        tracker.reset();
        assert_eq!(tracker.track_count(), 0);

        let mut again = vec![det(10.0, 10.0, "crack", 0.9)];
        tracker.assign(&mut again);
        assert_eq!(again[0].track_id, Some(1));
    }

    #[test]
    fn unmatched_tracks_age_out() {
        let mut tracker = TrackerState::new(TrackerKind::ByteTrack);

        let mut first = vec![det(10.0, 10.0, "crack", 0.9)];
        tracker.assign(&mut first);
        assert_eq!(tracker.track_count(), 1);

        // Starve the track past its lost budget.
        for _ in 0..32 {
            tracker.assign(&mut []);
        }
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn independent_sessions_do_not_share_identities() {
        let mut a = TrackerState::new(TrackerKind::ByteTrack);
        let mut b = TrackerState::new(TrackerKind::ByteTrack);

        let mut in_a = vec![det(10.0, 10.0, "crack", 0.9)];
        a.assign(&mut in_a);
        let mut in_b = vec![det(300.0, 300.0, "pothole", 0.9)];
        b.assign(&mut in_b);

        // Each fresh session numbers from 1.
        assert_eq!(in_a[0].track_id, Some(1));
        assert_eq!(in_b[0].track_id, Some(1));
    }
}
