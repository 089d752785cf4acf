/// Frame-to-frame face tracker assigning stable tracking ids.
///
/// Two-stage association: high-confidence detections are matched to known
/// tracks first, then low-confidence detections fill remaining unmatched
/// tracks. This keeps ids stable through momentary confidence drops without
/// minting spurious ids from weak detections.
use std::collections::HashSet;

use crate::shared::geometry::Bounds;

const HIGH_THRESH: f64 = 0.5;
const MATCH_THRESH: f64 = 0.3;

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bounds: Bounds,
    frames_lost: usize,
    matched: bool,
}

pub struct FaceTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl FaceTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Assigns tracking ids to this frame's detections.
    ///
    /// `detections[i]` is the bounding box of face `i`, `scores[i]` its
    /// confidence. Returns one entry per detection: `Some(id)` when the face
    /// matched an existing track or opened a new one, `None` for unmatched
    /// low-confidence detections. Ids are never reused within a tracker.
    pub fn assign(&mut self, detections: &[Bounds], scores: &[f64]) -> Vec<Option<u32>> {
        debug_assert_eq!(detections.len(), scores.len());

        let (high, low) = split_by_confidence(detections, scores);

        for track in &mut self.tracks {
            track.matched = false;
        }
        let num_existing = self.tracks.len();
        let mut ids: Vec<Option<u32>> = vec![None; detections.len()];

        let matched_high = self.match_stage(&high, &mut ids);
        self.match_stage(&low, &mut ids);

        // Unmatched high-confidence detections open new tracks.
        for &(di, bounds) in &high {
            if !matched_high.contains(&di) && ids[di].is_none() {
                self.tracks.push(TrackState {
                    id: self.next_id,
                    bounds,
                    frames_lost: 0,
                    matched: true,
                });
                ids[di] = Some(self.next_id);
                self.next_id += 1;
            }
        }

        self.age_unmatched_tracks(num_existing);
        ids
    }

    fn match_stage(&mut self, dets: &[(usize, Bounds)], ids: &mut [Option<u32>]) -> HashSet<usize> {
        let track_refs: Vec<(usize, Bounds)> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.matched)
            .map(|(i, t)| (i, t.bounds))
            .collect();

        let mut matched_dets = HashSet::new();
        for (ti, di) in greedy_match(&track_refs, dets, MATCH_THRESH) {
            let bounds = dets.iter().find(|(i, _)| *i == di).map(|(_, b)| *b);
            if let Some(bounds) = bounds {
                self.tracks[ti].bounds = bounds;
                self.tracks[ti].frames_lost = 0;
                self.tracks[ti].matched = true;
                ids[di] = Some(self.tracks[ti].id);
                matched_dets.insert(di);
            }
        }
        matched_dets
    }

    fn age_unmatched_tracks(&mut self, num_existing: usize) {
        for track in self.tracks.iter_mut().take(num_existing) {
            if !track.matched {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);
    }
}

fn split_by_confidence(
    detections: &[Bounds],
    scores: &[f64],
) -> (Vec<(usize, Bounds)>, Vec<(usize, Bounds)>) {
    let mut high = Vec::new();
    let mut low = Vec::new();
    for (i, (&bounds, &score)) in detections.iter().zip(scores).enumerate() {
        if score >= HIGH_THRESH {
            high.push((i, bounds));
        } else {
            low.push((i, bounds));
        }
    }
    (high, low)
}

/// Greedy IoU matching: pairs sorted by descending IoU, each track/detection
/// used at most once.
fn greedy_match(
    tracks: &[(usize, Bounds)],
    dets: &[(usize, Bounds)],
    thresh: f64,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (ti, track_bounds) in tracks {
        for (di, det_bounds) in dets {
            let score = track_bounds.iou(det_bounds);
            if score >= thresh {
                pairs.push((*ti, *di, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_dets = HashSet::new();
    let mut matches = Vec::new();

    for (ti, di, _) in &pairs {
        if !used_tracks.contains(ti) && !used_dets.contains(di) {
            used_tracks.insert(*ti);
            used_dets.insert(*di);
            matches.push((*ti, *di));
        }
    }
    matches
}
