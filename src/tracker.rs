// src/tracker.rs
//
// Cross-frame droplet identity resolution.
//
// Every frame's droplets are registered as current, last frame's current
// set becomes matchable history, and history entries age out after a
// configurable number of frames without a sighting. Matching is greedy:
// pairs are tried in order of centroid distance, each pair is scored by
// distance times shape dissimilarity, and a pair survives only if that
// confidence product and the raw distance both clear their thresholds.
// A match rewrites the newcomer's id in the catalog and republishes the
// surviving id in the current registry, so downstream consumers only ever
// see resolved ids.
//
// Design:
//   - Registries hold ids; the catalog owns the droplets
//   - Greedy nearest-first matching, one match per droplet per frame
//   - Ties break on registry order, so reruns are repeatable
//   - Operator corrections can suppress, redirect, or force connections

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::catalog::VideoCatalog;
use crate::corrections::{Correction, CorrectionMap};
use crate::geometry::{distance, log_transform, Point};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Frames a droplet stays matchable without a new sighting
    pub frames_before_deregister: u32,
    /// Ceiling on distance x dissimilarity for an acceptable match
    pub confidence_threshold: f64,
    /// Ceiling on centroid travel between sightings, in pixels
    pub distance_threshold: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            frames_before_deregister: 1,
            confidence_threshold: 30.0, // distance * similarity product
            distance_threshold: 40.0,   // px
        }
    }
}

// ============================================================================
// SHAPE COMPARISON
// ============================================================================

/// Raw shape dissimilarity between two contours, 0 = identical. The
/// production implementation wraps OpenCV's Hu-moment match score; tests
/// inject fixed-value comparators.
pub trait ShapeComparator {
    fn dissimilarity(&self, a: &[Point], b: &[Point]) -> Result<f64>;
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct Tracker {
    /// Droplets registered this frame: registered id -> initial id.
    current: IndexMap<u32, u32>,
    /// Recent droplets awaiting a re-sighting: registered id -> initial id.
    history: IndexMap<u32, u32>,
    /// Frames since last sighting, keyed by registered id.
    aging: IndexMap<u32, u32>,
    /// Initial ids staged for registration this frame.
    candidate: Vec<u32>,
    corrections: CorrectionMap,
    comparator: Box<dyn ShapeComparator>,
    config: TrackerConfig,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        corrections: CorrectionMap,
        comparator: Box<dyn ShapeComparator>,
    ) -> Self {
        Self {
            current: IndexMap::new(),
            history: IndexMap::new(),
            aging: IndexMap::new(),
            candidate: Vec::new(),
            corrections,
            comparator,
            config,
        }
    }

    /// Resolved ids registered for the latest frame, in registry order.
    pub fn current_ids(&self) -> Vec<u32> {
        self.current.keys().copied().collect()
    }

    /// Ids still matchable from recent frames.
    pub fn history_ids(&self) -> Vec<u32> {
        self.history.keys().copied().collect()
    }

    /// Forget everything. Used when a threshold change rebuilds the
    /// catalog, and before reprocessing a frame, so stale registrations
    /// can't match a frame against itself.
    pub fn reset(&mut self) {
        self.current.clear();
        self.history.clear();
        self.aging.clear();
        self.candidate.clear();
    }

    /// Run one frame through the tracker: age out stale history, register
    /// this frame's droplets, match them against history, apply operator
    /// corrections, and commit the surviving connections to the catalog.
    ///
    /// Returns the frame's droplet ids after resolution, in registry
    /// order. A resolved duplicate comes back under its predecessor's id.
    pub fn update(
        &mut self,
        catalog: &mut VideoCatalog,
        frame_droplet_ids: &[u32],
        this_frame: usize,
    ) -> Result<Vec<u32>> {
        // Forced corrections below run even when no matching happened, so
        // the matched map has to exist either way.
        let mut matched_ids: IndexMap<u32, u32> = IndexMap::new();

        self.candidate = frame_droplet_ids.to_vec();

        // Age everything we're still holding. Last frame's droplets go to 1.
        for age in self.aging.values_mut() {
            *age += 1;
        }

        // Retire history entries past the age limit.
        let expired: Vec<u32> = self
            .aging
            .iter()
            .filter(|(_, age)| **age > self.config.frames_before_deregister)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            debug!("🗑️ droplet {} aged out of history", id);
            self.deregister(id);
        }

        // Last frame's current set becomes matchable history. The current
        // registry must be empty before this frame's droplets register;
        // anything left over is a bookkeeping defect, not bad input.
        for (id, initial) in self.current.drain(..) {
            self.history.insert(id, initial);
        }
        if !self.current.is_empty() {
            bail!(
                "droplet registry out of order: {} entries still current entering frame {}",
                self.current.len(),
                this_frame
            );
        }

        // Register this frame's droplets, keyed by each droplet's catalog
        // id. On a plain first pass that's the initial id.
        for initial_id in std::mem::take(&mut self.candidate) {
            if let Some(droplet) = catalog.droplet(initial_id) {
                self.current.insert(droplet.id(), initial_id);
                self.aging.insert(droplet.id(), 0);
            }
        }

        // A comparison only makes sense with droplets on both sides.
        if !self.current.is_empty() && !self.history.is_empty() {
            let current_entries: Vec<(u32, u32)> =
                self.current.iter().map(|(&k, &v)| (k, v)).collect();
            let history_entries: Vec<(u32, u32)> =
                self.history.iter().map(|(&k, &v)| (k, v)).collect();

            // ════════════════════════════════════════════════════════════
            // PHASE 1: DISTANCE AND SIMILARITY MATRICES
            //
            // Rows are history droplets, columns are current ones.
            // Similarity is the magnitude of the log-rescaled match score;
            // scores in the 308 band come from subnormal raw values on
            // contours too small for moments, and get a workable stand-in.
            // ════════════════════════════════════════════════════════════
            let rows = history_entries.len();
            let cols = current_entries.len();

            let history_centroids = self.registry_centroids(&history_entries, catalog)?;
            let current_centroids = self.registry_centroids(&current_entries, catalog)?;

            let mut distances = vec![vec![0.0f64; cols]; rows];
            for (r, hc) in history_centroids.iter().enumerate() {
                for (c, cc) in current_centroids.iter().enumerate() {
                    distances[r][c] = distance(*hc, *cc);
                }
            }

            let mut similarity = vec![vec![0.0f64; cols]; rows];
            for (r, &(_, history_initial)) in history_entries.iter().enumerate() {
                let history_droplet = catalog
                    .droplet(history_initial)
                    .with_context(|| format!("droplet {} missing from catalog", history_initial))?;
                for (c, &(_, current_initial)) in current_entries.iter().enumerate() {
                    let current_droplet = catalog.droplet(current_initial).with_context(|| {
                        format!("droplet {} missing from catalog", current_initial)
                    })?;
                    let raw = self
                        .comparator
                        .dissimilarity(history_droplet.contour(), current_droplet.contour())?;
                    let mut score = log_transform(raw).abs();
                    if score > 308.0 && score < 308.5 {
                        score = 0.5;
                    }
                    similarity[r][c] = score;
                }
            }

            // ════════════════════════════════════════════════════════════
            // PHASE 2: GREEDY MATCHING
            //
            // Rows are tried best-distance first; each row brings its
            // closest column. Stable sort plus first-occurrence argmin
            // keeps tie handling repeatable across runs.
            // ════════════════════════════════════════════════════════════
            let row_min: Vec<f64> = distances
                .iter()
                .map(|row| row.iter().copied().fold(f64::INFINITY, f64::min))
                .collect();
            let mut row_order: Vec<usize> = (0..rows).collect();
            row_order.sort_by(|&a, &b| {
                row_min[a]
                    .partial_cmp(&row_min[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let col_pick: Vec<usize> = row_order.iter().map(|&r| argmin(&distances[r])).collect();

            for (&r, &c) in row_order.iter().zip(col_pick.iter()) {
                debug!(
                    "candidate pair: old {} / new {}, {:.2}px, similarity {:.2}",
                    history_entries[r].0, current_entries[c].0, distances[r][c], similarity[r][c]
                );
            }

            let mut used_rows = vec![false; rows];
            let mut used_cols = vec![false; cols];

            for (&row, &column) in row_order.iter().zip(col_pick.iter()) {
                if used_rows[row] || used_cols[column] {
                    continue;
                }

                let similarity_factor = similarity[row][column];
                let confidence = distances[row][column] * similarity_factor;
                let original_droplet_id = history_entries[row].0;
                let new_droplet_id = current_entries[column].0;

                if confidence > self.config.confidence_threshold {
                    // Not a winner. This droplet isn't one we've seen before.
                    info!(
                        "Confidence: - {:.2} - Droplets {} and {} are {:.2} pixels apart, similarity = {:.2}",
                        confidence,
                        original_droplet_id,
                        new_droplet_id,
                        distances[row][column],
                        similarity_factor
                    );
                } else if distances[row][column] > self.config.distance_threshold {
                    info!(
                        "Droplets {} and {} are {:.2} pixels apart, greater than threshold of {}",
                        original_droplet_id,
                        new_droplet_id,
                        distances[row][column],
                        self.config.distance_threshold
                    );
                } else {
                    info!(
                        "Confidence: + {:.2} - Droplets {} and {} are {:.2} pixels apart, similarity = {:.2}",
                        confidence,
                        original_droplet_id,
                        new_droplet_id,
                        distances[row][column],
                        similarity_factor
                    );
                    matched_ids.insert(new_droplet_id, original_droplet_id);
                    used_rows[row] = true;
                    used_cols[column] = true;
                }
            }

            // ════════════════════════════════════════════════════════════
            // PHASE 3: CORRECTIONS ON MATCHES, THEN COMMITS
            //
            // An operator can veto a match outright or point the droplet
            // at a different predecessor before the connection lands.
            // ════════════════════════════════════════════════════════════
            let matches: Vec<(u32, u32)> = matched_ids.iter().map(|(&n, &o)| (n, o)).collect();
            for (new_droplet_id, matched_original) in matches {
                let mut original_droplet_id = matched_original;
                match self.corrections.get(&new_droplet_id) {
                    Some(Correction::Suppress) => {
                        info!(
                            "Droplet correction: droplet {} will *not* be connected to droplet {}",
                            new_droplet_id, original_droplet_id
                        );
                        continue;
                    }
                    Some(Correction::LinkTo(target)) if *target != original_droplet_id => {
                        info!(
                            "Droplet correction: droplet {} will be connected to droplet {} instead of {}",
                            new_droplet_id, target, original_droplet_id
                        );
                        original_droplet_id = *target;
                    }
                    _ => {}
                }
                self.process_droplet_connection(catalog, new_droplet_id, original_droplet_id)?;
            }
        }

        // Forced connections: corrections naming a droplet of this frame
        // that the matcher didn't pair with anything.
        let frame_ids: Vec<u32> = catalog.frame_droplet_ids(this_frame).to_vec();
        let forced: Vec<(u32, Correction)> =
            self.corrections.iter().map(|(&id, &c)| (id, c)).collect();
        for (new_droplet_id, correction) in forced {
            if !frame_ids.contains(&new_droplet_id) || matched_ids.contains_key(&new_droplet_id) {
                continue;
            }
            match correction {
                Correction::Suppress => {
                    // A suppression can only veto a match; there's nothing
                    // here to suppress.
                    warn!(
                        "Droplet correction oops: droplet {} doesn't have a prior connection.",
                        new_droplet_id
                    );
                }
                Correction::LinkTo(target) => {
                    info!(
                        "Droplet correction: droplet {} will be connected to droplet {}.",
                        new_droplet_id, target
                    );
                    self.process_droplet_connection(catalog, new_droplet_id, target)?;
                }
            }
        }

        Ok(self.current_ids())
    }

    /// Commit one connection: the catalog droplet gains a sighting, the
    /// newcomer takes the surviving id, and the registries swap the new
    /// registration for one under the original id.
    fn process_droplet_connection(
        &mut self,
        catalog: &mut VideoCatalog,
        new_droplet_id: u32,
        original_droplet_id: u32,
    ) -> Result<()> {
        let incoming_initial = match self.current.get(&new_droplet_id) {
            Some(&initial) => initial,
            None => {
                warn!(
                    "Droplet correction oops: droplet {} isn't in play in this frame, skipping connection to droplet {}.",
                    new_droplet_id, original_droplet_id
                );
                return Ok(());
            }
        };
        let original_frame = match catalog.droplet(original_droplet_id) {
            Some(droplet) => droplet.frame(),
            None => {
                warn!(
                    "Droplet correction oops: droplet {} isn't in the catalog, skipping connection from droplet {}.",
                    original_droplet_id, new_droplet_id
                );
                return Ok(());
            }
        };

        info!(
            "New droplet {} is the same as droplet {} from frame {}.",
            new_droplet_id, original_droplet_id, original_frame
        );

        // Add the new location data to the original droplet and renumber
        // the duplicate.
        catalog.relocate(original_droplet_id, incoming_initial);
        catalog.set_droplet_id(incoming_initial, original_droplet_id);

        // Move the historical droplet up to current under its old number
        // and erase most traces of the new one.
        self.deregister(original_droplet_id);
        self.current.insert(original_droplet_id, incoming_initial);
        self.aging.insert(original_droplet_id, 0);
        self.current.shift_remove(&new_droplet_id);
        self.aging.shift_remove(&new_droplet_id);

        Ok(())
    }

    fn deregister(&mut self, id: u32) {
        self.history.shift_remove(&id);
        self.aging.shift_remove(&id);
    }

    fn registry_centroids(
        &self,
        entries: &[(u32, u32)],
        catalog: &VideoCatalog,
    ) -> Result<Vec<(f64, f64)>> {
        entries
            .iter()
            .map(|&(_, initial)| {
                catalog
                    .droplet(initial)
                    .map(|d| d.centroid())
                    .with_context(|| format!("droplet {} missing from catalog", initial))
            })
            .collect()
    }
}

/// Index of the smallest value, first occurrence on ties.
fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always reports the same raw dissimilarity, whatever the contours.
    struct FixedComparator {
        raw: f64,
    }

    impl ShapeComparator for FixedComparator {
        fn dissimilarity(&self, _a: &[Point], _b: &[Point]) -> Result<f64> {
            Ok(self.raw)
        }
    }

    fn square(x: i32, y: i32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + 4, y),
            Point::new(x + 4, y + 4),
            Point::new(x, y + 4),
        ]
    }

    /// Raw score whose log-rescaled magnitude is `s`.
    fn raw_for_similarity(s: f64) -> f64 {
        10f64.powf(-s)
    }

    fn tracker_with(corrections: CorrectionMap, raw: f64) -> Tracker {
        Tracker::new(
            TrackerConfig::default(),
            corrections,
            Box::new(FixedComparator { raw }),
        )
    }

    /// Catalog with one droplet per (frame, position) entry.
    fn catalog_of(frames: &[Vec<(i32, i32)>]) -> VideoCatalog {
        let mut catalog = VideoCatalog::new();
        for (index, positions) in frames.iter().enumerate() {
            catalog.add_frame(index);
            for &(x, y) in positions {
                catalog.add_droplet(index, square(x, y), 25);
            }
        }
        catalog
    }

    #[test]
    fn test_nearby_similar_droplet_resolves_to_predecessor() {
        // similarity 3.0, distance ~2.8: confidence well under 30.
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(12, 12)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(3.0));

        let frame0 = tracker.update(&mut catalog, &[1], 0).unwrap();
        assert_eq!(frame0, vec![1]);

        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();
        assert_eq!(frame1, vec![1], "duplicate should come back as droplet 1");

        let original = catalog.droplet(1).unwrap();
        assert_eq!(original.generations(), 2);
        assert_eq!(original.frame(), 1);
        assert_eq!(original.initial_id(), 2);
        assert_eq!(catalog.droplet(2).unwrap().id(), 1);
    }

    #[test]
    fn test_low_confidence_rejected() {
        // similarity 3.0 at ~28px: confidence ~85 exceeds the threshold.
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(30, 30)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();

        assert_eq!(frame1, vec![2], "droplet should stay itself");
        assert_eq!(catalog.droplet(1).unwrap().generations(), 1);
    }

    #[test]
    fn test_distance_gate_rejects_even_when_confident() {
        // similarity 0.5 at 50px: confidence 25 passes, distance doesn't.
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(60, 10)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(0.5));

        tracker.update(&mut catalog, &[1], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();

        assert_eq!(frame1, vec![2]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 1);
    }

    #[test]
    fn test_history_ages_out_after_gap() {
        // One empty frame is enough to retire history at the default
        // one-frame memory.
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![], vec![(10, 10)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[], 1).unwrap();
        assert!(frame1.is_empty());

        let frame2 = tracker.update(&mut catalog, &[2], 2).unwrap();
        assert_eq!(frame2, vec![2], "expired droplet must not match");
        assert!(tracker.history_ids().is_empty());
    }

    #[test]
    fn test_longer_memory_survives_gap() {
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![], vec![(12, 12)]]);
        let config = TrackerConfig {
            frames_before_deregister: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = Tracker::new(
            config,
            CorrectionMap::new(),
            Box::new(FixedComparator {
                raw: raw_for_similarity(3.0),
            }),
        );

        tracker.update(&mut catalog, &[1], 0).unwrap();
        tracker.update(&mut catalog, &[], 1).unwrap();
        let frame2 = tracker.update(&mut catalog, &[2], 2).unwrap();

        assert_eq!(frame2, vec![1]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 2);
    }

    #[test]
    fn test_greedy_matching_is_one_to_one() {
        let mut catalog = catalog_of(&[vec![(0, 0), (100, 0)], vec![(2, 0), (98, 0)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1, 2], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[3, 4], 1).unwrap();

        assert_eq!(frame1, vec![1, 2]);
        assert_eq!(catalog.droplet(1).unwrap().frame(), 1);
        assert_eq!(catalog.droplet(1).unwrap().initial_id(), 3);
        assert_eq!(catalog.droplet(2).unwrap().initial_id(), 4);
    }

    #[test]
    fn test_equidistant_predecessors_pick_registry_order() {
        // Both history droplets are 10px away; the earlier registration
        // wins, and reruns agree.
        let mut catalog = catalog_of(&[vec![(0, 0), (20, 0)], vec![(10, 0)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1, 2], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[3], 1).unwrap();

        assert_eq!(frame1, vec![1]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 2);
        assert_eq!(catalog.droplet(2).unwrap().generations(), 1);
    }

    #[test]
    fn test_suppression_vetoes_match() {
        let mut corrections = CorrectionMap::new();
        corrections.insert(2, Correction::Suppress);
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(12, 12)]]);
        let mut tracker = tracker_with(corrections, raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();

        assert_eq!(frame1, vec![2]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 1);
        assert_eq!(catalog.droplet(2).unwrap().id(), 2);
    }

    #[test]
    fn test_redirect_overrides_matched_predecessor() {
        // Droplet 3 would match droplet 2 on distance; the correction
        // sends it to droplet 1 instead.
        let mut corrections = CorrectionMap::new();
        corrections.insert(3, Correction::LinkTo(1));
        let mut catalog = catalog_of(&[vec![(200, 200), (10, 10)], vec![(12, 12)]]);
        let mut tracker = tracker_with(corrections, raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1, 2], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[3], 1).unwrap();

        assert_eq!(frame1, vec![1]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 2);
        assert_eq!(catalog.droplet(1).unwrap().frame(), 1);
        assert_eq!(catalog.droplet(2).unwrap().generations(), 1);
        assert_eq!(catalog.droplet(3).unwrap().id(), 1);
    }

    #[test]
    fn test_forced_connection_without_match() {
        // Too far to match on its own; the correction forces the link.
        let mut corrections = CorrectionMap::new();
        corrections.insert(2, Correction::LinkTo(1));
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(500, 500)]]);
        let mut tracker = tracker_with(corrections, raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();

        assert_eq!(frame1, vec![1]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 2);
        assert_eq!(catalog.droplet(1).unwrap().frame(), 1);
    }

    #[test]
    fn test_forced_connection_to_unknown_target_is_skipped() {
        let mut corrections = CorrectionMap::new();
        corrections.insert(1, Correction::LinkTo(99));
        let mut catalog = catalog_of(&[vec![(10, 10)]]);
        let mut tracker = tracker_with(corrections, raw_for_similarity(3.0));

        let frame0 = tracker.update(&mut catalog, &[1], 0).unwrap();

        assert_eq!(frame0, vec![1]);
        assert_eq!(catalog.droplet(1).unwrap().id(), 1);
    }

    #[test]
    fn test_unmatched_suppression_leaves_droplet_alone() {
        let mut corrections = CorrectionMap::new();
        corrections.insert(1, Correction::Suppress);
        let mut catalog = catalog_of(&[vec![(10, 10)]]);
        let mut tracker = tracker_with(corrections, raw_for_similarity(3.0));

        let frame0 = tracker.update(&mut catalog, &[1], 0).unwrap();

        assert_eq!(frame0, vec![1]);
        assert_eq!(catalog.droplet(1).unwrap().generations(), 1);
    }

    #[test]
    fn test_reset_clears_matchable_history() {
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(12, 12)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), raw_for_similarity(3.0));

        tracker.update(&mut catalog, &[1], 0).unwrap();
        tracker.reset();
        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();

        assert_eq!(frame1, vec![2], "no history to match after a reset");
        assert!(tracker.history_ids().is_empty());
    }

    #[test]
    fn test_tiny_contour_similarity_band_stands_in() {
        // Subnormal raw scores land near 308 after the log rescale and
        // get replaced with 0.5, close enough to match on distance.
        let mut catalog = catalog_of(&[vec![(10, 10)], vec![(12, 12)]]);
        let mut tracker = tracker_with(CorrectionMap::new(), 5.0e-309);

        tracker.update(&mut catalog, &[1], 0).unwrap();
        let frame1 = tracker.update(&mut catalog, &[2], 1).unwrap();

        assert_eq!(frame1, vec![1]);
    }
}
