//! Multi-object tracker: per-frame coordination of prediction, cascaded
//! association, lifecycle updates and track creation.

use nalgebra::DMatrix;

use crate::assignment::HungarianSolver;
use crate::bbox::{BBox, Measurement};
use crate::kalman::{KalmanFilter, CHI2_INV_95};
use crate::track::{Track, TrackState};
use crate::{Error, Result};

/// Cost written into cells whose Mahalanobis distance fails the chi-square
/// gate. Any configuration must keep the acceptance threshold far below this
/// value so a gated pair can never be accepted.
const GATED_COST: f64 = 1e5;

/// Configuration for the tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Measurement updates needed before a tentative track is confirmed.
    pub n_init: u32,

    /// Consecutive misses a confirmed track survives. Also bounds the
    /// association cascade: tracks missed longer than this are never
    /// candidates again.
    pub max_age: u32,

    /// Boxes retained per track for the trace read surface.
    pub max_trace_length: usize,

    /// Matched cells at or above this cost are discarded after assignment.
    /// Must stay well below the gated-cell sentinel of `1e5`.
    pub max_match_distance: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            n_init: 3,
            max_age: 30,
            max_trace_length: 80,
            max_match_distance: 200.0,
        }
    }
}

/// Online multi-object tracker.
///
/// Driven synchronously, once per frame, through [`update`]. Tracks are
/// matched to detections by a cascade that prefers confirmed tracks and,
/// within each lifecycle state, recently updated tracks; pairs are gated on
/// the Mahalanobis distance in measurement space and matched by minimum
/// centre distance through the Hungarian solver.
///
/// [`update`]: Tracker::update
#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    filter: KalmanFilter,
    solver: HungarianSolver,
    tracks: Vec<Track>,
    next_id: u32,
}

impl Tracker {
    /// Create a tracker, validating the configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        if config.n_init == 0 {
            return Err(Error::InvalidConfig(
                "n_init must be at least 1".to_string(),
            ));
        }
        if config.max_age == 0 {
            return Err(Error::InvalidConfig(
                "max_age must be at least 1".to_string(),
            ));
        }
        if config.max_trace_length == 0 {
            return Err(Error::InvalidConfig(
                "max_trace_length must be at least 1".to_string(),
            ));
        }
        if !(config.max_match_distance > 0.0) {
            return Err(Error::InvalidConfig(
                "max_match_distance must be positive".to_string(),
            ));
        }
        if config.max_match_distance >= GATED_COST {
            return Err(Error::InvalidConfig(
                "max_match_distance must stay below the gated-cell cost".to_string(),
            ));
        }

        Ok(Self {
            config,
            filter: KalmanFilter::new(),
            solver: HungarianSolver::new(),
            tracks: Vec::new(),
            next_id: 1,
        })
    }

    /// Live tracks, tentative and confirmed. Deleted tracks are reaped at
    /// the end of every [`update`] and are never visible here.
    ///
    /// [`update`]: Tracker::update
    pub fn objects(&self) -> &[Track] {
        &self.tracks
    }

    /// Advance the tracker by one frame.
    ///
    /// Runs, in order: predict every track; associate detections through the
    /// matching cascade; fold matched detections into their tracks; mark the
    /// remaining tracks missed; create tentative tracks from the remaining
    /// detections; drop deleted tracks.
    ///
    /// An `Err` means a numeric invariant was broken (a covariance stopped
    /// being positive definite); the tracker should be discarded then.
    pub fn update(&mut self, detections: &[BBox]) -> Result<()> {
        for track in &mut self.tracks {
            track.predict(&self.filter);
        }

        let (matches, unmatched_tracks, unmatched_detections) = self.associate(detections)?;

        for &(track_index, detection_index) in &matches {
            self.tracks[track_index].update(&self.filter, &detections[detection_index])?;
        }
        for &track_index in &unmatched_tracks {
            self.tracks[track_index].mark_missed();
        }
        for &detection_index in &unmatched_detections {
            self.initiate_track(detections[detection_index]);
        }

        self.tracks.retain(|track| !track.is_deleted());
        Ok(())
    }

    /// Cascaded association: confirmed tracks first, then tentative ones,
    /// each group scanned by miss streak so recently seen tracks get first
    /// claim on detections.
    #[allow(clippy::type_complexity)]
    fn associate(
        &mut self,
        detections: &[BBox],
    ) -> Result<(Vec<(usize, usize)>, Vec<usize>, Vec<usize>)> {
        let mut unmatched_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let mut unmatched_detections: Vec<usize> = (0..detections.len()).collect();
        let mut matches = Vec::new();

        for state in [TrackState::Confirmed, TrackState::Tentative] {
            for level in 0..self.config.max_age {
                if unmatched_tracks.is_empty() || unmatched_detections.is_empty() {
                    break;
                }

                let candidates: Vec<usize> = unmatched_tracks
                    .iter()
                    .copied()
                    .filter(|&index| {
                        self.tracks[index].state() == state
                            && self.tracks[index].time_since_update() == level + 1
                    })
                    .collect();
                if candidates.is_empty() {
                    continue;
                }

                let level_matches =
                    self.match_candidates(&candidates, &unmatched_detections, detections)?;

                for &(track_index, detection_index) in &level_matches {
                    unmatched_tracks.retain(|&index| index != track_index);
                    unmatched_detections.retain(|&index| index != detection_index);
                }
                matches.extend(level_matches);
            }
        }

        Ok((matches, unmatched_tracks, unmatched_detections))
    }

    /// Build the gated cost matrix for one cascade level and solve it.
    ///
    /// Cells failing the 4-dof chi-square gate get the sentinel cost; the
    /// rest carry the Euclidean centre distance in pixels. Assigned cells at
    /// or above the acceptance threshold are discarded, which keeps gated
    /// pairs from ever matching.
    fn match_candidates(
        &mut self,
        candidates: &[usize],
        remaining: &[usize],
        detections: &[BBox],
    ) -> Result<Vec<(usize, usize)>> {
        let mut costs = DMatrix::zeros(candidates.len(), remaining.len());
        for (row, &track_index) in candidates.iter().enumerate() {
            let track = &self.tracks[track_index];
            for (col, &detection_index) in remaining.iter().enumerate() {
                let detection = &detections[detection_index];
                let distance = self.filter.gating_distance(
                    track.mean(),
                    track.covariance(),
                    &Measurement::from(detection),
                    false,
                )?;

                costs[(row, col)] = if distance > CHI2_INV_95[3] {
                    GATED_COST
                } else {
                    track.last_position().center_distance(detection)
                };
            }
        }

        let assignment = self.solver.solve(&costs)?;

        Ok(assignment
            .pairs()
            .filter(|&(row, col)| costs[(row, col)] < self.config.max_match_distance)
            .map(|(row, col)| (candidates[row], remaining[col]))
            .collect())
    }

    fn initiate_track(&mut self, detection: BBox) {
        let (mean, covariance) = self.filter.initiate(&Measurement::from(&detection));
        self.tracks.push(Track::new(
            mean,
            covariance,
            detection,
            self.next_id,
            self.config.n_init,
            self.config.max_age,
            self.config.max_trace_length,
        ));
        self.next_id += 1;
    }
}
