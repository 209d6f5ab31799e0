//! Per-object track state: kinematics, lifecycle and recent history.

use std::collections::VecDeque;

use log::warn;

use crate::bbox::{BBox, Measurement, Point};
use crate::kalman::{KalmanFilter, StateCovariance, StateMean};
use crate::Result;

/// Width of the centred moving average applied by [`Track::trace_line`].
const TRACE_SMOOTHING_WINDOW: usize = 5;

/// Lifecycle state of a single track.
///
/// Newly created tracks are `Tentative` until enough consecutive hits have
/// been collected, then become `Confirmed`. Tracks that are no longer alive
/// are `Deleted`, which marks them for removal from the tracker's table; a
/// deleted track is never observable from outside the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

/// A single tracked object.
///
/// Owns the Kalman `(mean, covariance)` pair, the lifecycle state, the
/// bookkeeping counters and a bounded trace of recently associated boxes
/// (oldest at the front). All mutation goes through [`predict`],
/// [`update`] and [`mark_missed`], driven by the tracker.
///
/// [`predict`]: Track::predict
/// [`update`]: Track::update
/// [`mark_missed`]: Track::mark_missed
#[derive(Debug, Clone)]
pub struct Track {
    id: u32,
    state: TrackState,
    age: u32,
    hits: u32,
    time_since_update: u32,
    last_position: BBox,
    trace: VecDeque<BBox>,
    mean: StateMean,
    covariance: StateCovariance,
    n_init: u32,
    max_age: u32,
    max_trace_length: usize,
}

impl Track {
    pub(crate) fn new(
        mean: StateMean,
        covariance: StateCovariance,
        detection: BBox,
        id: u32,
        n_init: u32,
        max_age: u32,
        max_trace_length: usize,
    ) -> Self {
        let mut trace = VecDeque::new();
        trace.push_back(detection);

        Self {
            id,
            state: TrackState::Tentative,
            age: 1,
            hits: 1,
            time_since_update: 0,
            last_position: detection,
            trace,
            mean,
            covariance,
            n_init,
            max_age,
            max_trace_length,
        }
    }

    /// Stable identifier, assigned once at creation, starting from 1.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    #[inline]
    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    /// Frames since this track was created.
    #[inline]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Number of measurement updates received.
    #[inline]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Frames since the last measurement update.
    #[inline]
    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    /// The most recently associated detection box.
    #[inline]
    pub fn last_position(&self) -> BBox {
        self.last_position
    }

    #[inline]
    pub fn mean(&self) -> &StateMean {
        &self.mean
    }

    #[inline]
    pub fn covariance(&self) -> &StateCovariance {
        &self.covariance
    }

    /// Bounding box reconstructed from the current state estimate.
    pub fn predict_box(&self) -> BBox {
        let center_x = self.mean[0];
        let center_y = self.mean[1];
        let height = self.mean[3];
        let width = self.mean[2] * height;

        BBox::new(
            center_x - width / 2.0,
            center_y - height / 2.0,
            center_x + width / 2.0,
            center_y + height / 2.0,
        )
    }

    /// Number of boxes currently retained in the trace.
    #[inline]
    pub fn trace_size(&self) -> usize {
        self.trace.len()
    }

    /// The box associated `steps_back` updates ago (0 is the most recent).
    ///
    /// Out-of-range lookups log a diagnostic and return [`BBox::EMPTY`].
    pub fn location(&self, steps_back: usize) -> BBox {
        match self
            .trace
            .len()
            .checked_sub(1 + steps_back)
            .and_then(|index| self.trace.get(index))
        {
            Some(bbox) => *bbox,
            None => {
                warn!(
                    "trace lookup {} out of range for track {} (size {})",
                    steps_back,
                    self.id,
                    self.trace.len()
                );
                BBox::EMPTY
            }
        }
    }

    /// Smoothed polyline over the trace, for display.
    ///
    /// Each vertex is the centred moving average (window 5) of
    /// `(center x, bottom)` over the retained boxes, oldest first.
    pub fn trace_line(&self) -> Vec<Point> {
        let count = self.trace.len();
        let half = TRACE_SMOOTHING_WINDOW / 2;

        (0..count)
            .map(|i| {
                let begin = i.saturating_sub(half);
                let end = (i + half + 1).min(count);
                let mut x = 0.0;
                let mut y = 0.0;
                for j in begin..end {
                    x += self.trace[j].center().x;
                    y += self.trace[j].bottom;
                }
                let n = (end - begin) as f64;
                Point::new(x / n, y / n)
            })
            .collect()
    }

    /// Propagate the state distribution one time step forward.
    pub(crate) fn predict(&mut self, kf: &KalmanFilter) {
        kf.predict(&mut self.mean, &mut self.covariance);
        self.age += 1;
        self.time_since_update += 1;
    }

    /// Fold an associated detection into the state and history; promotes a
    /// tentative track once it has collected enough hits.
    pub(crate) fn update(&mut self, kf: &KalmanFilter, detection: &BBox) -> Result<()> {
        self.trace.push_back(*detection);
        while self.trace.len() > self.max_trace_length {
            self.trace.pop_front();
        }

        kf.update(
            &Measurement::from(detection),
            &mut self.mean,
            &mut self.covariance,
        )?;

        self.last_position = *detection;
        self.hits += 1;
        self.time_since_update = 0;

        if self.state == TrackState::Tentative && self.hits >= self.n_init {
            self.state = TrackState::Confirmed;
        }

        Ok(())
    }

    /// Note that no detection was associated this frame. A tentative track
    /// dies immediately; a confirmed one survives `max_age` misses.
    pub(crate) fn mark_missed(&mut self) {
        if self.state == TrackState::Tentative || self.time_since_update > self.max_age {
            self.state = TrackState::Deleted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_track(detection: BBox) -> (Track, KalmanFilter) {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate(&Measurement::from(&detection));
        (Track::new(mean, covariance, detection, 1, 3, 30, 80), kf)
    }

    #[test]
    fn test_new_track_is_tentative() {
        let detection = BBox::new(0.0, 0.0, 10.0, 20.0);
        let (track, _) = make_track(detection);

        assert_eq!(track.id(), 1);
        assert_eq!(track.state(), TrackState::Tentative);
        assert_eq!(track.age(), 1);
        assert_eq!(track.hits(), 1);
        assert_eq!(track.time_since_update(), 0);
        assert_eq!(track.trace_size(), 1);
        assert_eq!(track.last_position(), detection);
    }

    #[test]
    fn test_predict_advances_counters() {
        let (mut track, kf) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));

        track.predict(&kf);

        assert_eq!(track.age(), 2);
        assert_eq!(track.time_since_update(), 1);
    }

    #[test]
    fn test_promotion_after_three_hits() {
        let (mut track, kf) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));

        track.predict(&kf);
        track.update(&kf, &BBox::new(1.0, 1.0, 11.0, 21.0)).unwrap();
        assert_eq!(track.state(), TrackState::Tentative);
        assert_eq!(track.hits(), 2);

        track.predict(&kf);
        track.update(&kf, &BBox::new(2.0, 2.0, 12.0, 22.0)).unwrap();
        assert_eq!(track.state(), TrackState::Confirmed);
        assert_eq!(track.hits(), 3);
        assert_eq!(track.time_since_update(), 0);
    }

    #[test]
    fn test_mark_missed_deletes_tentative() {
        let (mut track, kf) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));

        track.predict(&kf);
        track.mark_missed();

        assert!(track.is_deleted());
    }

    #[test]
    fn test_confirmed_survives_until_max_age() {
        let (mut track, kf) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));
        for step in 1..3 {
            track.predict(&kf);
            track
                .update(&kf, &BBox::new(step as f64, step as f64, 10.0, 20.0))
                .unwrap();
        }
        assert!(track.is_confirmed());

        for _ in 0..30 {
            track.predict(&kf);
            track.mark_missed();
        }
        assert!(track.is_confirmed());
        assert_eq!(track.time_since_update(), 30);

        track.predict(&kf);
        track.mark_missed();
        assert!(track.is_deleted());
    }

    #[test]
    fn test_trace_is_bounded() {
        let (mut track, kf) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));

        for i in 0..100 {
            track.predict(&kf);
            let offset = i as f64;
            track
                .update(
                    &kf,
                    &BBox::new(offset, offset, offset + 10.0, offset + 20.0),
                )
                .unwrap();
        }

        assert_eq!(track.trace_size(), 80);
        // Oldest entries were dropped from the front: the most recent box is
        // at the back, reachable as location(0).
        assert_eq!(
            track.location(0),
            BBox::new(99.0, 99.0, 109.0, 119.0)
        );
        assert_eq!(
            track.location(79),
            BBox::new(20.0, 20.0, 30.0, 40.0)
        );
    }

    #[test]
    fn test_location_out_of_range_is_sentinel() {
        let (track, _) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));

        assert_eq!(track.location(0), BBox::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(track.location(1), BBox::EMPTY);
        assert_eq!(track.location(100), BBox::EMPTY);
    }

    #[test]
    fn test_predict_box_matches_initiation() {
        let detection = BBox::new(100.0, 100.0, 120.0, 140.0);
        let (track, _) = make_track(detection);

        let predicted = track.predict_box();
        assert_relative_eq!(predicted.left, 100.0, epsilon = 1e-9);
        assert_relative_eq!(predicted.top, 100.0, epsilon = 1e-9);
        assert_relative_eq!(predicted.right, 120.0, epsilon = 1e-9);
        assert_relative_eq!(predicted.bottom, 140.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trace_line_smooths_constant_motion() {
        let (mut track, kf) = make_track(BBox::new(0.0, 0.0, 10.0, 20.0));
        for i in 1..10 {
            track.predict(&kf);
            let offset = i as f64;
            track
                .update(
                    &kf,
                    &BBox::new(offset, offset, offset + 10.0, offset + 20.0),
                )
                .unwrap();
        }

        let line = track.trace_line();
        assert_eq!(line.len(), track.trace_size());

        // On a straight constant-velocity trace the smoothed interior points
        // coincide with the raw (center x, bottom) samples.
        for (i, point) in line.iter().enumerate().take(line.len() - 2).skip(2) {
            let offset = i as f64;
            assert_relative_eq!(point.x, offset + 5.0, epsilon = 1e-9);
            assert_relative_eq!(point.y, offset + 20.0, epsilon = 1e-9);
        }
    }
}
