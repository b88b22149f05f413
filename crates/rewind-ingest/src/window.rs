//! Outer-frame look-behind window.
//!
//! Outer ticks and solver frames arrive interleaved and out of step, so
//! outer frames wait in a short queue before they are committed. While
//! queued they can still be closed, and leading frames that never saw
//! solver data can be dropped.

use std::collections::VecDeque;

use rewind_core::{Cycle, OuterFrame};
use rewind_store::Recording;
use tracing::{debug, trace};

/// Committed frames remembered for late ends and tail closes.
const RECENT_COMMITTED: usize = 16;

/// What happened to outer frames leaving the window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Frames appended to the recording.
    pub committed: usize,
    /// Frames dropped by the trimming rule.
    pub discarded: usize,
}

impl WindowOutcome {
    fn add(&mut self, committed: bool) {
        if committed {
            self.committed += 1;
        } else {
            self.discarded += 1;
        }
    }
}

/// Bounded FIFO of outer frames not yet committed.
///
/// The window also remembers the `(first_cycle, start_time)` of the
/// frames it committed most recently. Late ends and tail closes touch
/// only those, never outer frames another session added to a shared
/// recording.
#[derive(Debug)]
pub struct OuterFrameWindow {
    queue: VecDeque<OuterFrame>,
    depth: usize,
    trim_empty: bool,
    committed_any: bool,
    recent: VecDeque<(Cycle, f64)>,
}

impl OuterFrameWindow {
    /// A window holding at most `depth` frames.
    pub fn new(depth: usize, trim_empty: bool) -> Self {
        Self {
            queue: VecDeque::with_capacity(depth + 1),
            depth,
            trim_empty,
            committed_any: false,
            recent: VecDeque::with_capacity(RECENT_COMMITTED),
        }
    }

    /// Treat earlier outer frames as already committed, so none of the
    /// frames this window settles counts as leading.
    ///
    /// Used when attaching to a recording that already has outer frames.
    pub fn with_prior_frames(mut self, prior: bool) -> Self {
        self.committed_any |= prior;
        self
    }

    /// Queue an outer frame starting at `cycle`.
    ///
    /// The previous frame is closed at `cycle` if nothing closed it, and
    /// frames pushed out past the depth are settled.
    pub fn start(
        &mut self,
        cycle: Cycle,
        time: f64,
        earliest_solver_cycle: Option<Cycle>,
        recording: &Recording,
    ) -> WindowOutcome {
        match self.queue.back_mut() {
            Some(prev) if !prev.is_closed() => prev.close(cycle, time),
            Some(_) => {}
            None => self.close_committed_tail(recording, cycle, time),
        }
        self.queue.push_back(OuterFrame::new(cycle, time));

        let mut outcome = WindowOutcome::default();
        while self.queue.len() > self.depth {
            if let Some(frame) = self.queue.pop_front() {
                outcome.add(self.settle(frame, earliest_solver_cycle, recording));
            }
        }
        outcome
    }

    /// Close the outer frame containing `cycle`.
    ///
    /// Queued frames are updated in place; a frame this window already
    /// committed is updated in the recording and marked dirty. Returns
    /// whether any frame matched.
    pub fn end(&mut self, cycle: Cycle, time: f64, recording: &Recording) -> bool {
        if let Some(frame) = self.queue.iter_mut().rev().find(|f| f.first_cycle <= cycle) {
            frame.close(cycle, time);
            return true;
        }
        let Some(&(first_cycle, start_time)) =
            self.recent.iter().rev().find(|(first, _)| *first <= cycle)
        else {
            return false;
        };
        let mut data = recording.write();
        match data.outer_frame_index(first_cycle, start_time) {
            Some(index) => {
                trace!(index, cycle = %cycle, "closing committed outer frame");
                data.close_outer_frame_assumes_locked(index, cycle, time)
            }
            None => false,
        }
    }

    /// Settle every queued frame.
    pub fn flush(
        &mut self,
        earliest_solver_cycle: Option<Cycle>,
        recording: &Recording,
    ) -> WindowOutcome {
        let mut outcome = WindowOutcome::default();
        while let Some(frame) = self.queue.pop_front() {
            outcome.add(self.settle(frame, earliest_solver_cycle, recording));
        }
        outcome
    }

    /// Frames waiting in the window, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = &OuterFrame> {
        self.queue.iter()
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether any frame has been committed.
    pub fn committed_any(&self) -> bool {
        self.committed_any
    }

    fn settle(
        &mut self,
        frame: OuterFrame,
        earliest_solver_cycle: Option<Cycle>,
        recording: &Recording,
    ) -> bool {
        let has_solver_data = earliest_solver_cycle
            .is_some_and(|earliest| frame.last_cycle.map_or(true, |last| earliest <= last));
        if !self.trim_empty || self.committed_any || has_solver_data {
            if self.recent.len() == RECENT_COMMITTED {
                self.recent.pop_front();
            }
            self.recent.push_back((frame.first_cycle, frame.start_time));
            recording.add_outer_frame(frame);
            self.committed_any = true;
            true
        } else {
            debug!(
                first_cycle = %frame.first_cycle,
                "discarding leading outer frame with no solver data"
            );
            false
        }
    }

    /// Close the frame this window committed last, if it is still open.
    fn close_committed_tail(&self, recording: &Recording, cycle: Cycle, time: f64) {
        let Some(&(first_cycle, start_time)) = self.recent.back() else {
            return;
        };
        let open_tail = {
            let data = recording.read();
            data.outer_frame_index(first_cycle, start_time)
                .filter(|&i| !data.outer_frames()[i].is_closed())
        };
        if let Some(index) = open_tail {
            recording
                .write()
                .close_outer_frame_assumes_locked(index, cycle, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(depth: usize, trim: bool) -> (OuterFrameWindow, Recording) {
        (
            OuterFrameWindow::new(depth, trim),
            Recording::with_defaults("window"),
        )
    }

    #[test]
    fn frames_wait_until_depth_exceeded() {
        let (mut w, rec) = window(3, false);
        for c in 0..3 {
            let out = w.start(Cycle(c), c as f64, None, &rec);
            assert_eq!(out, WindowOutcome::default());
        }
        assert_eq!(rec.outer_frame_count(), 0);
        let out = w.start(Cycle(3), 3.0, None, &rec);
        assert_eq!(out.committed, 1);
        let data = rec.read();
        let first = &data.outer_frames()[0];
        assert_eq!(first.first_cycle, Cycle(0));
        assert_eq!(first.last_cycle, Some(Cycle(1)));
    }

    #[test]
    fn leading_empty_frames_trimmed() {
        let (mut w, rec) = window(1, true);
        w.start(Cycle(0), 0.0, None, &rec);
        let out = w.start(Cycle(1), 1.0, Some(Cycle(5)), &rec);
        assert_eq!(out.discarded, 1);
        let out = w.start(Cycle(5), 2.0, Some(Cycle(5)), &rec);
        assert_eq!(out.committed, 1);
        // Once something is committed nothing else is trimmed.
        let out = w.start(Cycle(6), 3.0, None, &rec);
        assert_eq!(out.committed, 1);
        assert!(w.committed_any());
        assert_eq!(rec.outer_frame_count(), 2);
    }

    #[test]
    fn explicit_end_closes_queued_frame() {
        let (mut w, rec) = window(3, false);
        w.start(Cycle(0), 0.0, None, &rec);
        assert!(w.end(Cycle(0), 0.5, &rec));
        let queued: Vec<_> = w.queued().collect();
        assert_eq!(queued[0].last_cycle, Some(Cycle(0)));
        assert_eq!(queued[0].end_time, Some(0.5));
    }

    #[test]
    fn late_end_marks_committed_frame_dirty() {
        let (mut w, rec) = window(1, false);
        w.start(Cycle(0), 0.0, None, &rec);
        w.start(Cycle(4), 1.0, None, &rec);
        assert_eq!(rec.outer_frame_count(), 1);
        assert!(!rec.read().outer_frames()[0].dirty);

        let out = w.flush(None, &rec);
        assert_eq!(out.committed, 1);
        assert!(w.end(Cycle(2), 0.9, &rec));
        let data = rec.read();
        assert!(data.outer_frames()[0].dirty);
        assert_eq!(data.outer_frames()[0].last_cycle, Some(Cycle(2)));
    }

    #[test]
    fn end_before_any_frame_is_ignored() {
        let (mut w, rec) = window(3, false);
        assert!(!w.end(Cycle(0), 0.0, &rec));
    }

    #[test]
    fn start_after_flush_closes_committed_tail() {
        let (mut w, rec) = window(2, false);
        w.start(Cycle(0), 0.0, None, &rec);
        w.flush(None, &rec);
        assert!(!rec.read().outer_frames()[0].is_closed());
        w.start(Cycle(1), 1.0, None, &rec);
        let data = rec.read();
        assert_eq!(data.outer_frames()[0].last_cycle, Some(Cycle(1)));
        assert!(data.outer_frames()[0].dirty);
    }

    #[test]
    fn shared_recording_windows_leave_each_other_alone() {
        let rec = Recording::with_defaults("shared");
        let mut a = OuterFrameWindow::new(1, false);
        let mut b = OuterFrameWindow::new(1, false);
        a.start(Cycle(0), 0.0, None, &rec);
        b.start(Cycle(100), 0.5, None, &rec);
        a.flush(None, &rec);
        b.flush(None, &rec);

        // `b` committed last, but `a` closes its own open tail.
        a.start(Cycle(1), 1.0, None, &rec);
        {
            let data = rec.read();
            assert_eq!(data.outer_frames()[0].last_cycle, Some(Cycle(1)));
            assert!(!data.outer_frames()[1].is_closed());
            assert!(!data.outer_frames()[1].dirty);
        }

        assert!(b.end(Cycle(150), 1.5, &rec));
        let data = rec.read();
        assert_eq!(data.outer_frames()[1].last_cycle, Some(Cycle(150)));
        assert!(data.outer_frames()[1].dirty);
        assert_eq!(data.outer_frames()[0].last_cycle, Some(Cycle(1)));
    }

    #[test]
    fn prior_frames_disable_trimming() {
        let (w, rec) = window(1, true);
        let mut w = w.with_prior_frames(true);
        assert!(w.committed_any());
        w.start(Cycle(0), 0.0, None, &rec);
        let out = w.start(Cycle(1), 1.0, None, &rec);
        assert_eq!(out.committed, 1);
        assert_eq!(rec.outer_frame_count(), 1);
    }
}
