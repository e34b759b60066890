//! Drag session state machine: turns normalized drag signals into an outcome.
//!
//! Input handlers only mutate state and arm timers. Redirects happen from
//! [`DragSession::tick`], which the host calls from its timer loop, so a
//! navigation can never fire synchronously from an input callback.

use log::{debug, error, info, warn};

use crate::actions::RedirectSink;
use crate::config::{OutcomeUrls, Timing};
use crate::geometry::TrackGeometry;
use crate::render::{Presenter, SessionView};
use crate::schedule::{self, Outcome, Schedule, Transition};

/// A release strictly above this percentage verifies.
pub const SUCCESS_THRESHOLD_PCT: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dragging,
    Succeeded,
    FailedTransient,
    /// Failure redirect has fired; the widget is gone.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragSignal {
    Start { client_x: f64 },
    Move { client_x: f64 },
    End,
}

#[derive(Debug)]
pub struct DragSession {
    timing: Timing,
    urls: OutcomeUrls,
    layout: TrackGeometry,
    captured: TrackGeometry,
    progress: f64,
    phase: Phase,
    // drag began on a track with no travel; can only fail
    degenerate: bool,
    // an outcome plan is armed; user input no longer counts
    locked: bool,
    navigated: bool,
    schedule: Schedule,
}

impl DragSession {
    pub fn new(timing: Timing, urls: OutcomeUrls, layout: TrackGeometry) -> Self {
        Self {
            timing,
            urls,
            layout,
            captured: layout,
            progress: 0.0,
            phase: Phase::Idle,
            degenerate: false,
            locked: false,
            navigated: false,
            schedule: Schedule::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            progress: self.progress,
        }
    }

    pub fn next_due(&self) -> Option<u64> {
        self.schedule.next_due()
    }

    pub fn is_disposed(&self) -> bool {
        self.navigated
    }

    /// Track was laid out again. A drag in progress follows the new box but keeps
    /// its progress until the next move; whether it can verify follows the new box.
    pub fn resize(&mut self, layout: TrackGeometry) {
        self.layout = layout;
        if self.phase == Phase::Dragging {
            self.captured = layout;
            self.degenerate = layout.is_degenerate();
            if self.degenerate {
                warn!("track resized to a degenerate box mid-drag");
            }
        }
    }

    /// Applies one input signal. Returns false when the signal was ignored.
    pub fn handle(&mut self, signal: DragSignal, now_ms: u64, view: &mut dyn Presenter) -> bool {
        if self.locked {
            debug!("ignoring {signal:?} while {:?}", self.phase);
            return false;
        }
        match (self.phase, signal) {
            (Phase::Idle, DragSignal::Start { client_x }) => {
                self.captured = self.layout;
                self.degenerate = self.captured.is_degenerate();
                if self.degenerate {
                    warn!(
                        "drag started on degenerate track (width {}, handle {}); it cannot verify",
                        self.captured.width, self.captured.handle_width
                    );
                }
                debug!("drag start at x={client_x}");
                self.enter(Phase::Dragging, view);
                true
            }
            (Phase::Dragging, DragSignal::Move { client_x }) => {
                if !client_x.is_finite() {
                    warn!("discarding sample with non-finite clientX");
                    return false;
                }
                match self.captured.progress_at(client_x) {
                    Ok(p) => {
                        if p != self.progress {
                            self.progress = p;
                            debug!("progress {p:.1}%");
                            view.render(self.view());
                        }
                        true
                    }
                    Err(e) => {
                        debug!("move ignored: {e}");
                        self.degenerate = true;
                        false
                    }
                }
            }
            (Phase::Dragging, DragSignal::End) => {
                self.release(now_ms, view);
                true
            }
            (phase, signal) => {
                debug!("ignoring {signal:?} in {phase:?}");
                false
            }
        }
    }

    fn release(&mut self, now_ms: u64, view: &mut dyn Presenter) {
        if !self.degenerate && self.progress > SUCCESS_THRESHOLD_PCT {
            info!("verified at {:.1}%", self.progress);
            self.progress = 100.0;
            self.locked = true;
            self.schedule.arm(now_ms, &schedule::success_plan(&self.timing));
            self.enter(Phase::Succeeded, view);
        } else if self.degenerate || self.progress > 0.0 {
            info!("verification failed at {:.1}%", self.progress);
            self.locked = true;
            self.schedule.arm(now_ms, &schedule::failure_plan(&self.timing));
            self.enter(Phase::FailedTransient, view);
        } else {
            debug!("released without moving");
            self.progress = 0.0;
            self.enter(Phase::Idle, view);
        }
    }

    /// Fires every transition due at `now_ms`.
    pub fn tick(&mut self, now_ms: u64, view: &mut dyn Presenter, sink: &mut dyn RedirectSink) {
        for due in self.schedule.take_due(now_ms) {
            debug!("timer due at {} fired at {now_ms}", due.due_ms);
            match due.transition {
                Transition::ResetProgress => {
                    self.progress = 0.0;
                    self.enter(Phase::Idle, view);
                }
                Transition::Navigate(outcome) => self.navigate(outcome, view, sink),
            }
        }
    }

    fn navigate(&mut self, outcome: Outcome, view: &mut dyn Presenter, sink: &mut dyn RedirectSink) {
        if self.navigated {
            return;
        }
        self.navigated = true;
        let url = match outcome {
            Outcome::Success => &self.urls.success,
            Outcome::Failure => &self.urls.failure,
        };
        info!("redirecting ({outcome:?}) to {url}");
        if let Err(e) = sink.navigate(url) {
            error!("redirect to {url} failed: {e}");
        }
        if outcome == Outcome::Failure {
            self.enter(Phase::Reset, view);
        }
    }

    fn enter(&mut self, phase: Phase, view: &mut dyn Presenter) {
        if self.phase != phase {
            info!("phase {:?} -> {phase:?}", self.phase);
        }
        self.phase = phase;
        view.render(self.view());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RecordingSink;
    use crate::render::RecordingPresenter;

    const SUCCESS: &str = "https://ok.example/";
    const FAILURE: &str = "https://no.example/";

    struct Rig {
        session: DragSession,
        view: RecordingPresenter,
        sink: RecordingSink,
        track: TrackGeometry,
    }

    impl Rig {
        fn with_track(track: TrackGeometry) -> Self {
            let urls = OutcomeUrls {
                success: SUCCESS.into(),
                failure: FAILURE.into(),
            };
            Self {
                session: DragSession::new(Timing::default(), urls, track),
                view: RecordingPresenter::default(),
                sink: RecordingSink::default(),
                track,
            }
        }

        fn new() -> Self {
            Self::with_track(TrackGeometry::new(0.0, 300.0, 60.0))
        }

        fn send(&mut self, s: DragSignal, now: u64) -> bool {
            self.session.handle(s, now, &mut self.view)
        }

        fn tick(&mut self, now: u64) {
            self.session.tick(now, &mut self.view, &mut self.sink);
        }

        /// Drags so the raw offset from the track start is `offset`, then releases.
        fn drag_to_offset(&mut self, offset: f64, release_at: u64) {
            let x0 = self.track.origin_x + self.track.handle_width / 2.0;
            assert!(self.send(DragSignal::Start { client_x: x0 }, 0));
            self.send(DragSignal::Move { client_x: x0 + offset }, 10);
            self.send(DragSignal::End, release_at);
        }
    }

    #[test]
    fn scenario_a_success_redirects_after_800ms_only() {
        let mut r = Rig::new();
        r.drag_to_offset(220.0, 100);
        assert_eq!(r.session.phase(), Phase::Succeeded);
        assert_eq!(r.session.progress(), 100.0);

        r.tick(100);
        r.tick(899);
        assert!(r.sink.calls.is_empty());

        r.tick(900);
        assert_eq!(r.sink.calls, vec![SUCCESS.to_string()]);
        assert!(r.session.is_disposed());

        r.tick(10_000);
        assert_eq!(r.sink.calls.len(), 1);
    }

    #[test]
    fn scenario_b_failure_resets_then_redirects() {
        let mut r = Rig::new();
        r.drag_to_offset(100.0, 0);
        assert_eq!(r.session.phase(), Phase::FailedTransient);
        assert!((r.session.progress() - 41.666).abs() < 0.01);

        r.tick(1_499);
        assert_eq!(r.session.phase(), Phase::FailedTransient);

        r.tick(1_500);
        assert_eq!(r.session.phase(), Phase::Idle);
        assert_eq!(r.session.progress(), 0.0);
        assert!(r.sink.calls.is_empty());

        r.tick(2_499);
        assert!(r.sink.calls.is_empty());
        r.tick(2_500);
        assert_eq!(r.sink.calls, vec![FAILURE.to_string()]);
        assert_eq!(r.session.phase(), Phase::Reset);
    }

    #[test]
    fn scenario_c_release_at_zero_is_silent() {
        let mut r = Rig::new();
        r.drag_to_offset(0.0, 0);
        assert_eq!(r.session.phase(), Phase::Idle);
        assert_eq!(r.session.progress(), 0.0);
        assert_eq!(r.session.next_due(), None);
        r.tick(60_000);
        assert!(r.sink.calls.is_empty());

        // control returns to the user
        assert!(r.send(DragSignal::Start { client_x: 30.0 }, 100));
        assert_eq!(r.session.phase(), Phase::Dragging);
    }

    #[test]
    fn scenario_d_degenerate_track_always_fails() {
        for x in [-100.0, 0.0, 30.0, 1_000.0] {
            let mut r = Rig::with_track(TrackGeometry::new(0.0, 50.0, 60.0));
            r.send(DragSignal::Start { client_x: 0.0 }, 0);
            r.send(DragSignal::Move { client_x: x }, 5);
            r.send(DragSignal::End, 10);
            assert_eq!(r.session.phase(), Phase::FailedTransient, "x={x}");
            r.tick(u64::MAX);
            assert_eq!(r.sink.calls, vec![FAILURE.to_string()]);
        }
    }

    #[test]
    fn scenario_e_input_after_success_is_absorbed() {
        let mut r = Rig::new();
        r.drag_to_offset(230.0, 0);
        assert_eq!(r.session.phase(), Phase::Succeeded);
        let rendered = r.view.views.len();

        assert!(!r.send(DragSignal::Move { client_x: 40.0 }, 5));
        assert!(!r.send(DragSignal::Start { client_x: 40.0 }, 6));
        assert!(!r.send(DragSignal::End, 7));
        assert_eq!(r.session.phase(), Phase::Succeeded);
        assert_eq!(r.session.progress(), 100.0);
        assert_eq!(r.view.views.len(), rendered);
    }

    #[test]
    fn exactly_threshold_fails() {
        // travel 100, raw offset 85 => 85%
        let mut r = Rig::with_track(TrackGeometry::new(0.0, 160.0, 60.0));
        r.drag_to_offset(85.0, 0);
        assert_eq!(r.session.phase(), Phase::FailedTransient);

        let mut r = Rig::with_track(TrackGeometry::new(0.0, 160.0, 60.0));
        r.drag_to_offset(85.5, 0);
        assert_eq!(r.session.phase(), Phase::Succeeded);
    }

    #[test]
    fn input_during_failure_window_is_ignored() {
        let mut r = Rig::new();
        r.drag_to_offset(100.0, 0);
        assert!(!r.send(DragSignal::Start { client_x: 30.0 }, 200));
        r.tick(1_500);
        assert_eq!(r.session.phase(), Phase::Idle);
        // back in Idle but the redirect is already armed
        assert!(!r.send(DragSignal::Start { client_x: 30.0 }, 1_600));
        assert!(!r.send(DragSignal::Move { client_x: 300.0 }, 1_601));
        r.tick(2_500);
        assert_eq!(r.sink.calls, vec![FAILURE.to_string()]);
    }

    #[test]
    fn malformed_sample_is_a_no_op() {
        let mut r = Rig::new();
        r.send(DragSignal::Start { client_x: 30.0 }, 0);
        r.send(DragSignal::Move { client_x: 130.0 }, 1);
        let before = r.session.progress();
        assert!(!r.send(DragSignal::Move { client_x: f64::NAN }, 2));
        assert!(!r.send(DragSignal::Move { client_x: f64::INFINITY }, 3));
        assert_eq!(r.session.progress(), before);
        assert_eq!(r.session.phase(), Phase::Dragging);
    }

    #[test]
    fn repeated_move_renders_once() {
        let mut r = Rig::new();
        r.send(DragSignal::Start { client_x: 30.0 }, 0);
        let n = r.view.views.len();
        r.send(DragSignal::Move { client_x: 130.0 }, 1);
        r.send(DragSignal::Move { client_x: 130.0 }, 2);
        assert_eq!(r.view.views.len(), n + 1);
    }

    #[test]
    fn moves_outside_dragging_do_nothing() {
        let mut r = Rig::new();
        assert!(!r.send(DragSignal::Move { client_x: 200.0 }, 0));
        assert!(!r.send(DragSignal::End, 1));
        assert_eq!(r.session.phase(), Phase::Idle);
        assert_eq!(r.session.progress(), 0.0);
    }

    #[test]
    fn resize_mid_drag_keeps_progress() {
        let mut r = Rig::new();
        r.send(DragSignal::Start { client_x: 30.0 }, 0);
        r.send(DragSignal::Move { client_x: 130.0 }, 1);
        let before = r.session.progress();
        r.session.resize(TrackGeometry::new(0.0, 600.0, 60.0));
        assert_eq!(r.session.progress(), before);
        // new box: travel 540
        r.send(DragSignal::Move { client_x: 30.0 + 540.0 }, 2);
        assert_eq!(r.session.progress(), 100.0);
    }

    #[test]
    fn resize_restoring_travel_allows_success() {
        let mut r = Rig::with_track(TrackGeometry::new(0.0, 50.0, 60.0));
        r.send(DragSignal::Start { client_x: 0.0 }, 0);
        r.send(DragSignal::Move { client_x: 200.0 }, 1);
        r.session.resize(TrackGeometry::new(0.0, 300.0, 60.0));
        r.send(DragSignal::Move { client_x: 270.0 }, 2);
        assert_eq!(r.session.progress(), 100.0);
        r.send(DragSignal::End, 3);
        assert_eq!(r.session.phase(), Phase::Succeeded);
    }

    #[test]
    fn resize_to_degenerate_mid_drag_fails() {
        let mut r = Rig::new();
        r.send(DragSignal::Start { client_x: 30.0 }, 0);
        r.send(DragSignal::Move { client_x: 270.0 }, 1);
        r.session.resize(TrackGeometry::new(0.0, 40.0, 60.0));
        r.send(DragSignal::End, 2);
        assert_eq!(r.session.phase(), Phase::FailedTransient);
    }

    #[test]
    fn sink_error_still_completes_session() {
        let mut r = Rig::new();
        r.sink.fail = true;
        r.drag_to_offset(239.0, 0);
        r.tick(800);
        r.tick(5_000);
        assert_eq!(r.sink.calls.len(), 1);
        assert!(r.session.is_disposed());
    }

    #[test]
    fn every_change_is_rendered() {
        let mut r = Rig::new();
        r.drag_to_offset(100.0, 0);
        r.tick(u64::MAX);
        let phases: Vec<Phase> = r.view.views.iter().map(|v| v.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::Dragging,
                Phase::Dragging,
                Phase::FailedTransient,
                Phase::Idle,
                Phase::Reset
            ]
        );
    }
}
