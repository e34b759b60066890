//! One mounted verification widget: adapter, session and host command log.

use log::{debug, info};

use crate::actions::RedirectSink;
use crate::config::{OutcomeUrls, Timing};
use crate::geometry::TrackGeometry;
use crate::gestures::{DragSession, Phase};
use crate::input::{HostCommand, InputAdapter, RawEvent};
use crate::render::Presenter;

pub struct Widget {
    adapter: Box<dyn InputAdapter>,
    session: DragSession,
    presenter: Box<dyn Presenter>,
    commands: Vec<HostCommand>,
}

impl Widget {
    pub fn mount(
        adapter: Box<dyn InputAdapter>,
        presenter: Box<dyn Presenter>,
        timing: Timing,
        urls: OutcomeUrls,
        layout: TrackGeometry,
    ) -> Self {
        info!(
            "mounting widget ({} input, success={}, failure={})",
            adapter.name(),
            urls.success,
            urls.failure
        );
        let mut w = Self {
            adapter,
            session: DragSession::new(timing, urls, layout),
            presenter,
            commands: Vec::new(),
        };
        let view = w.session.view();
        w.presenter.render(view);
        w
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn progress(&self) -> f64 {
        self.session.progress()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.session.next_due()
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_disposed()
    }

    /// Host commands emitted so far, oldest first.
    pub fn commands(&self) -> &[HostCommand] {
        &self.commands
    }

    /// Dispatches one raw event; returns the host commands it produced.
    pub fn feed(&mut self, ev: &RawEvent, now_ms: u64) -> Vec<HostCommand> {
        if self.is_disposed() {
            debug!("widget disposed; dropping {ev:?}");
            return Vec::new();
        }
        if let Some(signal) = self.adapter.translate(ev) {
            self.session.handle(signal, now_ms, self.presenter.as_mut());
        }
        self.settle()
    }

    pub fn resize(&mut self, layout: TrackGeometry) {
        self.session.resize(layout);
    }

    pub fn tick(&mut self, now_ms: u64, sink: &mut dyn RedirectSink) -> Vec<HostCommand> {
        self.session.tick(now_ms, self.presenter.as_mut(), sink);
        self.settle()
    }

    fn settle(&mut self) -> Vec<HostCommand> {
        let cmds = self.adapter.sync(self.session.phase());
        for c in &cmds {
            debug!("host command {c:?}");
        }
        self.commands.extend_from_slice(&cmds);
        cmds
    }
}
