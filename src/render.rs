//! Presentation hook: receives `{phase, progress}` on every state change.

use log::error;
use std::io::{self, Write};

use crate::gestures::Phase;

const BAR_CELLS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionView {
    pub phase: Phase,
    pub progress: f64,
}

impl SessionView {
    pub fn label(&self) -> &'static str {
        match self.phase {
            Phase::Succeeded => "Verification complete",
            Phase::FailedTransient => "Verification failed",
            Phase::Reset => "Redirecting",
            Phase::Idle | Phase::Dragging => "Slide to verify",
        }
    }
}

pub trait Presenter {
    fn render(&mut self, view: SessionView);
}

/// Draws a one-line progress bar per state change.
pub struct TextPresenter<W: Write> {
    out: W,
}

impl TextPresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_CELLS as f64).round() as usize;
    let mut s = String::with_capacity(BAR_CELLS + 2);
    s.push('[');
    for i in 0..BAR_CELLS {
        s.push(match i.cmp(&filled) {
            std::cmp::Ordering::Less => '=',
            std::cmp::Ordering::Equal => '>',
            std::cmp::Ordering::Greater => ' ',
        });
    }
    s.push(']');
    s
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn render(&mut self, view: SessionView) {
        let line = format!(
            "{} {:>5.1}% {:<15} {}",
            bar(view.progress),
            view.progress,
            format!("{:?}", view.phase),
            view.label()
        );
        if let Err(e) = writeln!(self.out, "{line}") {
            error!("render failed: {e}");
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub views: Vec<SessionView>,
}

#[cfg(test)]
impl Presenter for RecordingPresenter {
    fn render(&mut self, view: SessionView) {
        self.views.push(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.0), format!("[>{}]", " ".repeat(BAR_CELLS - 1)));
        assert_eq!(bar(100.0), format!("[{}]", "=".repeat(BAR_CELLS)));
        assert_eq!(bar(50.0).matches('=').count(), BAR_CELLS / 2);
    }

    #[test]
    fn text_presenter_writes_label() {
        let mut p = TextPresenter::new(Vec::new());
        p.render(SessionView {
            phase: Phase::FailedTransient,
            progress: 41.7,
        });
        let out = String::from_utf8(p.into_inner()).unwrap();
        assert!(out.contains("41.7%"));
        assert!(out.contains("Verification failed"));
        assert!(out.ends_with('\n'));
    }
}
