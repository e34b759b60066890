//! Scripted replay: feeds a JSON-lines event log through a mounted widget.

use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

use super::Clock;
use crate::actions::RedirectSink;
use crate::config::{OutcomeUrls, Profile};
use crate::geometry::TrackGeometry;
use crate::gestures::Phase;
use crate::input::{AdapterChoice, Capabilities, RawEvent, select_adapter};
use crate::render::Presenter;
use crate::widget::Widget;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: expected exactly one of \"event\" or \"resize\"")]
    Shape { line: usize },
    #[error("line {line}: at_ms {at_ms} is earlier than the previous entry ({prev})")]
    OutOfOrder { line: usize, at_ms: u64, prev: u64 },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Line {
    at_ms: u64,
    #[serde(default)]
    event: Option<RawEvent>,
    #[serde(default)]
    resize: Option<TrackGeometry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Event(RawEvent),
    Resize(TrackGeometry),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub at_ms: u64,
    pub step: Step,
}

#[derive(Debug, Default)]
pub struct Script {
    pub entries: Vec<Entry>,
}

impl Script {
    /// Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut entries = Vec::new();
        let mut prev = 0;
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parsed: Line = serde_json::from_str(trimmed)
                .map_err(|source| ScriptError::Parse { line, source })?;
            let step = match (parsed.event, parsed.resize) {
                (Some(ev), None) => Step::Event(ev),
                (None, Some(geom)) => Step::Resize(geom),
                _ => return Err(ScriptError::Shape { line }),
            };
            if parsed.at_ms < prev {
                return Err(ScriptError::OutOfOrder {
                    line,
                    at_ms: parsed.at_ms,
                    prev,
                });
            }
            prev = parsed.at_ms;
            entries.push(Entry {
                at_ms: parsed.at_ms,
                step,
            });
        }
        Ok(Self { entries })
    }

    /// What the recorded platform evidently supports.
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::default();
        for e in &self.entries {
            match e.step {
                Step::Event(RawEvent::Pointer { .. }) => caps.pointer_events = true,
                Step::Event(RawEvent::Touch { .. }) => caps.touch_events = true,
                _ => {}
            }
        }
        caps
    }
}

#[derive(Debug, Default)]
pub struct ReplayOptions {
    pub realtime: bool,
    pub adapter: AdapterChoice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySummary {
    pub phase: Phase,
    pub progress: f64,
    pub redirected: bool,
    pub host_commands: usize,
    pub finished_at_ms: u64,
}

fn fire_due(widget: &mut Widget, clock: &mut Clock, until_ms: u64, sink: &mut dyn RedirectSink) {
    while let Some(due) = widget.next_due().filter(|&d| d <= until_ms) {
        clock.wait_until(due);
        widget.tick(due, sink);
    }
}

pub fn run_replay(
    script: &Script,
    opts: &ReplayOptions,
    profile: &Profile,
    urls: OutcomeUrls,
    presenter: Box<dyn Presenter>,
    sink: &mut dyn RedirectSink,
) -> ReplaySummary {
    let adapter = select_adapter(opts.adapter, script.capabilities());
    let mut widget = Widget::mount(
        adapter,
        presenter,
        profile.timing.clone(),
        urls,
        profile.track.geometry(),
    );
    let mut clock = if opts.realtime {
        Clock::realtime()
    } else {
        Clock::simulated()
    };

    for (played, entry) in script.entries.iter().enumerate() {
        // timers that are due by now run before the next input
        fire_due(&mut widget, &mut clock, entry.at_ms, sink);
        if widget.is_disposed() {
            warn!(
                "widget disposed at {}ms; {} entries left unplayed",
                clock.now_ms(),
                script.entries.len() - played
            );
            break;
        }
        clock.wait_until(entry.at_ms);
        match &entry.step {
            Step::Event(ev) => {
                widget.feed(ev, entry.at_ms);
            }
            Step::Resize(geom) => widget.resize(*geom),
        }
    }
    fire_due(&mut widget, &mut clock, u64::MAX, sink);

    let summary = ReplaySummary {
        phase: widget.phase(),
        progress: widget.progress(),
        redirected: widget.is_disposed(),
        host_commands: widget.commands().len(),
        finished_at_ms: clock.now_ms(),
    };
    info!("replay finished: {summary:?}");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RecordingSink;
    use crate::config::parse_profile;
    use crate::render::RecordingPresenter;

    const PROFILE: &str = r#"
        [meta]
        name = "test"
        [track]
        width = 300.0
        handle_width = 60.0
    "#;

    fn urls() -> OutcomeUrls {
        OutcomeUrls {
            success: "/ok".into(),
            failure: "/no".into(),
        }
    }

    fn replay(text: &str, opts: ReplayOptions) -> (ReplaySummary, RecordingSink) {
        let script = Script::parse(text).unwrap();
        let profile = parse_profile(PROFILE).unwrap();
        let mut sink = RecordingSink::default();
        let summary = run_replay(
            &script,
            &opts,
            &profile,
            urls(),
            Box::new(RecordingPresenter::default()),
            &mut sink,
        );
        (summary, sink)
    }

    #[test]
    fn pointer_script_verifies() {
        let (s, sink) = replay(
            r#"
            # raw offset 220
            {"at_ms":0,"event":{"source":"pointer","kind":"down","pointer_id":1,"client_x":30}}
            {"at_ms":40,"event":{"source":"pointer","kind":"move","pointer_id":1,"client_x":250}}
            {"at_ms":60,"event":{"source":"pointer","kind":"up","pointer_id":1,"client_x":250}}
            "#,
            ReplayOptions::default(),
        );
        assert_eq!(s.phase, Phase::Succeeded);
        assert!(s.redirected);
        assert_eq!(s.finished_at_ms, 860);
        assert_eq!(s.host_commands, 2);
        assert_eq!(sink.calls, vec!["/ok".to_string()]);
    }

    #[test]
    fn mouse_script_fails_and_drops_late_input() {
        let (s, sink) = replay(
            r#"
            {"at_ms":0,"event":{"source":"mouse","kind":"down","client_x":30}}
            {"at_ms":10,"event":{"source":"mouse","kind":"move","client_x":130,"target":"document"}}
            {"at_ms":20,"event":{"source":"mouse","kind":"up","client_x":130,"target":"document"}}
            {"at_ms":9000,"event":{"source":"mouse","kind":"down","client_x":30}}
            "#,
            ReplayOptions::default(),
        );
        assert_eq!(s.phase, Phase::Reset);
        assert_eq!(s.progress, 0.0);
        assert_eq!(s.finished_at_ms, 2_520);
        assert_eq!(sink.calls, vec!["/no".to_string()]);
    }

    #[test]
    fn idle_release_leaves_nothing_pending() {
        let (s, sink) = replay(
            r#"
            {"at_ms":0,"event":{"source":"touch","kind":"start","touches":[{"id":1,"client_x":30}]}}
            {"at_ms":5,"event":{"source":"touch","kind":"end","touches":[{"id":1,"client_x":30}]}}
            "#,
            ReplayOptions::default(),
        );
        assert_eq!(s.phase, Phase::Idle);
        assert!(!s.redirected);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn resize_entries_reshape_the_track() {
        let (s, _) = replay(
            r#"
            {"at_ms":0,"resize":{"origin_x":0,"width":50,"handle_width":60}}
            {"at_ms":1,"event":{"source":"pointer","kind":"down","pointer_id":1,"client_x":30}}
            {"at_ms":2,"event":{"source":"pointer","kind":"move","pointer_id":1,"client_x":900}}
            {"at_ms":3,"event":{"source":"pointer","kind":"up","pointer_id":1,"client_x":900}}
            "#,
            ReplayOptions::default(),
        );
        assert_eq!(s.phase, Phase::Reset);
    }

    #[test]
    fn forced_adapter_ignores_other_families() {
        let (s, _) = replay(
            r#"{"at_ms":0,"event":{"source":"pointer","kind":"down","pointer_id":1,"client_x":30}}"#,
            ReplayOptions {
                adapter: AdapterChoice::MouseTouch,
                ..ReplayOptions::default()
            },
        );
        assert_eq!(s.phase, Phase::Idle);
    }

    #[test]
    fn script_errors_carry_line_numbers() {
        assert!(matches!(
            Script::parse("\n{\"at_ms\":1}"),
            Err(ScriptError::Shape { line: 2 })
        ));
        assert!(matches!(
            Script::parse("not json"),
            Err(ScriptError::Parse { line: 1, .. })
        ));
        let err = Script::parse(
            "{\"at_ms\":5,\"resize\":{\"origin_x\":0,\"width\":1,\"handle_width\":0}}\n\
             {\"at_ms\":4,\"resize\":{\"origin_x\":0,\"width\":1,\"handle_width\":0}}",
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::OutOfOrder { line: 2, at_ms: 4, prev: 5 }));
    }
}
