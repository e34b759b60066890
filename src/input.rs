//! Input adapters: normalize pointer, mouse and touch events into drag signals.
//!
//! An adapter never talks to the host directly. After every dispatch the owner
//! calls [`InputAdapter::sync`] with the session phase and forwards the returned
//! [`HostCommand`]s, so capture and document listeners exist exactly while the
//! session is `Dragging`.

use anyhow::{Result, anyhow};
use log::{debug, warn};
use serde::Deserialize;
use std::str::FromStr;

use crate::gestures::{DragSignal, Phase};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    #[default]
    Handle,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
    LostCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseKind {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchKind {
    Start,
    Move,
    End,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Contact {
    pub id: u32,
    #[serde(default)]
    pub client_x: Option<f64>,
}

/// Raw platform event, as a host would hand it over.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawEvent {
    Pointer {
        kind: PointerKind,
        pointer_id: u32,
        #[serde(default)]
        client_x: Option<f64>,
        #[serde(default)]
        target: Target,
    },
    Mouse {
        kind: MouseKind,
        #[serde(default)]
        client_x: Option<f64>,
        #[serde(default)]
        target: Target,
    },
    /// `touches` lists the changed contacts, in platform order.
    Touch {
        kind: TouchKind,
        #[serde(default)]
        touches: Vec<Contact>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerSet {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    AcquireCapture { pointer_id: u32 },
    ReleaseCapture { pointer_id: u32 },
    AttachDocumentListeners(ListenerSet),
    DetachDocumentListeners(ListenerSet),
    /// Stop the platform scrolling/zooming while a touch drag runs.
    BlockTouchDefaults,
    RestoreTouchDefaults,
}

pub trait InputAdapter {
    fn name(&self) -> &'static str;
    fn translate(&mut self, ev: &RawEvent) -> Option<DragSignal>;
    fn sync(&mut self, phase: Phase) -> Vec<HostCommand>;
}

fn coordinate(client_x: Option<f64>) -> Option<f64> {
    match client_x {
        Some(x) if x.is_finite() => Some(x),
        other => {
            warn!("discarding sample with unusable clientX {other:?}");
            None
        }
    }
}

// --------- pointer events with element capture ----------

#[derive(Debug, Default)]
pub struct PointerAdapter {
    // pointer we consider captured
    capture: Option<u32>,
    // capture the host currently holds for us
    host_capture: Option<u32>,
}

impl PointerAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputAdapter for PointerAdapter {
    fn name(&self) -> &'static str {
        "pointer"
    }

    fn translate(&mut self, ev: &RawEvent) -> Option<DragSignal> {
        let RawEvent::Pointer {
            kind,
            pointer_id,
            client_x,
            target,
        } = *ev
        else {
            debug!("pointer adapter ignores {ev:?}");
            return None;
        };
        let captured = self.capture == Some(pointer_id);
        match kind {
            PointerKind::Down => {
                if target != Target::Handle || self.capture.is_some() {
                    return None;
                }
                let client_x = coordinate(client_x)?;
                self.capture = Some(pointer_id);
                Some(DragSignal::Start { client_x })
            }
            PointerKind::Move => {
                if !captured {
                    debug!("move from pointer {pointer_id} without capture");
                    return None;
                }
                coordinate(client_x).map(|client_x| DragSignal::Move { client_x })
            }
            PointerKind::Up | PointerKind::Cancel => {
                if !captured {
                    return None;
                }
                self.capture = None;
                Some(DragSignal::End)
            }
            PointerKind::LostCapture => {
                if captured {
                    debug!("pointer {pointer_id} lost capture");
                    self.capture = None;
                }
                if self.host_capture == Some(pointer_id) {
                    self.host_capture = None;
                }
                None
            }
        }
    }

    fn sync(&mut self, phase: Phase) -> Vec<HostCommand> {
        if phase != Phase::Dragging {
            self.capture = None;
        }
        let mut cmds = Vec::new();
        if self.host_capture != self.capture {
            if let Some(pointer_id) = self.host_capture.take() {
                cmds.push(HostCommand::ReleaseCapture { pointer_id });
            }
            if let Some(pointer_id) = self.capture {
                cmds.push(HostCommand::AcquireCapture { pointer_id });
                self.host_capture = Some(pointer_id);
            }
        }
        cmds
    }
}

// --------- mouse + touch with document-level listeners ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Mouse,
    Touch(u32),
}

#[derive(Debug, Default)]
pub struct MouseTouchAdapter {
    active: Option<Active>,
    listening: Option<ListenerSet>,
}

impl MouseTouchAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn listening_for(&self, set: ListenerSet) -> bool {
        self.listening == Some(set)
    }

    fn translate_mouse(
        &mut self,
        kind: MouseKind,
        client_x: Option<f64>,
        target: Target,
    ) -> Option<DragSignal> {
        match kind {
            MouseKind::Down => {
                if target != Target::Handle || self.active.is_some() {
                    return None;
                }
                let client_x = coordinate(client_x)?;
                self.active = Some(Active::Mouse);
                Some(DragSignal::Start { client_x })
            }
            MouseKind::Move => {
                if self.active != Some(Active::Mouse) || !self.listening_for(ListenerSet::Mouse) {
                    return None;
                }
                coordinate(client_x).map(|client_x| DragSignal::Move { client_x })
            }
            MouseKind::Up => {
                if self.active != Some(Active::Mouse) || !self.listening_for(ListenerSet::Mouse) {
                    return None;
                }
                self.active = None;
                Some(DragSignal::End)
            }
        }
    }

    fn translate_touch(&mut self, kind: TouchKind, touches: &[Contact]) -> Option<DragSignal> {
        match kind {
            TouchKind::Start => {
                if self.active.is_some() {
                    debug!("ignoring additional touch");
                    return None;
                }
                let first = touches.first()?;
                let client_x = coordinate(first.client_x)?;
                self.active = Some(Active::Touch(first.id));
                Some(DragSignal::Start { client_x })
            }
            TouchKind::Move => {
                let Some(Active::Touch(id)) = self.active else {
                    return None;
                };
                if !self.listening_for(ListenerSet::Touch) {
                    return None;
                }
                let contact = touches.iter().find(|c| c.id == id)?;
                coordinate(contact.client_x).map(|client_x| DragSignal::Move { client_x })
            }
            TouchKind::End | TouchKind::Cancel => {
                let Some(Active::Touch(id)) = self.active else {
                    return None;
                };
                if !touches.iter().any(|c| c.id == id) {
                    return None;
                }
                self.active = None;
                Some(DragSignal::End)
            }
        }
    }
}

impl InputAdapter for MouseTouchAdapter {
    fn name(&self) -> &'static str {
        "mouse-touch"
    }

    fn translate(&mut self, ev: &RawEvent) -> Option<DragSignal> {
        match ev {
            RawEvent::Mouse {
                kind,
                client_x,
                target,
            } => self.translate_mouse(*kind, *client_x, *target),
            RawEvent::Touch { kind, touches } => self.translate_touch(*kind, touches),
            RawEvent::Pointer { .. } => {
                debug!("mouse-touch adapter ignores {ev:?}");
                None
            }
        }
    }

    fn sync(&mut self, phase: Phase) -> Vec<HostCommand> {
        if phase != Phase::Dragging {
            self.active = None;
        }
        let want = self.active.map(|a| match a {
            Active::Mouse => ListenerSet::Mouse,
            Active::Touch(_) => ListenerSet::Touch,
        });
        let mut cmds = Vec::new();
        if want != self.listening {
            if let Some(set) = self.listening.take() {
                cmds.push(HostCommand::DetachDocumentListeners(set));
                if set == ListenerSet::Touch {
                    cmds.push(HostCommand::RestoreTouchDefaults);
                }
            }
            if let Some(set) = want {
                cmds.push(HostCommand::AttachDocumentListeners(set));
                if set == ListenerSet::Touch {
                    cmds.push(HostCommand::BlockTouchDefaults);
                }
                self.listening = Some(set);
            }
        }
        cmds
    }
}

// --------- selection ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub pointer_events: bool,
    pub touch_events: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdapterChoice {
    #[default]
    Auto,
    Pointer,
    MouseTouch,
}

impl FromStr for AdapterChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pointer" => Ok(Self::Pointer),
            "mouse-touch" | "mouse" | "touch" => Ok(Self::MouseTouch),
            other => Err(anyhow!("unknown adapter: {other} (auto|pointer|mouse-touch)")),
        }
    }
}

pub fn select_adapter(choice: AdapterChoice, caps: Capabilities) -> Box<dyn InputAdapter> {
    let pointer = match choice {
        AdapterChoice::Pointer => true,
        AdapterChoice::MouseTouch => false,
        AdapterChoice::Auto => caps.pointer_events,
    };
    debug!(
        "adapter {choice:?}: pointer_events={} touch_events={} -> {}",
        caps.pointer_events,
        caps.touch_events,
        if pointer { "pointer" } else { "mouse-touch" }
    );
    if pointer {
        Box::new(PointerAdapter::new())
    } else {
        Box::new(MouseTouchAdapter::new())
    }
}
