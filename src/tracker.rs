//! Per-slot multitouch tracking that turns evdev frames into touch events.

use crate::geometry::TrackGeometry;
use crate::input::{Contact, RawEvent, TouchKind};

const SLOTS: usize = 10;

#[derive(Debug, Clone, Default)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    x_norm: f32,
    order: u64,
    active: bool,
    seen_x: bool,
    // per-frame flags, cleared on SYN_REPORT
    began: bool,
    moved: bool,
    ended: bool,
}

#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    cur_slot: usize,
    // normalization
    x_min: i32,
    x_max: i32,
    // device X range is laid across this track
    track: TrackGeometry,
    next_order: u64,
}

impl Tracker {
    pub fn new(track: TrackGeometry) -> Self {
        Self {
            slots: vec![
                SlotState {
                    tracking_id: -1,
                    ..SlotState::default()
                };
                SLOTS
            ],
            cur_slot: 0,
            x_min: 0,
            x_max: 4096,
            track,
            next_order: 0,
        }
    }

    pub fn set_norm_range(&mut self, x_min: i32, x_max: i32) {
        self.x_min = x_min;
        self.x_max = x_max.max(x_min + 1);
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, SLOTS as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let order = self.next_order;
        if tracking_id >= 0 {
            self.next_order += 1;
        }
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            if s.active {
                s.active = false;
                s.ended = true;
            }
        } else {
            // the kernel skips an unchanged X, so the slot's last position stands
            *s = SlotState {
                tracking_id,
                x_norm: s.x_norm,
                order,
                active: true,
                seen_x: s.seen_x,
                began: true,
                moved: false,
                ended: false,
            };
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let nx = ((raw - self.x_min) as f32 / (self.x_max - self.x_min) as f32).clamp(0.0, 1.0);
        let s = &mut self.slots[self.cur_slot];
        if s.seen_x && nx != s.x_norm {
            s.moved = true;
        }
        s.x_norm = nx;
        s.seen_x = true;
    }

    fn client_x(&self, s: &SlotState) -> Option<f64> {
        s.seen_x
            .then(|| self.track.origin_x + f64::from(s.x_norm) * self.track.width)
    }

    /// Closes one evdev frame; returns the touch events it produced in
    /// start, move, end order.
    pub fn on_syn_report(&mut self) -> Vec<RawEvent> {
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by_key(|&i| self.slots[i].order);

        let mut began = Vec::new();
        let mut moved = Vec::new();
        let mut ended = Vec::new();
        for i in order {
            let s = &self.slots[i];
            let contact = Contact {
                id: s.tracking_id.max(0) as u32,
                client_x: self.client_x(s),
            };
            if s.ended {
                ended.push(contact);
            } else if s.began && s.active && s.seen_x {
                began.push(contact);
            } else if s.moved && s.active {
                moved.push(contact);
            }
        }
        for s in &mut self.slots {
            if s.ended {
                s.tracking_id = -1;
            }
            // a start without any X yet waits for its first position
            if s.seen_x || !s.active {
                s.began = false;
            }
            s.moved = false;
            s.ended = false;
        }

        let mut out = Vec::new();
        for (kind, touches) in [
            (TouchKind::Start, began),
            (TouchKind::Move, moved),
            (TouchKind::End, ended),
        ] {
            if !touches.is_empty() {
                out.push(RawEvent::Touch { kind, touches });
            }
        }
        out
    }
}
