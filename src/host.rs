mod pipeline;
mod replay;

pub use pipeline::run_touch;
pub use replay::{ReplayOptions, Script, run_replay};

use std::{
    thread,
    time::{Duration, Instant},
};

/// Millisecond timeline shared by a widget and its host loop.
#[derive(Debug)]
pub enum Clock {
    /// Jumps straight to each requested instant.
    Simulated { now_ms: u64 },
    Realtime { start: Instant },
}

impl Clock {
    pub fn simulated() -> Self {
        Self::Simulated { now_ms: 0 }
    }

    pub fn realtime() -> Self {
        Self::Realtime {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        match self {
            Self::Simulated { now_ms } => *now_ms,
            Self::Realtime { start } => start.elapsed().as_millis() as u64,
        }
    }

    /// Advances to `at_ms`; never goes backwards.
    pub fn wait_until(&mut self, at_ms: u64) {
        match self {
            Self::Simulated { now_ms } => *now_ms = (*now_ms).max(at_ms),
            Self::Realtime { start } => {
                let target = Duration::from_millis(at_ms);
                let elapsed = start.elapsed();
                if target > elapsed {
                    thread::sleep(target - elapsed);
                }
            }
        }
    }
}
