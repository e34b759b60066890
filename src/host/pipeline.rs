use anyhow::Result;
use log::{error, info, warn};
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use evdev::{AbsoluteAxisCode, Device, EventType, InputEvent, SynchronizationCode};

use super::Clock;
use crate::actions::RedirectSink;
use crate::config::{OutcomeUrls, Profile};
use crate::device::{self, DeviceInfo};
use crate::input::{HostCommand, MouseTouchAdapter};
use crate::render::Presenter;
use crate::tracker::Tracker;
use crate::widget::Widget;

fn fetch(dev: &mut Device) -> Result<Vec<InputEvent>> {
    match dev.fetch_events() {
        Ok(events) => Ok(events.collect()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn apply(dev: &mut Device, cmds: &[HostCommand]) {
    for cmd in cmds {
        let res = match cmd {
            // keep the compositor from turning the drag into a scroll
            HostCommand::BlockTouchDefaults => dev.grab(),
            HostCommand::RestoreTouchDefaults => dev.ungrab(),
            _ => Ok(()),
        };
        match res {
            Ok(()) => info!("touch device: {cmd:?}"),
            Err(e) => warn!("touch device: {cmd:?} failed: {e}"),
        }
    }
}

/// Drives one widget from a multitouch device until it redirects or `stop` is set.
pub fn run_touch(
    mut dev: Device,
    info: &DeviceInfo,
    profile: &Profile,
    urls: OutcomeUrls,
    presenter: Box<dyn Presenter>,
    sink: &mut dyn RedirectSink,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let track = profile.track.geometry();
    let mut tracker = Tracker::new(track);
    match device::x_range(&dev) {
        Ok((min, max)) => tracker.set_norm_range(min, max),
        Err(e) => warn!("could not read X range of {}: {e}; assuming 0..4096", info.path),
    }
    if let Err(e) = dev.set_nonblocking(true) {
        warn!("failed to make {} non-blocking: {e}", info.path);
    }
    info!("reading touches from {} ({})", info.name, info.path);

    let mut widget = Widget::mount(
        Box::new(MouseTouchAdapter::new()),
        presenter,
        profile.timing.clone(),
        urls,
        track,
    );
    let clock = Clock::realtime();

    while !stop.load(Ordering::Relaxed) {
        let events = fetch(&mut dev)?;
        for ev in &events {
            if ev.event_type() == EventType::ABSOLUTE {
                match ev.code() {
                    c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => tracker.on_slot(ev.value()),
                    c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                        tracker.on_tracking_id(ev.value())
                    }
                    c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => tracker.on_pos_x(ev.value()),
                    _ => {}
                }
            } else if ev.event_type() == EventType::SYNCHRONIZATION
                && ev.code() == SynchronizationCode::SYN_REPORT.0
            {
                let now = clock.now_ms();
                for raw in tracker.on_syn_report() {
                    let cmds = widget.feed(&raw, now);
                    apply(&mut dev, &cmds);
                }
            }
        }

        let cmds = widget.tick(clock.now_ms(), sink);
        apply(&mut dev, &cmds);
        if widget.is_disposed() {
            info!("widget redirected; leaving touch loop");
            return Ok(());
        }

        if events.is_empty() {
            thread::sleep(Duration::from_millis(4));
        }
    }

    // interrupted mid-drag: hand the device back
    if let Err(e) = dev.ungrab() {
        error!("ungrab on exit failed: {e}");
    }
    info!("touch loop stopped by signal");
    Ok(())
}
