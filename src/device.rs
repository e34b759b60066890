//! Multitouch device discovery (evdev 0.13.2 compatible)

use anyhow::{Result, anyhow};
use evdev::{AbsoluteAxisCode, Device, EventType};
use log::debug;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

fn is_multitouch(dev: &Device) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_TRACKING_ID)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
    });
    has_abs && has_mt
}

pub fn discover_multitouch() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            if !p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"))
            {
                continue;
            }
            match Device::open(&p) {
                Ok(dev) if is_multitouch(&dev) => out.push(DeviceInfo {
                    path: p.display().to_string(),
                    name: dev.name().unwrap_or("unknown").to_string(),
                }),
                Ok(_) => {}
                Err(e) => debug!("skipping {}: {e}", p.display()),
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// Opens `path`, or the first detected multitouch device when none is given.
pub fn open_touch(path: Option<&Path>) -> Result<(Device, DeviceInfo)> {
    let info = match path {
        Some(p) => DeviceInfo {
            path: p.display().to_string(),
            name: String::new(),
        },
        None => discover_multitouch()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no multitouch devices detected (try `dragverify doctor`)"))?,
    };
    let dev = Device::open(&info.path).map_err(|e| anyhow!("failed to open {}: {e}", info.path))?;
    if !is_multitouch(&dev) {
        return Err(anyhow!("{} is not a multitouch device", info.path));
    }
    let name = dev.name().unwrap_or("unknown").to_string();
    Ok((dev, DeviceInfo { name, ..info }))
}

/// Raw range of ABS_MT_POSITION_X as (min, max).
pub fn x_range(dev: &Device) -> Result<(i32, i32)> {
    let abs = dev.get_abs_state()?;
    let info = abs[AbsoluteAxisCode::ABS_MT_POSITION_X.0 as usize];
    Ok((info.minimum, info.maximum))
}
