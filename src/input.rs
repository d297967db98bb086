//! Multi-touch device discovery (evdev 0.13)

use anyhow::{Result, anyhow};
use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};
use log::{debug, warn};
use std::time::Instant;

use crate::swipe::TouchEvent;
use crate::tracker::Tracker;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

impl DeviceInfo {
    pub fn describe(&self) -> String {
        format!("{} ({})", self.name, self.path)
    }
}

/// X/Y ranges of the MT position axes: `(x_min, x_max, y_min, y_max)`.
pub type AxisRanges = (i32, i32, i32, i32);

fn is_multitouch(dev: &Device) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    });
    has_abs && has_mt
}

pub fn discover_multitouch() -> Vec<DeviceInfo> {
    let mut out = vec![];
    let Ok(rd) = std::fs::read_dir("/dev/input") else {
        return out;
    };
    for e in rd.flatten() {
        let p = e.path();
        let is_event_node = p
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("event"));
        if !is_event_node {
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
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

pub fn axis_ranges(dev: &Device) -> Option<AxisRanges> {
    let (mut x, mut y) = (None, None);
    for (code, info) in dev.get_absinfo().ok()? {
        if code == AbsoluteAxisCode::ABS_MT_POSITION_X {
            x = Some((info.minimum(), info.maximum()));
        } else if code == AbsoluteAxisCode::ABS_MT_POSITION_Y {
            y = Some((info.minimum(), info.maximum()));
        }
    }
    let ((x_min, x_max), (y_min, y_max)) = (x?, y?);
    Some((x_min, x_max, y_min, y_max))
}

/// Open every detected device in non-blocking mode, with its axis ranges.
pub fn open_multitouch() -> Result<Vec<(Device, Option<AxisRanges>)>> {
    let devices = discover_multitouch();
    if devices.is_empty() {
        return Err(anyhow!("no multitouch devices detected"));
    }
    let mut out = vec![];
    for d in devices {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                if let Err(e) = dev.set_nonblocking(true) {
                    warn!("failed to set {} non-blocking: {e}", d.path);
                    continue;
                }
                let ranges = axis_ranges(&dev);
                debug!("opened {} ranges={ranges:?}", d.describe());
                out.push((dev, ranges));
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if out.is_empty() {
        return Err(anyhow!("failed to open all detected devices"));
    }
    Ok(out)
}

/// Live touch events from every multitouch device, one slot decoder per device.
pub struct TouchSource {
    lanes: Vec<(Device, Tracker)>,
    names: Vec<String>,
    clock: Instant,
}

impl TouchSource {
    pub fn open(surface: (f32, f32)) -> Result<Self> {
        let mut lanes = vec![];
        let mut names = vec![];
        for (dev, ranges) in open_multitouch()? {
            let mut tracker = Tracker::new();
            if let Some((x_min, x_max, y_min, y_max)) = ranges {
                tracker.set_norm_ranges(x_min, x_max, y_min, y_max);
            }
            tracker.set_surface(surface.0, surface.1);
            names.push(dev.name().unwrap_or("unknown").to_string());
            lanes.push((dev, tracker));
        }
        Ok(Self {
            lanes,
            names,
            clock: Instant::now(),
        })
    }

    pub fn device_names(&self) -> &[String] {
        &self.names
    }

    pub fn set_surface(&mut self, width: f32, height: f32) {
        for (_, tracker) in self.lanes.iter_mut() {
            tracker.set_surface(width, height);
        }
    }

    /// Drain pending kernel events. Returns `(device index, event)` pairs in arrival order.
    pub fn poll(&mut self) -> Vec<(usize, TouchEvent)> {
        let mut out = vec![];
        for (idx, (dev, tracker)) in self.lanes.iter_mut().enumerate() {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => tracker.on_slot(ev.value()),
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            tracker.on_tracking_id(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            tracker.on_pos_x(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            tracker.on_pos_y(ev.value())
                        }
                        _ => {}
                    }
                } else if ev.event_type() == EventType::SYNCHRONIZATION
                    && ev.code() == SynchronizationCode::SYN_REPORT.0
                {
                    let now = self.clock.elapsed().as_secs_f64();
                    out.extend(tracker.on_syn_report(now).into_iter().map(|e| (idx, e)));
                }
            }
        }
        out
    }
}
