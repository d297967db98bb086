//! Offline recognition over recorded touch traces.
//!
//! A trace is JSON lines, one [`TraceRecord`] each: a [`TouchEvent`] plus the
//! index of the device it came from. Finger ids are only unique per device, so
//! replay keeps one recognizer per device.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::swipe::{RecognizerConfig, SwipeDirection, SwipeRecognizer, TouchEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Missing in single-device traces.
    #[serde(default)]
    pub device: usize,
    #[serde(flatten)]
    pub event: TouchEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedSwipe {
    pub device: usize,
    pub finger: usize,
    pub direction: SwipeDirection,
    pub time: f64,
}

/// Blank lines and `#` comments are skipped.
pub fn read_trace(reader: impl BufRead) -> Result<Vec<TraceRecord>> {
    let mut out = vec![];
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let rec: TraceRecord =
            serde_json::from_str(line).map_err(|e| anyhow!("trace line {}: {e}", n + 1))?;
        out.push(rec);
    }
    Ok(out)
}

pub fn write_event(mut w: impl Write, device: usize, event: &TouchEvent) -> Result<()> {
    let rec = TraceRecord {
        device,
        event: event.clone(),
    };
    serde_json::to_writer(&mut w, &rec)?;
    writeln!(w)?;
    Ok(())
}

pub fn replay(records: &[TraceRecord], config: &RecognizerConfig) -> Vec<DetectedSwipe> {
    let mut recognizers: BTreeMap<usize, SwipeRecognizer> = BTreeMap::new();
    records
        .iter()
        .filter_map(|rec| {
            let recognizer = recognizers.entry(rec.device).or_insert_with(|| {
                SwipeRecognizer::new(format!("replay/{}", rec.device), config.clone())
            });
            recognizer.handle(&rec.event).map(|direction| DetectedSwipe {
                device: rec.device,
                finger: rec.event.finger(),
                direction,
                time: rec.event.time(),
            })
        })
        .collect()
}
