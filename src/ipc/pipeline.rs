use anyhow::{Result, anyhow};
use log::{error, info, warn};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::{thread, time::Duration};

use super::server::DaemonEvent;
use crate::actions::UinputSink;
use crate::config::{Profile, Surface};
use crate::input::TouchSource;
use crate::swipe::{RecognizerConfig, SwipeRecognizer};

fn snapshot(profile: &Arc<Mutex<Profile>>) -> Result<(RecognizerConfig, Surface)> {
    let p = profile
        .lock()
        .map_err(|_| anyhow!("profile lock poisoned"))?;
    Ok((p.swipe.clone(), p.surface))
}

/// One recognizer per input device; finger ids are only unique per device.
fn build_recognizers(
    names: &[String],
    config: &RecognizerConfig,
    tx_evt: &Sender<DaemonEvent>,
) -> Vec<SwipeRecognizer> {
    names
        .iter()
        .map(|name| {
            let mut r = SwipeRecognizer::new(name.clone(), config.clone());
            let tx = tx_evt.clone();
            r.set_handler(move |ev| {
                let _ = tx.send(DaemonEvent::Swipe {
                    device: ev.recognizer.to_string(),
                    finger: ev.finger,
                    direction: ev.direction,
                });
            });
            r
        })
        .collect()
}

pub fn run_pipeline(profile: Arc<Mutex<Profile>>, tx_evt: Sender<DaemonEvent>) -> Result<()> {
    let (mut config, mut surface) = snapshot(&profile)?;

    let mut source = match TouchSource::open((surface.width, surface.height)) {
        Ok(s) => s,
        Err(e) => {
            warn!("{e}; pipeline idle");
            let _ = tx_evt.send(DaemonEvent::Log(format!("pipeline idle: {e}")));
            return Ok(());
        }
    };
    info!("pipeline: reading {}", source.device_names().join(", "));

    let mut recognizers = build_recognizers(source.device_names(), &config, &tx_evt);
    let mut sink = UinputSink::new().unwrap_or_else(|e| {
        warn!("uinput unavailable ({e}); actions disabled");
        UinputSink::noop()
    });

    loop {
        let events = source.poll();
        if events.is_empty() {
            thread::sleep(Duration::from_millis(4));
            continue;
        }

        // pick up reloaded thresholds between frames
        let (new_config, new_surface) = snapshot(&profile)?;
        // touch origins are in surface units, so a rescale drops touches in flight too
        if new_config != config || new_surface != surface {
            info!("pipeline: swipe settings changed, resetting recognizers");
            source.set_surface(new_surface.width, new_surface.height);
            recognizers = build_recognizers(source.device_names(), &new_config, &tx_evt);
            config = new_config;
            surface = new_surface;
        }

        for (idx, event) in events {
            let Some(direction) = recognizers.get_mut(idx).and_then(|r| r.handle(&event)) else {
                continue;
            };
            let was_enabled = sink.is_enabled();
            if let Err(e) = super::dispatch::dispatch_swipe(direction, &profile, &mut sink) {
                error!("dispatch failed: {e}");
            }
            if sink.is_enabled() != was_enabled {
                let _ = tx_evt.send(DaemonEvent::ActionsEnabled(sink.is_enabled()));
            }
        }
    }
}
