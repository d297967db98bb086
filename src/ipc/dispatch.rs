use crate::actions::UinputSink;
use crate::config::Profile;
use crate::swipe::SwipeDirection;
use anyhow::{Result, anyhow};
use log::debug;
use std::sync::{Arc, Mutex};

/// Perform whatever the active profile binds to `direction`.
pub fn dispatch_swipe(
    direction: SwipeDirection,
    profile_arc: &Arc<Mutex<Profile>>,
    sink: &mut UinputSink,
) -> Result<()> {
    let action = {
        let p = profile_arc
            .lock()
            .map_err(|_| anyhow!("profile lock poisoned"))?;
        p.action_for(direction)
    };

    let Some(action) = action else {
        debug!("swipe.{direction}: no binding");
        return Ok(());
    };
    debug!("swipe.{direction} -> {action}");
    sink.perform(&action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(body: &str) -> Arc<Mutex<Profile>> {
        let txt = format!("[meta]\nname = \"t\"\n[bindings]\n{body}\n");
        Arc::new(Mutex::new(Profile::parse(&txt).unwrap()))
    }

    #[test]
    fn bound_toggle_flips_sink() {
        let p = profile("swipe.up = \"toggle\"");
        let mut sink = UinputSink::noop();

        dispatch_swipe(SwipeDirection::Up, &p, &mut sink).unwrap();
        assert!(!sink.is_enabled());
    }

    #[test]
    fn unbound_direction_is_ignored() {
        let p = profile("swipe.up = \"toggle\"");
        let mut sink = UinputSink::noop();

        dispatch_swipe(SwipeDirection::Left, &p, &mut sink).unwrap();
        assert!(sink.is_enabled());
    }

    #[test]
    fn follows_profile_updates() {
        let p = profile("");
        let mut sink = UinputSink::noop();
        dispatch_swipe(SwipeDirection::Down, &p, &mut sink).unwrap();
        assert!(sink.is_enabled());

        *p.lock().unwrap() = Profile::parse("[meta]\n[bindings]\nswipe.down = \"toggle\"\n").unwrap();
        dispatch_swipe(SwipeDirection::Down, &p, &mut sink).unwrap();
        assert!(!sink.is_enabled());
    }
}
