//! Swipe gesture recognition for multi-touch devices.
//!
//! [`swipe`] is the recognizer itself and has no device dependencies. The
//! remaining modules build the `swipectl` daemon around it: evdev slot
//! decoding, profiles, uinput actions and the control socket.

pub mod actions;
pub mod cli;
pub mod config;
pub mod input;
pub mod ipc;
pub mod logging;
pub mod replay;
pub mod swipe;
pub mod tracker;
