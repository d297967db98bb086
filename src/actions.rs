//! Bound actions and the uinput device that performs them.

use anyhow::{Result, anyhow};
use log::{info, warn};
use std::{
    fmt,
    process::{Command, ExitStatus},
    str::FromStr,
    thread::{self, JoinHandle},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("empty action")]
    Empty,
    #[error("unknown action kind in '{0}'")]
    UnknownKind(String),
    #[error("unknown mouse button: {0}")]
    UnknownButton(String),
    #[error("unknown scroll axis: {0}")]
    UnknownAxis(String),
    #[error("invalid scroll steps: {0}")]
    InvalidSteps(String),
    #[error("unsupported key token: {0}")]
    UnknownKey(String),
    #[error("empty command")]
    EmptyCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

/// Keys a chord may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Ctrl,
    Alt,
    Shift,
    Super,
    Tab,
    Esc,
    Enter,
    Space,
    Minus,
    Equal,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
}

impl FromStr for Key {
    type Err = ActionError;

    fn from_str(tok: &str) -> Result<Self, Self::Err> {
        let k = match tok.trim().to_ascii_uppercase().as_str() {
            "CTRL" | "CONTROL" => Key::Ctrl,
            "ALT" => Key::Alt,
            "SHIFT" => Key::Shift,
            "SUPER" | "META" | "WIN" => Key::Super,
            "TAB" => Key::Tab,
            "ESC" | "ESCAPE" => Key::Esc,
            "ENTER" | "RETURN" => Key::Enter,
            "SPACE" => Key::Space,
            "MINUS" | "-" => Key::Minus,
            "EQUAL" | "=" => Key::Equal,
            "LEFT" => Key::Left,
            "RIGHT" => Key::Right,
            "UP" => Key::Up,
            "DOWN" => Key::Down,
            "PAGEUP" | "PGUP" => Key::PageUp,
            "PAGEDOWN" | "PGDN" => Key::PageDown,
            "HOME" => Key::Home,
            "END" => Key::End,
            _ => return Err(ActionError::UnknownKey(tok.trim().to_string())),
        };
        Ok(k)
    }
}

/// What a binding does when its swipe fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Mouse(MouseButton),
    Scroll { axis: ScrollAxis, steps: i32 },
    Keys(Vec<Key>),
    Toggle,
    Command(String),
}

impl Action {
    pub fn is_command(&self) -> bool {
        matches!(self, Action::Command(_))
    }
}

impl FromStr for Action {
    type Err = ActionError;

    /// `mouse:right`, `scroll:vertical@-3`, `key:ALT+LEFT`, `toggle`, `cmd:notify-send hi`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ActionError::Empty);
        }
        if s == "toggle" {
            return Ok(Action::Toggle);
        }
        if let Some(rest) = s.strip_prefix("mouse:") {
            let btn = match rest.trim().to_ascii_lowercase().as_str() {
                "left" => MouseButton::Left,
                "right" => MouseButton::Right,
                "middle" => MouseButton::Middle,
                other => return Err(ActionError::UnknownButton(other.to_string())),
            };
            return Ok(Action::Mouse(btn));
        }
        if let Some(rest) = s.strip_prefix("scroll:") {
            let (axis, steps) = rest.split_once('@').unwrap_or((rest, "+1"));
            let axis = match axis.trim().to_ascii_lowercase().as_str() {
                "vertical" | "v" => ScrollAxis::Vertical,
                "horizontal" | "h" => ScrollAxis::Horizontal,
                other => return Err(ActionError::UnknownAxis(other.to_string())),
            };
            let steps: i32 = steps
                .trim()
                .parse()
                .map_err(|_| ActionError::InvalidSteps(steps.trim().to_string()))?;
            return Ok(Action::Scroll { axis, steps });
        }
        if let Some(rest) = s.strip_prefix("key:") {
            let keys = rest
                .split('+')
                .map(str::parse)
                .collect::<Result<Vec<Key>, _>>()?;
            return Ok(Action::Keys(keys));
        }
        if let Some(rest) = s.strip_prefix("cmd:") {
            if rest.trim().is_empty() {
                return Err(ActionError::EmptyCommand);
            }
            return Ok(Action::Command(rest.trim().to_string()));
        }
        Err(ActionError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Mouse(b) => write!(f, "mouse:{}", format!("{b:?}").to_ascii_lowercase()),
            Action::Scroll { axis, steps } => write!(
                f,
                "scroll:{}@{steps:+}",
                format!("{axis:?}").to_ascii_lowercase()
            ),
            Action::Keys(keys) => {
                let toks: Vec<String> = keys
                    .iter()
                    .map(|k| format!("{k:?}").to_ascii_uppercase())
                    .collect();
                write!(f, "key:{}", toks.join("+"))
            }
            Action::Toggle => f.write_str("toggle"),
            Action::Command(c) => write!(f, "cmd:{c}"),
        }
    }
}

/// Run `cmd` through `sh -c` without blocking. A detached thread waits on the
/// child so it never lingers as a zombie.
pub fn spawn_command(cmd: &str) -> Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new("sh").arg("-c").arg(cmd).spawn()?;
    let pid = child.id();
    info!("spawned '{cmd}' (pid={pid})");
    let cmd = cmd.to_string();
    let reaper = thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => {
                if !status.success() {
                    warn!("'{cmd}' exited with {status}");
                }
                Some(status)
            }
            Err(e) => {
                warn!("waiting on '{cmd}' failed: {e}");
                None
            }
        })?;
    Ok(reaper)
}

/// Synthetic input output. Falls back to a no-op sink where uinput is missing.
pub struct UinputSink {
    enabled: bool,
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                enabled: true,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self {
            enabled: true,
            linux: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    /// `toggle` always runs; everything else is skipped while disabled.
    pub fn perform(&mut self, action: &Action) -> Result<()> {
        if *action == Action::Toggle {
            self.enabled = !self.enabled;
            info!(
                "actions {}",
                if self.enabled { "enabled" } else { "disabled" }
            );
            return Ok(());
        }
        if !self.enabled {
            return Ok(());
        }
        match action {
            Action::Mouse(btn) => self.click_mouse(*btn),
            Action::Scroll { axis, steps } => self.scroll(*axis, *steps),
            Action::Keys(keys) => self.key_chord(keys),
            Action::Command(cmd) => {
                spawn_command(cmd)?;
                Ok(())
            }
            Action::Toggle => Ok(()),
        }
    }

    pub fn click_mouse(&mut self, btn: MouseButton) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.click(btn)?;
        }
        let _ = btn;
        Ok(())
    }

    pub fn scroll(&mut self, axis: ScrollAxis, steps: i32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.scroll(axis, steps)?;
        }
        let _ = (axis, steps);
        Ok(())
    }

    /// Press in order, release in reverse.
    pub fn key_chord(&mut self, keys: &[Key]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if keys.is_empty() {
            return Err(anyhow!("empty key chord"));
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            for k in keys {
                dev.key_send(map_key(*k), 1)?;
            }
            dev.sync()?;
            for k in keys.iter().rev() {
                dev.key_send(map_key(*k), 0)?;
            }
            dev.sync()?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn map_key(key: Key) -> uinput::event::keyboard::Key {
    use uinput::event::keyboard::Key as K;
    match key {
        Key::Ctrl => K::LeftControl,
        Key::Alt => K::LeftAlt,
        Key::Shift => K::LeftShift,
        Key::Super => K::LeftMeta,
        Key::Tab => K::Tab,
        Key::Esc => K::Esc,
        Key::Enter => K::Enter,
        Key::Space => K::Space,
        Key::Minus => K::Minus,
        Key::Equal => K::Equal,
        Key::Left => K::Left,
        Key::Right => K::Right,
        Key::Up => K::Up,
        Key::Down => K::Down,
        Key::PageUp => K::PageUp,
        Key::PageDown => K::PageDown,
        Key::Home => K::Home,
        Key::End => K::End,
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, relative};

        let mut builder = uinput::default()?
            .name("Swipectl Virtual Input")?
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?;
        for key in [
            Key::Ctrl,
            Key::Alt,
            Key::Shift,
            Key::Super,
            Key::Tab,
            Key::Esc,
            Key::Enter,
            Key::Space,
            Key::Minus,
            Key::Equal,
            Key::Left,
            Key::Right,
            Key::Up,
            Key::Down,
            Key::PageUp,
            Key::PageDown,
            Key::Home,
            Key::End,
        ] {
            builder = builder.event(map_key(key))?;
        }
        let dev = builder.create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn click(&mut self, btn: MouseButton) -> Result<()> {
        use uinput::event::controller::Mouse;
        let m = match btn {
            MouseButton::Left => Mouse::Left,
            MouseButton::Right => Mouse::Right,
            MouseButton::Middle => Mouse::Middle,
        };
        self.dev.send(m, 1)?;
        self.sync()?;
        self.dev.send(m, 0)?;
        self.sync()
    }

    fn scroll(&mut self, axis: ScrollAxis, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        let wheel = match axis {
            ScrollAxis::Vertical => Wheel::Vertical,
            ScrollAxis::Horizontal => Wheel::Horizontal,
        };
        self.dev.send(wheel, steps)?;
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_actions() {
        assert_eq!("mouse:Right".parse::<Action>(), Ok(Action::Mouse(MouseButton::Right)));
        assert_eq!(
            "scroll:vertical@-3".parse::<Action>(),
            Ok(Action::Scroll {
                axis: ScrollAxis::Vertical,
                steps: -3
            })
        );
        assert_eq!(
            "scroll:horizontal".parse::<Action>(),
            Ok(Action::Scroll {
                axis: ScrollAxis::Horizontal,
                steps: 1
            })
        );
        assert_eq!(
            "key:alt + Left".parse::<Action>(),
            Ok(Action::Keys(vec![Key::Alt, Key::Left]))
        );
        assert_eq!("toggle".parse::<Action>(), Ok(Action::Toggle));
        assert_eq!(
            "cmd: notify-send swiped".parse::<Action>(),
            Ok(Action::Command("notify-send swiped".into()))
        );
    }

    #[test]
    fn reject_bad_actions() {
        assert_eq!("".parse::<Action>(), Err(ActionError::Empty));
        assert_eq!(
            "beep".parse::<Action>(),
            Err(ActionError::UnknownKind("beep".into()))
        );
        assert_eq!(
            "mouse:side".parse::<Action>(),
            Err(ActionError::UnknownButton("side".into()))
        );
        assert_eq!(
            "scroll:vertical@lots".parse::<Action>(),
            Err(ActionError::InvalidSteps("lots".into()))
        );
        assert_eq!(
            "key:CTRL+F13".parse::<Action>(),
            Err(ActionError::UnknownKey("F13".into()))
        );
        assert_eq!("cmd:  ".parse::<Action>(), Err(ActionError::EmptyCommand));
    }

    #[test]
    fn display_is_parseable() {
        for s in ["mouse:middle", "scroll:vertical@+2", "key:CTRL+PAGEUP", "toggle"] {
            let a: Action = s.parse().unwrap();
            assert_eq!(a.to_string(), s);
        }
    }

    #[test]
    fn toggle_gates_other_actions() {
        let mut sink = UinputSink::noop();
        assert!(sink.is_enabled());

        sink.perform(&Action::Toggle).unwrap();
        assert!(!sink.is_enabled());
        // no-op while disabled, even for commands
        sink.perform(&Action::Command("false".into())).unwrap();

        sink.perform(&Action::Toggle).unwrap();
        assert!(sink.is_enabled());
    }

    #[test]
    fn spawned_commands_are_reaped() {
        let status = spawn_command("exit 3").unwrap().join().unwrap().unwrap();
        assert_eq!(status.code(), Some(3));

        let status = spawn_command("true").unwrap().join().unwrap().unwrap();
        assert!(status.success());
    }
}
