use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::actions::{Action, ActionError};
use crate::input;
use crate::swipe::{RecognizerConfig, SwipeDirection};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

/// Size touch positions are scaled to; swipe distances use the same units.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub surface: Surface,
    #[serde(default)]
    pub swipe: RecognizerConfig,

    // Accept nested/dotted tables and flatten them into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("swipe.directions must name at least one direction")]
    NoDirections,
    #[error("swipe.minimum_distance must be >= 0, got {0}")]
    NegativeDistance(f32),
    #[error("swipe.allowed_variance must be > 0, got {0}")]
    NonPositiveVariance(f32),
    #[error("surface width/height must be positive, got {0}x{1}")]
    BadSurface(f32, f32),
    #[error("empty binding key")]
    EmptyBindingKey,
    #[error("unknown binding '{0}' (expected swipe.left, swipe.right, swipe.up or swipe.down)")]
    UnknownBinding(String),
    #[error("binding '{key}' has invalid action '{action}': {source}")]
    InvalidAction {
        key: String,
        action: String,
        source: ActionError,
    },
    #[error("binding '{0}' uses cmd: but allow_commands=false")]
    CommandsNotAllowed(String),
}

pub fn binding_key(direction: SwipeDirection) -> String {
    format!("swipe.{direction}")
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }

    /// Action bound to a swipe, if any. Bindings are validated on load.
    pub fn action_for(&self, direction: SwipeDirection) -> Option<Action> {
        let raw = self.bindings.get(&binding_key(direction))?;
        match raw.parse() {
            Ok(a) => Some(a),
            Err(e) => {
                warn!("binding for {direction} is unusable: {e}");
                None
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ProfileError> {
        let sw = &self.swipe;
        if sw.directions.is_empty() {
            return Err(ProfileError::NoDirections);
        }
        if sw.minimum_distance < 0.0 {
            return Err(ProfileError::NegativeDistance(sw.minimum_distance));
        }
        if sw.allowed_variance <= 0.0 {
            return Err(ProfileError::NonPositiveVariance(sw.allowed_variance));
        }
        if self.surface.width <= 0.0 || self.surface.height <= 0.0 {
            return Err(ProfileError::BadSurface(
                self.surface.width,
                self.surface.height,
            ));
        }

        for (k, v) in &self.bindings {
            if k.trim().is_empty() {
                return Err(ProfileError::EmptyBindingKey);
            }
            if !SwipeDirection::ALL.iter().any(|d| binding_key(*d) == *k) {
                return Err(ProfileError::UnknownBinding(k.clone()));
            }
            let action: Action = v.parse().map_err(|source| ProfileError::InvalidAction {
                key: k.clone(),
                action: v.clone(),
                source,
            })?;
            if action.is_command() && !self.meta.allow_commands {
                return Err(ProfileError::CommandsNotAllowed(k.clone()));
            }
        }
        Ok(())
    }
}

// --------- custom bindings deserializer (tolerant) ----------
fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub detected_devices: Vec<String>,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("swipectl"))
}

pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let mut state = Self::load_from(config_dir()?)?;
        state.detected_devices = input::discover_multitouch()
            .iter()
            .map(|d| d.describe())
            .collect();
        Ok(state)
    }

    /// Load the active profile under `cfgdir`, installing the default profile first if needed.
    pub fn load_from(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
            detected_devices: vec![],
        })
    }

    /// On error the previous profile stays in effect.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if name.is_empty() || !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "swipe": {
                "directions": self.profile.swipe.directions.to_string(),
                "time_to_swipe": self.profile.swipe.time_to_swipe,
                "allowed_variance": self.profile.swipe.allowed_variance,
                "minimum_distance": self.profile.swipe.minimum_distance,
            },
            "devices": self.detected_devices,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(profdir: &Path, name: &str) -> Result<Profile> {
    let path = profdir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}
