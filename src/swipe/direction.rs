//! Swipe directions: a single cardinal direction and the set type used for candidates.

use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

bitflags::bitflags! {
    /// Set of cardinal directions that are still possible (or requested).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Directions: u8 {
        const LEFT  = 0b0001;
        const RIGHT = 0b0010;
        const UP    = 0b0100;
        const DOWN  = 0b1000;
    }
}

impl Default for Directions {
    fn default() -> Self {
        Self::LEFT
    }
}

impl Directions {
    /// Iterate the single directions contained in this set, in detection order.
    pub fn directions(self) -> impl Iterator<Item = SwipeDirection> {
        SwipeDirection::ALL
            .into_iter()
            .filter(move |d| self.contains(d.flag()))
    }
}

impl fmt::Display for Directions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.directions().map(SwipeDirection::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

/// A completed swipe always carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    /// Fixed order in which candidates are checked.
    pub const ALL: [SwipeDirection; 4] = [Self::Left, Self::Right, Self::Up, Self::Down];

    pub fn flag(self) -> Directions {
        match self {
            Self::Left => Directions::LEFT,
            Self::Right => Directions::RIGHT,
            Self::Up => Directions::UP,
            Self::Down => Directions::DOWN,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown swipe direction '{0}' (expected left, right, up or down)")]
pub struct UnknownDirection(pub String);

impl FromStr for SwipeDirection {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(UnknownDirection(s.to_string())),
        }
    }
}

impl From<SwipeDirection> for Directions {
    fn from(d: SwipeDirection) -> Self {
        d.flag()
    }
}

impl FromIterator<SwipeDirection> for Directions {
    fn from_iter<I: IntoIterator<Item = SwipeDirection>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Directions::empty(), |acc, d| acc | d.flag())
    }
}

/// Profiles list directions by name: `directions = ["left", "right"]`.
pub(crate) fn deserialize_directions<'de, D>(de: D) -> Result<Directions, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<SwipeDirection>::deserialize(de)?;
    Ok(names.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_operations() {
        let horizontal = Directions::LEFT | Directions::RIGHT;
        let mut set = Directions::all();

        set &= !Directions::LEFT;
        assert!(!set.contains(Directions::LEFT));
        assert_eq!(set & horizontal, Directions::RIGHT);
        assert_eq!(!horizontal, Directions::UP | Directions::DOWN);
    }

    #[test]
    fn directions_iterate_in_check_order() {
        let set = Directions::DOWN | Directions::LEFT | Directions::UP;
        let order: Vec<_> = set.directions().collect();
        assert_eq!(
            order,
            vec![SwipeDirection::Left, SwipeDirection::Up, SwipeDirection::Down]
        );
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("Up".parse::<SwipeDirection>(), Ok(SwipeDirection::Up));
        assert_eq!(" down ".parse::<SwipeDirection>(), Ok(SwipeDirection::Down));
        assert!("diagonal".parse::<SwipeDirection>().is_err());

        assert_eq!((Directions::RIGHT | Directions::UP).to_string(), "right|up");
        assert_eq!(Directions::empty().to_string(), "none");
    }

    #[test]
    fn collect_into_set() {
        let set: Directions = [SwipeDirection::Left, SwipeDirection::Left, SwipeDirection::Down]
            .into_iter()
            .collect();
        assert_eq!(set, Directions::LEFT | Directions::DOWN);
    }
}
