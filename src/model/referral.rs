//! Referral pointer (spec.md §3, Referral row). Construction and
//! containment rules live in [`crate::referral`]; this module only holds
//! the resulting value.

/// Whether a referral points to a more specific area (down, from a local
/// `Referral` record) or toward the root (up/punt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// A pointer to another server that can answer more specifically or more
/// generally than this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referral {
    pub url: String,
    pub referred_auth_area: Option<String>,
    pub direction: Direction,
}

impl Referral {
    pub fn down(url: impl Into<String>, referred_auth_area: impl Into<String>) -> Self {
        Referral {
            url: url.into(),
            referred_auth_area: Some(referred_auth_area.into()),
            direction: Direction::Down,
        }
    }

    pub fn up(url: impl Into<String>) -> Self {
        Referral { url: url.into(), referred_auth_area: None, direction: Direction::Up }
    }
}
