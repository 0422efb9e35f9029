//! Per-connection mutable state (spec.md §3, Session state row).

use std::path::PathBuf;

/// The wire-exposed record rendering mode, toggled by `-display` (spec.md
/// §2, supplemented per the original `display.c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Dump,
    Full,
}

/// Which registration action a spool in progress will commit as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAction {
    Add,
    Mod,
    Del,
}

impl RegisterAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(RegisterAction::Add),
            "mod" => Some(RegisterAction::Mod),
            "del" => Some(RegisterAction::Del),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegisterAction::Add => "add",
            RegisterAction::Mod => "mod",
            RegisterAction::Del => "del",
        }
    }
}

/// Which protocol phase a session is in: plain query/directive dispatch, or
/// accumulating a registration spool (spec.md §4.5).
#[derive(Debug, Clone, Default)]
pub enum ProtocolPhase {
    #[default]
    Query,
    Spool {
        path: PathBuf,
        auth_area: String,
        class: String,
        action: RegisterAction,
        email: String,
    },
}

/// Mutable state carried for the lifetime of one connection.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub hit_limit: u32,
    pub hold_connect: bool,
    pub forward: bool,
    pub display: DisplayMode,
    pub phase: ProtocolPhase,
    pub client_vendor: Option<String>,
    pub notify_email: Option<String>,
    pub restricted_auth_area: Option<String>,
    pub security_negotiated: bool,
}

impl SessionState {
    pub fn new(default_hit_limit: u32) -> Self {
        SessionState {
            hit_limit: default_hit_limit,
            hold_connect: false,
            forward: false,
            display: DisplayMode::default(),
            phase: ProtocolPhase::default(),
            client_vendor: None,
            notify_email: None,
            restricted_auth_area: None,
            security_negotiated: false,
        }
    }

    pub fn in_spool(&self) -> bool {
        matches!(self.phase, ProtocolPhase::Spool { .. })
    }
}
