//! In-memory model of the directory: attributes, classes, authority areas,
//! records and referrals.
//!
//! Mirrors the data model table of the RWhois protocol (version 1.5):
//! every authority area owns a schema of classes, every class owns an
//! ordered list of attribute definitions, and every record is a sequence of
//! attribute/value pairs validated against its class.

mod attribute;
mod auth_area;
mod class;
mod record;
mod referral;
mod session;

pub use attribute::{Attribute, AttributeBuilder, AttributeFlags, AttrType, IndexKind};
pub use auth_area::{AreaType, AuthorityArea, ServerRef, Soa};
pub use class::Class;
pub use record::{AnonymousRecord, AttrValue, Record};
pub use referral::{Direction, Referral};
pub use session::{DisplayMode, ProtocolPhase, RegisterAction, SessionState};

/// Names of the implicit base attributes added to the head of every class
/// (spec.md §4.1).
pub const BASE_ATTRIBUTES: &[&str] =
    &["Class-Name", "ID", "Auth-Area", "Updated", "Guardian", "Private", "TTL"];

/// Errors raised while constructing or validating model values.
#[derive(Debug)]
pub enum ModelError {
    /// A primary-key attribute was declared optional.
    PrimaryKeyNotRequired { attribute: String },
    /// An attribute was declared both multi-line and repeatable.
    MultiLineAndRepeatable { attribute: String },
    /// A name or alias does not satisfy the identifier grammar.
    InvalidIdentifier { value: String },
    /// Two attributes (or an attribute and an alias) collide on name.
    DuplicateAttributeName { class: String, name: String },
    /// Two classes (or a class and an alias) collide on name.
    DuplicateClassName { area: String, name: String },
    /// A class declared no attributes beyond the implicit base set.
    ClassHasNoAttributes { class: String },
    /// An authority area name fails the domain/CIDR name grammar.
    InvalidAreaName { value: String },
    /// A primary authority area was given a non-empty master list, or a
    /// secondary was given an empty one (spec.md §3, Authority area row).
    InconsistentServerLists { area: String },
    /// A required attribute of the class was absent from a record.
    RequiredAttributeMissing { class: String, attribute: String },
    /// A non-repeatable attribute appeared more than once in a record.
    AttributeRepeated { class: String, attribute: String },
    /// A value did not satisfy its attribute's declared format.
    FormatMismatch { attribute: String, value: String },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::PrimaryKeyNotRequired { attribute } => {
                write!(f, "primary-key attribute '{attribute}' must be required")
            }
            ModelError::MultiLineAndRepeatable { attribute } => {
                write!(f, "attribute '{attribute}' cannot be both multi-line and repeatable")
            }
            ModelError::InvalidIdentifier { value } => {
                write!(f, "'{value}' is not a valid identifier")
            }
            ModelError::DuplicateAttributeName { class, name } => {
                write!(f, "duplicate attribute name '{name}' in class '{class}'")
            }
            ModelError::DuplicateClassName { area, name } => {
                write!(f, "duplicate class name '{name}' in authority area '{area}'")
            }
            ModelError::ClassHasNoAttributes { class } => {
                write!(f, "class '{class}' declares no attributes beyond the base set")
            }
            ModelError::InvalidAreaName { value } => {
                write!(f, "'{value}' is not a valid authority area name")
            }
            ModelError::InconsistentServerLists { area } => {
                write!(f, "authority area '{area}' has an inconsistent master/slave server list")
            }
            ModelError::RequiredAttributeMissing { class, attribute } => {
                write!(f, "required attribute '{attribute}' missing from a '{class}' record")
            }
            ModelError::AttributeRepeated { class, attribute } => {
                write!(f, "non-repeatable attribute '{attribute}' repeated in a '{class}' record")
            }
            ModelError::FormatMismatch { attribute, value } => {
                write!(f, "value '{value}' does not match the format of attribute '{attribute}'")
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// Validates that `s` satisfies the RWhois identifier grammar: starts with a
/// letter, followed by letters, digits, `-` or `_`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
