//! Attribute definitions (spec.md §3, Attribute row).

use super::{is_identifier, ModelError};

/// The type tag carried on the wire for an attribute's value (spec.md §4.3
/// dump format: `Class:Attr;T:Value` where `T` is `S` for see-also or `I`
/// for id-typed attributes; text-typed attributes carry no `;T`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Text,
    Id,
    SeeAlso,
}

impl AttrType {
    /// The `;T` wire tag, or `None` for plain text attributes.
    pub fn wire_tag(self) -> Option<char> {
        match self {
            AttrType::Text => None,
            AttrType::Id => Some('I'),
            AttrType::SeeAlso => Some('S'),
        }
    }
}

/// How an attribute's values are indexed for lookup (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    None,
    AllWords,
    ExactValue,
    Cidr,
    Soundex,
}

/// Per-attribute flags (spec.md §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeFlags {
    pub required: bool,
    pub repeatable: bool,
    pub multi_line: bool,
    pub primary_key: bool,
    pub hierarchical: bool,
    pub private: bool,
}

/// A single field definition within a class.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    aliases: Vec<String>,
    local_id: u32,
    global_id: u32,
    description: String,
    format: Option<String>,
    index: IndexKind,
    attr_type: AttrType,
    flags: AttributeFlags,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// True if `candidate` matches the attribute's name or any alias
    /// case-insensitively, per the attribute-name resolution rule used
    /// throughout the protocol (spec.md §4.2, §4.6).
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name.eq_ignore_ascii_case(candidate)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(candidate))
    }

    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    pub fn global_id(&self) -> u32 {
        self.global_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn index(&self) -> IndexKind {
        self.index
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn flags(&self) -> AttributeFlags {
        self.flags
    }
}

/// Builder enforcing the invariants from spec.md §8 before an [`Attribute`]
/// can be constructed: `primary_key => required`, and `multi_line` and
/// `repeatable` are mutually exclusive.
#[derive(Debug, Default)]
pub struct AttributeBuilder {
    name: Option<String>,
    aliases: Vec<String>,
    local_id: u32,
    global_id: u32,
    description: String,
    format: Option<String>,
    index: Option<IndexKind>,
    attr_type: AttrType,
    flags: AttributeFlags,
}

impl Default for AttrType {
    fn default() -> Self {
        AttrType::Text
    }
}

impl AttributeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn ids(mut self, local_id: u32, global_id: u32) -> Self {
        self.local_id = local_id;
        self.global_id = global_id;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn index(mut self, index: IndexKind) -> Self {
        self.index = Some(index);
        self
    }

    pub fn attr_type(mut self, attr_type: AttrType) -> Self {
        self.attr_type = attr_type;
        self
    }

    pub fn flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> Result<Attribute, ModelError> {
        let name = self.name.unwrap_or_default();
        if !is_identifier(&name) {
            return Err(ModelError::InvalidIdentifier { value: name });
        }
        for alias in &self.aliases {
            if !is_identifier(alias) {
                return Err(ModelError::InvalidIdentifier { value: alias.clone() });
            }
        }
        if self.flags.primary_key && !self.flags.required {
            return Err(ModelError::PrimaryKeyNotRequired { attribute: name });
        }
        if self.flags.multi_line && self.flags.repeatable {
            return Err(ModelError::MultiLineAndRepeatable { attribute: name });
        }

        Ok(Attribute {
            name,
            aliases: self.aliases,
            local_id: self.local_id,
            global_id: self.global_id,
            description: self.description,
            format: self.format,
            index: self.index.unwrap_or(IndexKind::None),
            attr_type: self.attr_type,
            flags: self.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_requires_required_flag() {
        let flags = AttributeFlags { primary_key: true, required: false, ..Default::default() };
        let err = AttributeBuilder::new("Domain-Name").flags(flags).build().unwrap_err();
        assert!(matches!(err, ModelError::PrimaryKeyNotRequired { .. }));
    }

    #[test]
    fn multi_line_and_repeatable_are_exclusive() {
        let flags =
            AttributeFlags { multi_line: true, repeatable: true, ..Default::default() };
        let err = AttributeBuilder::new("Remarks").flags(flags).build().unwrap_err();
        assert!(matches!(err, ModelError::MultiLineAndRepeatable { .. }));
    }

    #[test]
    fn alias_matching_is_case_insensitive() {
        let attr = AttributeBuilder::new("Domain-Name").alias("cn").build().unwrap();
        assert!(attr.matches_name("domain-name"));
        assert!(attr.matches_name("CN"));
        assert!(!attr.matches_name("Other"));
    }

    #[test]
    fn rejects_non_identifier_names() {
        let err = AttributeBuilder::new("1bad").build().unwrap_err();
        assert!(matches!(err, ModelError::InvalidIdentifier { .. }));
    }
}
