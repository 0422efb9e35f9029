//! Class definitions (spec.md §3, Class row).

use std::path::PathBuf;

use super::attribute::Attribute;
use super::{is_identifier, ModelError, BASE_ATTRIBUTES};

/// One record type inside an authority area.
#[derive(Debug, Clone)]
pub struct Class {
    name: String,
    aliases: Vec<String>,
    description: String,
    version: String,
    data_dir: PathBuf,
    attr_file: PathBuf,
    parse_program: Option<PathBuf>,
    attributes: Vec<Attribute>,
}

impl Class {
    /// Assembles a class from its schema-file fields and its already-parsed
    /// attribute list, forcibly prepending the base attributes
    /// (`Class-Name`, `ID`, `Auth-Area`, `Updated`, `Guardian`, `Private`,
    /// `TTL`) per spec.md §4.1, then validating the uniqueness and
    /// non-triviality invariants from spec.md §8.
    pub fn new(
        name: impl Into<String>,
        aliases: Vec<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        data_dir: PathBuf,
        attr_file: PathBuf,
        parse_program: Option<PathBuf>,
        base_attributes: Vec<Attribute>,
        mut attributes: Vec<Attribute>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(ModelError::InvalidIdentifier { value: name });
        }
        for alias in &aliases {
            if !is_identifier(alias) {
                return Err(ModelError::InvalidIdentifier { value: alias.clone() });
            }
        }
        if attributes.is_empty() {
            return Err(ModelError::ClassHasNoAttributes { class: name });
        }

        let mut all = base_attributes;
        all.append(&mut attributes);

        let mut seen: Vec<String> = Vec::with_capacity(all.len() * 2);
        for attr in &all {
            for candidate in std::iter::once(attr.name().to_string())
                .chain(attr.aliases().iter().cloned())
            {
                if seen.iter().any(|s| s.eq_ignore_ascii_case(&candidate)) {
                    return Err(ModelError::DuplicateAttributeName { class: name, name: candidate });
                }
                seen.push(candidate);
            }
        }

        Ok(Class {
            name,
            aliases,
            description: description.into(),
            version: version.into(),
            data_dir,
            attr_file,
            parse_program,
            attributes: all,
        })
    }

    /// Builds the seven implicit base attributes in the order spec.md §4.1
    /// requires them to appear (at the head of every class).
    pub fn base_attributes() -> Vec<Attribute> {
        use super::attribute::{AttrType, AttributeBuilder, AttributeFlags, IndexKind};

        let required = |name: &str| -> Attribute {
            AttributeBuilder::new(name)
                .index(IndexKind::ExactValue)
                .flags(AttributeFlags { required: true, ..Default::default() })
                .build()
                .expect("base attribute definitions are well-formed")
        };
        let optional = |name: &str| -> Attribute {
            AttributeBuilder::new(name)
                .index(IndexKind::ExactValue)
                .build()
                .expect("base attribute definitions are well-formed")
        };

        vec![
            required(BASE_ATTRIBUTES[0]),
            AttributeBuilder::new(BASE_ATTRIBUTES[1])
                .attr_type(AttrType::Id)
                .index(IndexKind::ExactValue)
                .flags(AttributeFlags {
                    required: true,
                    primary_key: true,
                    ..Default::default()
                })
                .build()
                .expect("base attribute definitions are well-formed"),
            required(BASE_ATTRIBUTES[2]),
            required(BASE_ATTRIBUTES[3]),
            optional(BASE_ATTRIBUTES[4]),
            optional(BASE_ATTRIBUTES[5]),
            optional(BASE_ATTRIBUTES[6]),
        ]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name.eq_ignore_ascii_case(candidate)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(candidate))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn attr_file(&self) -> &PathBuf {
        &self.attr_file
    }

    pub fn parse_program(&self) -> Option<&PathBuf> {
        self.parse_program.as_ref()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Resolves an attribute by name or alias, per the shared
    /// attribute-name resolution rule.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.matches_name(name))
    }

    /// Every attribute flagged `primary_key`, in declaration order.
    pub fn primary_key_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|attr| attr.flags().primary_key)
    }

    /// Bumps the schema version to a fresh timestamp string, called when the
    /// class's attribute set is mutated (spec.md §3, Class lifecycle).
    pub fn touch_version(&mut self, timestamp: impl Into<String>) {
        self.version = timestamp.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::{AttributeBuilder, IndexKind};

    fn base() -> Vec<Attribute> {
        Class::base_attributes()
    }

    #[test]
    fn rejects_class_with_no_extra_attributes() {
        let err = Class::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            base(),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ClassHasNoAttributes { .. }));
    }

    #[test]
    fn rejects_duplicate_attribute_names() {
        let dup = AttributeBuilder::new("ID").index(IndexKind::ExactValue).build().unwrap();
        let err = Class::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            base(),
            vec![dup],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAttributeName { .. }));
    }

    #[test]
    fn rejects_attribute_alias_colliding_with_another_attributes_name() {
        let a = AttributeBuilder::new("Domain-Name").alias("dn").index(IndexKind::ExactValue).build().unwrap();
        let b = AttributeBuilder::new("Display-Name").alias("Domain-Name").index(IndexKind::ExactValue).build().unwrap();
        let err = Class::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            base(),
            vec![a, b],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAttributeName { .. }));
    }

    #[test]
    fn base_attributes_lead_every_class() {
        let extra =
            AttributeBuilder::new("Domain-Name").index(IndexKind::ExactValue).build().unwrap();
        let class = Class::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            base(),
            vec![extra],
        )
        .unwrap();
        assert_eq!(class.attributes()[0].name(), "Class-Name");
        assert_eq!(class.attributes().last().unwrap().name(), "Domain-Name");
    }
}
