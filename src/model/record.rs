//! Records (spec.md §3, Record and Anonymous record rows).

use super::class::Class;
use super::ModelError;

/// One attribute/value pair as read off disk, before the value has been
/// parsed against a declared format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrValue {
    pub name: String,
    pub value: String,
}

/// A record whose class and authority area have not yet been resolved.
/// Produced by the data-file reader; short-lived (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct AnonymousRecord {
    pub data_file_id: u32,
    pub offset: u64,
    pub fields: Vec<AttrValue>,
}

impl AnonymousRecord {
    /// Looks up the first field matching any of `names`, case-insensitively
    /// — the attribute-name resolution rule used to recover `Class-Name`/
    /// `Schema-Name`/`Object-Type`/`cn` and `Auth-Area`/`AA` (spec.md §4.2).
    pub fn field(&self, names: &[&str]) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| names.iter().any(|n| f.name.eq_ignore_ascii_case(n)))
            .map(|f| f.value.as_str())
    }
}

/// A concrete instance of a class, resolved and validated against it.
#[derive(Debug, Clone)]
pub struct Record {
    pub class_name: String,
    pub area_name: String,
    pub data_file_id: u32,
    pub offset: u64,
    pub fields: Vec<AttrValue>,
}

impl Record {
    /// All values for `attribute_name` (case-insensitive, alias-aware
    /// against `class`).
    pub fn values<'a>(&'a self, class: &Class, attribute_name: &str) -> Vec<&'a str> {
        let Some(attr) = class.attribute(attribute_name) else {
            return Vec::new();
        };
        self.fields
            .iter()
            .filter(|f| attr.matches_name(&f.name))
            .map(|f| f.value.as_str())
            .collect()
    }

    pub fn first_value<'a>(&'a self, class: &Class, attribute_name: &str) -> Option<&'a str> {
        self.values(class, attribute_name).into_iter().next()
    }

    /// True if the record carries a non-empty `Private` attribute, or if
    /// `class` marks any present attribute as private (spec.md §4.3, dump
    /// formatting rule).
    pub fn is_private(&self, class: &Class) -> bool {
        if self.first_value(class, "Private").is_some() {
            return true;
        }
        class.attributes().iter().any(|attr| {
            attr.flags().private && self.fields.iter().any(|f| attr.matches_name(&f.name))
        })
    }

    /// Names present on the record's `Guardian` attribute.
    pub fn guardians(&self, class: &Class) -> Vec<&str> {
        self.values(class, "Guardian")
    }

    /// Validates the record against `class` per spec.md §4.2:
    /// - every required attribute present,
    /// - non-repeatable attributes not repeated,
    /// - each value matches its attribute's format, if declared.
    ///
    /// When `find_all` is false, returns the first violation; otherwise
    /// collects every violation found.
    pub fn validate(&self, class: &Class, find_all: bool) -> Result<(), Vec<ModelError>> {
        let mut errors = Vec::new();

        for attr in class.attributes() {
            let count = self.fields.iter().filter(|f| attr.matches_name(&f.name)).count();

            if attr.flags().required && count == 0 {
                errors.push(ModelError::RequiredAttributeMissing {
                    class: class.name().to_string(),
                    attribute: attr.name().to_string(),
                });
                if !find_all {
                    return Err(errors);
                }
            }

            if !attr.flags().repeatable && count > 1 {
                errors.push(ModelError::AttributeRepeated {
                    class: class.name().to_string(),
                    attribute: attr.name().to_string(),
                });
                if !find_all {
                    return Err(errors);
                }
            }

            if let Some(pattern) = attr.format() {
                for field in self.fields.iter().filter(|f| attr.matches_name(&f.name)) {
                    if !crate::wire::format::matches(pattern, &field.value) {
                        errors.push(ModelError::FormatMismatch {
                            attribute: attr.name().to_string(),
                            value: field.value.clone(),
                        });
                        if !find_all {
                            return Err(errors);
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
