//! Dump formatting: renders a resolved [`Record`] into wire lines (spec.md
//! §4.3).

use crate::model::{Class, DisplayMode, Record};

/// Renders `record`'s visible attribute lines for `display`, honoring the
/// private-attribute suppression rule: a private record, or a private
/// attribute within a non-private record, is dropped unless `reader_names`
/// satisfies the record's guardian list (spec.md §4.3).
///
/// Each line is `Class:Attr:Value`, or `Class:Attr;T:Value` when the
/// attribute carries a wire type tag (see-also `S`, id `I`). `display ==
/// Full` additionally prefixes each line with a comment line carrying the
/// attribute's description the first time it's seen in the record.
pub fn render(record: &Record, class: &Class, display: DisplayMode, reader_names: &[&str]) -> Vec<String> {
    if record.is_private(class) && !satisfies_guardian(record, class, reader_names) {
        return Vec::new();
    }

    let mut lines = Vec::new();
    for field in &record.fields {
        let Some(attr) = class.attribute(&field.name) else { continue };
        if attr.flags().private && !satisfies_guardian(record, class, reader_names) {
            continue;
        }

        if display == DisplayMode::Full && !attr.description().is_empty() {
            lines.push(format!("; {}: {}", attr.name(), attr.description()));
        }

        let tag = match attr.attr_type().wire_tag() {
            Some(t) => format!(";{t}"),
            None => String::new(),
        };
        lines.push(format!("{}:{}{}:{}", class.name(), attr.name(), tag, field.value));
    }
    lines
}

fn satisfies_guardian(record: &Record, class: &Class, reader_names: &[&str]) -> bool {
    let guardians = record.guardians(class);
    if guardians.is_empty() {
        return false;
    }
    guardians.iter().any(|g| reader_names.iter().any(|r| r.eq_ignore_ascii_case(g)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrValue, AttributeBuilder, AttributeFlags, IndexKind};

    fn domain_class() -> Class {
        let domain_name = AttributeBuilder::new("Domain-Name")
            .index(IndexKind::ExactValue)
            .flags(AttributeFlags { required: true, ..Default::default() })
            .build()
            .unwrap();
        Class::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            Class::base_attributes(),
            vec![domain_name],
        )
        .unwrap()
    }

    fn record_with(fields: Vec<(&str, &str)>) -> Record {
        Record {
            class_name: "domain".into(),
            area_name: "example.com".into(),
            data_file_id: 1,
            offset: 0,
            fields: fields
                .into_iter()
                .map(|(name, value)| AttrValue { name: name.into(), value: value.into() })
                .collect(),
        }
    }

    #[test]
    fn renders_plain_attribute_lines() {
        let class = domain_class();
        let record = record_with(vec![("ID", "X.42"), ("Domain-Name", "example.com")]);
        let lines = render(&record, &class, DisplayMode::Dump, &[]);
        assert!(lines.contains(&"domain:ID;I:X.42".to_string()));
        assert!(lines.contains(&"domain:Domain-Name:example.com".to_string()));
    }

    #[test]
    fn private_record_suppressed_without_guardian_match() {
        let class = domain_class();
        let record =
            record_with(vec![("ID", "X.42"), ("Private", "yes"), ("Guardian", "alice")]);
        assert!(render(&record, &class, DisplayMode::Dump, &[]).is_empty());
        assert!(!render(&record, &class, DisplayMode::Dump, &["alice"]).is_empty());
    }
}
