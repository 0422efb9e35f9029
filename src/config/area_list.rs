//! Authority-area list loading (spec.md §4.1 pass 3): for each area, its
//! SOA file, schema file, and each class's attribute-defs file.

use std::collections::HashMap;
use std::path::Path;

use super::{Error, Line, ParsedLine, ServerRoot};
use crate::model::{
    AreaType, Attribute, AttributeBuilder, AttributeFlags, AttrType, AuthorityArea, Class,
    IndexKind, ServerRef, Soa,
};

/// Splits a file's tag/value lines into blocks delimited by `---`/`_NEW_`
/// separators, preserving repeated tags (e.g. multiple `alias` lines)
/// in declaration order.
fn read_blocks(path: &Path) -> Result<Vec<Vec<(usize, Line)>>, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        match super::parse_line(raw) {
            Some(ParsedLine::TagValue(line)) => current.push((idx + 1, line)),
            Some(ParsedLine::Separator) => {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    Ok(blocks)
}

fn values<'a>(block: &'a [(usize, Line)], tag: &str) -> Vec<&'a str> {
    block.iter().filter(|(_, l)| l.tag == tag).map(|(_, l)| l.value.as_str()).collect()
}

fn value<'a>(block: &'a [(usize, Line)], tag: &str) -> Option<&'a str> {
    values(block, tag).into_iter().next()
}

fn parse_bool_field(v: Option<&str>) -> bool {
    matches!(v.map(str::to_ascii_lowercase).as_deref(), Some("on") | Some("yes") | Some("true") | Some("1"))
}

fn parse_server_ref(path: &Path, line: usize, raw: &str) -> Result<ServerRef, Error> {
    let (host, port) = raw.rsplit_once(':').ok_or_else(|| Error::Parse {
        path: path.display().to_string(),
        line,
        message: format!("expected host:port, got '{raw}'"),
    })?;
    let port: u16 = port.parse().map_err(|_| Error::Parse {
        path: path.display().to_string(),
        line,
        message: format!("invalid port in '{raw}'"),
    })?;
    Ok(ServerRef { host: host.to_string(), port })
}

pub fn load_area_list(
    path: &Path,
    root: &ServerRoot,
) -> Result<HashMap<String, AuthorityArea>, Error> {
    let mut areas = HashMap::new();
    for block in read_blocks(path)? {
        let area = load_one_area(path, &block, root)?;
        areas.insert(area.name().to_string(), area);
    }
    Ok(areas)
}

fn load_one_area(
    list_path: &Path,
    block: &[(usize, Line)],
    root: &ServerRoot,
) -> Result<AuthorityArea, Error> {
    let line_no = block.first().map(|(n, _)| *n).unwrap_or(0);
    let name = value(block, "name").ok_or_else(|| Error::Parse {
        path: list_path.display().to_string(),
        line: line_no,
        message: "area block missing 'name'".into(),
    })?;
    let area_type = match value(block, "type") {
        Some("secondary") => AreaType::Secondary,
        _ => AreaType::Primary,
    };
    let data_dir = root.resolve(value(block, "data-dir").unwrap_or("."))?;
    let guardians = values(block, "guardian").into_iter().map(str::to_string).collect();

    let masters = values(block, "master")
        .into_iter()
        .map(|v| parse_server_ref(list_path, line_no, v))
        .collect::<Result<Vec<_>, _>>()?;
    let slaves = values(block, "slave")
        .into_iter()
        .map(|v| parse_server_ref(list_path, line_no, v))
        .collect::<Result<Vec<_>, _>>()?;

    match area_type {
        AreaType::Primary => {
            let schema_file = root.resolve(value(block, "schema-file").unwrap_or("schema"))?;
            let soa_file = root.resolve(value(block, "soa-file").unwrap_or("soa"))?;
            let soa = load_soa(&soa_file)?;
            let schema = load_schema(&schema_file, root)?;
            Ok(AuthorityArea::new(
                name, area_type, data_dir, schema_file, soa_file, soa, masters, slaves, guardians,
                schema,
            )?)
        }
        AreaType::Secondary => {
            let schema_file = root.resolve(value(block, "schema-file").unwrap_or("schema"))?;
            let soa_file = root.resolve(value(block, "soa-file").unwrap_or("soa"))?;
            // A secondary's schema and SOA arrive from its master via the
            // slave-pull mechanism (out of scope); it starts with an empty
            // schema per spec.md §3's invariant.
            let soa = Soa {
                serial_number: "0".into(),
                refresh_interval: 3600,
                increment_interval: 3600,
                retry_interval: 600,
                time_to_live: 86400,
                primary_server: masters.first().cloned().unwrap_or(ServerRef {
                    host: String::new(),
                    port: 0,
                }),
                hostmaster: String::new(),
            };
            Ok(AuthorityArea::new(
                name, area_type, data_dir, schema_file, soa_file, soa, masters, slaves, guardians,
                Vec::new(),
            )?)
        }
    }
}

fn load_soa(path: &Path) -> Result<Soa, Error> {
    let lines = super::read_tag_value_lines(path)?;
    let get = |tag: &str| lines.iter().find(|(_, l)| l.tag == tag).map(|(_, l)| l.value.as_str());
    let get_num = |tag: &str, default: u32| -> Result<u32, Error> {
        match get(tag) {
            Some(v) => v.parse().map_err(|_| Error::Parse {
                path: path.display().to_string(),
                line: 0,
                message: format!("invalid numeric value for '{tag}': '{v}'"),
            }),
            None => Ok(default),
        }
    };

    Ok(Soa {
        serial_number: get("Serial-Number").unwrap_or("0").to_string(),
        refresh_interval: get_num("Refresh-Interval", 3600)?,
        increment_interval: get_num("Increment-Interval", 3600)?,
        retry_interval: get_num("Retry-Interval", 600)?,
        time_to_live: get_num("Time-To-Live", 86400)?,
        primary_server: match get("Primary-Server") {
            Some(raw) => parse_server_ref(path, 0, raw)?,
            None => ServerRef { host: String::new(), port: 0 },
        },
        hostmaster: get("Hostmaster").unwrap_or_default().to_string(),
    })
}

fn load_schema(path: &Path, root: &ServerRoot) -> Result<Vec<Class>, Error> {
    let mut classes = Vec::new();
    for block in read_blocks(path)? {
        let line_no = block.first().map(|(n, _)| *n).unwrap_or(0);
        let name = value(&block, "name").ok_or_else(|| Error::Parse {
            path: path.display().to_string(),
            line: line_no,
            message: "class block missing 'name'".into(),
        })?;
        let aliases = values(&block, "alias").into_iter().map(str::to_string).collect();
        let description = value(&block, "description").unwrap_or_default().to_string();
        let version = value(&block, "schema-version").unwrap_or("0").to_string();
        let data_dir = root.resolve(value(&block, "dbdir").unwrap_or("."))?;
        let attr_file_raw = value(&block, "attributedef").ok_or_else(|| Error::Parse {
            path: path.display().to_string(),
            line: line_no,
            message: "class block missing 'attributedef'".into(),
        })?;
        let attr_file = root.resolve(attr_file_raw)?;
        let parse_program = match value(&block, "parse-program") {
            Some(p) => Some(root.resolve(p)?),
            None => None,
        };
        let attributes = load_attribute_defs(&attr_file)?;

        classes.push(Class::new(
            name,
            aliases,
            description,
            version,
            data_dir,
            attr_file,
            parse_program,
            Class::base_attributes(),
            attributes,
        )?);
    }
    Ok(classes)
}

fn load_attribute_defs(path: &Path) -> Result<Vec<Attribute>, Error> {
    let mut attributes = Vec::new();
    for (idx, block) in read_blocks(path)?.into_iter().enumerate() {
        let line_no = block.first().map(|(n, _)| *n).unwrap_or(0);
        let name = value(&block, "attribute").ok_or_else(|| Error::Parse {
            path: path.display().to_string(),
            line: line_no,
            message: "attribute block missing 'attribute'".into(),
        })?;

        let index = match value(&block, "index") {
            Some("exact") => IndexKind::ExactValue,
            Some("cidr") => IndexKind::Cidr,
            Some("soundex") => IndexKind::Soundex,
            Some("all") => IndexKind::AllWords,
            _ => IndexKind::None,
        };
        let attr_type = match value(&block, "type") {
            Some("id") => AttrType::Id,
            Some("see-also") => AttrType::SeeAlso,
            _ => AttrType::Text,
        };
        let flags = AttributeFlags {
            required: parse_bool_field(value(&block, "is-required")),
            repeatable: parse_bool_field(value(&block, "is-repeat")),
            multi_line: parse_bool_field(value(&block, "is-multi-line")),
            primary_key: parse_bool_field(value(&block, "is-primary-key")),
            hierarchical: parse_bool_field(value(&block, "is-hierarchical")),
            private: parse_bool_field(value(&block, "is-private")),
        };

        let mut builder = AttributeBuilder::new(name)
            .ids((idx + 1) as u32, (idx + 1) as u32)
            .description(value(&block, "description").unwrap_or_default())
            .index(index)
            .attr_type(attr_type)
            .flags(flags);
        for alias in values(&block, "attrib-alias") {
            builder = builder.alias(alias);
        }
        if let Some(format) = value(&block, "format") {
            builder = builder.format(format);
        }

        attributes.push(builder.build()?);
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_a_primary_area_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = ServerRoot::new(dir.path().to_path_buf(), false);

        write_file(
            dir.path(),
            "attrs.tmpl",
            "attribute: Domain-Name\nis-required: on\nindex: exact\n",
        );
        write_file(
            dir.path(),
            "schema",
            "name: domain\ndbdir: data/domain\nattributedef: attrs.tmpl\n",
        );
        write_file(
            dir.path(),
            "soa",
            "Serial-Number: 20260101000000000\nPrimary-Server: rwhois.example:4321\nHostmaster: hm@example\n",
        );
        let list_path = write_file(
            dir.path(),
            "rwhoisd.auth_area",
            "type: primary\nname: example.com\ndata-dir: data\nschema-file: schema\nsoa-file: soa\n",
        );

        let areas = load_area_list(&list_path, &root).unwrap();
        let area = areas.get("example.com").unwrap();
        assert_eq!(area.area_type(), AreaType::Primary);
        let class = area.class("domain").unwrap();
        assert!(class.attribute("Domain-Name").is_some());
        assert_eq!(area.soa().serial_number, "20260101000000000");
    }
}
