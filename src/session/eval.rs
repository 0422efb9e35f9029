//! Query evaluation (spec.md §4.3): turns a parsed [`Query`] into a
//! deduplicated, hit-limited set of record locations.

use std::collections::HashSet;

use crate::model::{Attribute, AnonymousRecord, Class, IndexKind, Record};
use crate::referral::key::NetworkPrefix;
use crate::store::RecordStore;
use crate::wire::query::{AndExpr, Op, Query, Term};

/// A query match's location, before the fields behind it are read back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hit {
    pub area: String,
    pub class: String,
    pub file_no: u32,
    pub offset: u64,
}

pub enum EvalOutcome {
    Hits(Vec<Hit>),
    LimitExceeded,
}

/// Evaluates `query` against every area (or just `area_restriction`, for a
/// session pinned to one authority area). OR-branches union into one
/// deduplicated set; `hit_limit == 0` means uncapped.
pub fn evaluate(store: &RecordStore, query: &Query, area_restriction: Option<&str>, hit_limit: u32) -> EvalOutcome {
    let mut seen: HashSet<Hit> = HashSet::new();
    for branch in &query.expr.branches {
        let branch_hits = evaluate_and(store, branch, query.class.as_deref(), area_restriction);
        for hit in branch_hits {
            seen.insert(hit);
            if hit_limit != 0 && seen.len() as u32 > hit_limit {
                return EvalOutcome::LimitExceeded;
            }
        }
    }
    EvalOutcome::Hits(seen.into_iter().collect())
}

fn evaluate_and(
    store: &RecordStore,
    branch: &AndExpr,
    class_name: Option<&str>,
    area_restriction: Option<&str>,
) -> HashSet<Hit> {
    let mut iter = branch.terms.iter();
    let Some(first) = iter.next() else { return HashSet::new() };
    let mut acc: HashSet<Hit> = evaluate_term(store, first, class_name, area_restriction).into_iter().collect();
    for term in iter {
        if acc.is_empty() {
            break;
        }
        let term_hits: HashSet<Hit> = evaluate_term(store, term, class_name, area_restriction).into_iter().collect();
        acc = acc.intersection(&term_hits).cloned().collect();
    }
    acc
}

fn evaluate_term(
    store: &RecordStore,
    term: &Term,
    class_name: Option<&str>,
    area_restriction: Option<&str>,
) -> Vec<Hit> {
    let mut hits = Vec::new();
    for area in store.areas().values() {
        if let Some(restricted) = area_restriction {
            if !area.name().eq_ignore_ascii_case(restricted) {
                continue;
            }
        }
        for class in area.schema() {
            if let Some(name) = class_name {
                if !class.matches_name(name) {
                    continue;
                }
            }
            hits.extend(evaluate_term_in_class(store, area.name(), class, term));
        }
    }
    hits
}

fn evaluate_term_in_class(store: &RecordStore, area: &str, class: &Class, term: &Term) -> Vec<Hit> {
    let to_hit =
        |rec: &AnonymousRecord| Hit { area: area.to_string(), class: class.name().to_string(), file_no: rec.data_file_id, offset: rec.offset };

    match &term.attr {
        Some(attr_name) => {
            let Some(attr) = class.attribute(attr_name) else { return Vec::new() };
            let records = lookup_attribute(store, area, class.name(), attr, &term.value);
            let matched: Vec<Hit> = records.iter().map(to_hit).collect();
            match term.op {
                Op::Eq => matched,
                Op::Ne => negate_in_class(store, area, class.name(), &matched),
            }
        }
        None => {
            let mut hits = Vec::new();
            for attr in class.attributes().iter().filter(|a| a.index() != IndexKind::None) {
                let records = lookup_attribute(store, area, class.name(), attr, &term.value);
                hits.extend(records.iter().map(to_hit));
            }
            match term.op {
                Op::Eq => hits,
                Op::Ne => negate_in_class(store, area, class.name(), &hits),
            }
        }
    }
}

fn lookup_attribute(store: &RecordStore, area: &str, class: &str, attr: &Attribute, value: &str) -> Vec<AnonymousRecord> {
    if value.contains('*') {
        return wildcard_scan(store, area, class, attr, value);
    }
    match attr.index() {
        IndexKind::ExactValue | IndexKind::AllWords => store.lookup_exact(area, class, attr.name(), value).unwrap_or_default(),
        IndexKind::Cidr => match value.parse::<NetworkPrefix>() {
            Ok(prefix) => store.lookup_cidr(area, class, attr.name(), &prefix).unwrap_or_default(),
            Err(_) => Vec::new(),
        },
        IndexKind::Soundex => store.lookup_soundex(area, class, attr.name(), value).unwrap_or_default(),
        IndexKind::None => wildcard_scan(store, area, class, attr, value),
    }
}

/// A full, unindexed scan of the class for records whose named attribute
/// matches `pattern`'s `*` wildcards, case-insensitively.
fn wildcard_scan(store: &RecordStore, area: &str, class: &str, attr: &Attribute, pattern: &str) -> Vec<AnonymousRecord> {
    store
        .all_records(area, class)
        .unwrap_or_default()
        .into_iter()
        .filter(|rec| rec.fields.iter().any(|f| attr.matches_name(&f.name) && glob_match(pattern, &f.value)))
        .collect()
}

fn glob_match(pattern: &str, value: &str) -> bool {
    fn helper(p: &[u8], v: &[u8]) -> bool {
        match p.first() {
            None => v.is_empty(),
            Some(b'*') => helper(&p[1..], v) || (!v.is_empty() && helper(p, &v[1..])),
            Some(&c) => !v.is_empty() && c.eq_ignore_ascii_case(&v[0]) && helper(&p[1..], &v[1..]),
        }
    }
    helper(pattern.as_bytes(), value.as_bytes())
}

/// Everything in the class not already in `positive`, for `!=` terms.
fn negate_in_class(store: &RecordStore, area: &str, class: &str, positive: &[Hit]) -> Vec<Hit> {
    let positive_set: HashSet<(u32, u64)> = positive.iter().map(|h| (h.file_no, h.offset)).collect();
    store
        .all_records(area, class)
        .unwrap_or_default()
        .into_iter()
        .filter(|rec| !positive_set.contains(&(rec.data_file_id, rec.offset)))
        .map(|rec| Hit { area: area.to_string(), class: class.to_string(), file_no: rec.data_file_id, offset: rec.offset })
        .collect()
}

/// Reads each hit's fields back from the store, dropping any that vanished
/// underneath us (deleted between evaluation and resolution).
pub fn resolve_records(store: &RecordStore, hits: &[Hit]) -> Vec<Record> {
    let mut records = Vec::new();
    for hit in hits {
        let Ok(Some(anon)) = store.record_at(&hit.area, &hit.class, hit.file_no, hit.offset) else { continue };
        records.push(Record {
            class_name: hit.class.clone(),
            area_name: hit.area.clone(),
            data_file_id: anon.data_file_id,
            offset: anon.offset,
            fields: anon.fields,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_handles_leading_and_trailing_star() {
        assert!(glob_match("*smith", "John Smith"));
        assert!(glob_match("john*", "John Smith"));
        assert!(glob_match("*mit*", "SMITH"));
        assert!(!glob_match("*zzz*", "John Smith"));
    }

    #[test]
    fn glob_match_is_case_insensitive_and_exact_without_stars() {
        assert!(glob_match("Network Solutions", "network solutions"));
        assert!(!glob_match("Network Solutions", "network solutions inc"));
    }
}
