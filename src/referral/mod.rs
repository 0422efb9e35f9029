//! Hierarchical referral algorithm (spec.md §4.4).

pub mod key;

use std::collections::HashMap;

use crate::model::{AuthorityArea, Direction, Referral};

pub use key::HierKey;

/// The record-store lookup the referral engine needs: given an authority
/// area and its `Referral` class, return every hit for the synthetic query
/// `referral Referred-Auth-Area=<key>`, paired with the value each hit
/// carries on its `Referral` attribute (one entry per value, since the
/// attribute is repeatable).
///
/// Implemented by [`crate::store`] against the on-disk index/data files;
/// kept as a trait here so the referral algorithm has no dependency on the
/// store's file layout.
pub trait ReferralLookup {
    fn find_referral_urls(&self, area: &AuthorityArea, key: &HierKey) -> Vec<String>;
}

/// Resolves the referrals for one query term's hierarchical key against the
/// loaded authority areas, falling back to the punt file (spec.md §4.4).
pub struct ReferralEngine<'a> {
    areas: &'a HashMap<String, AuthorityArea>,
    punt_referrals: &'a [String],
    is_root: bool,
}

impl<'a> ReferralEngine<'a> {
    pub fn new(
        areas: &'a HashMap<String, AuthorityArea>,
        punt_referrals: &'a [String],
        is_root: bool,
    ) -> Self {
        ReferralEngine { areas, punt_referrals, is_root }
    }

    /// Resolves `term_key`, walking from most specific to least (spec.md
    /// §4.4, steps 1–2).
    pub fn resolve(&self, term_key: &HierKey, lookup: &impl ReferralLookup) -> Vec<Referral> {
        let Some((area, area_key)) = self.most_specific_containing_area(term_key) else {
            return self.punt();
        };

        if !area.has_referral_class() {
            return self.punt();
        }

        let mut key = term_key.clone();
        loop {
            let urls = lookup.find_referral_urls(area, &key);
            if !urls.is_empty() {
                return urls
                    .into_iter()
                    .map(|url| {
                        let normalized = normalize_url(&url, Some(&key.to_string()));
                        Referral::down(normalized, key.to_string())
                    })
                    .collect();
            }
            match key.reduce() {
                Some(reduced) if area_key.contains(&reduced) || reduced == area_key => {
                    key = reduced;
                }
                _ => break,
            }
        }

        self.punt()
    }

    fn most_specific_containing_area(&self, key: &HierKey) -> Option<(&'a AuthorityArea, HierKey)> {
        self.areas
            .values()
            .filter_map(|area| {
                let area_key = HierKey::parse(area.name());
                area_key.contains(key).then_some((area, area_key))
            })
            .max_by_key(|(_, area_key)| specificity(area_key))
    }

    fn punt(&self) -> Vec<Referral> {
        if self.is_root {
            return Vec::new();
        }
        self.punt_referrals.iter().map(|url| Referral::up(url.clone())).collect()
    }
}

fn specificity(key: &HierKey) -> u32 {
    let mut depth = 0;
    let mut cur = Some(key.clone());
    while let Some(k) = cur {
        depth += 1;
        cur = k.reduce();
    }
    depth
}

/// Normalises a referral URL per spec.md §4.4: strips a trailing `/`, then
/// appends `/auth-area=<name>` when the URL has no explicit `auth-area=`
/// component and a referred area is known. Idempotent.
pub fn normalize_url(url: &str, referred_auth_area: Option<&str>) -> String {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    if trimmed.contains("auth-area=") {
        return trimmed.to_string();
    }
    match referred_auth_area {
        Some(area) => format!("{trimmed}/auth-area={area}"),
        None => trimmed.to_string(),
    }
}

/// A referral record is valid only if its `Referred-Auth-Area` value lies
/// within the enclosing area (spec.md §4.4).
pub fn validate_referred_area(enclosing_area: &str, referred_auth_area: &str) -> bool {
    let enclosing = HierKey::parse(enclosing_area);
    let referred = HierKey::parse(referred_auth_area);
    enclosing.contains(&referred) && enclosing != referred
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubLookup(Vec<String>);

    impl ReferralLookup for StubLookup {
        fn find_referral_urls(&self, _area: &AuthorityArea, _key: &HierKey) -> Vec<String> {
            self.0.clone()
        }
    }

    struct EmptyLookup;

    impl ReferralLookup for EmptyLookup {
        fn find_referral_urls(&self, _area: &AuthorityArea, _key: &HierKey) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn normalizes_by_stripping_trailing_slash_and_appending_auth_area() {
        let url = normalize_url("rwhois://other.example:4321/", Some("sub.biz."));
        assert_eq!(url, "rwhois://other.example:4321/auth-area=sub.biz.");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_url("rwhois://other.example:4321/", Some("sub.biz."));
        let twice = normalize_url(&once, Some("sub.biz."));
        assert_eq!(once, twice);
    }

    #[test]
    fn referred_area_must_be_strictly_inside_enclosing_area() {
        assert!(validate_referred_area("biz.", "sub.biz."));
        assert!(!validate_referred_area("biz.", "biz."));
        assert!(!validate_referred_area("sub.biz.", "biz."));
    }

    #[test]
    fn punt_suppressed_when_flagged_root() {
        let areas = HashMap::new();
        let punts = vec!["rwhois://root.example:4321".to_string()];
        let engine = ReferralEngine::new(&areas, &punts, true);
        assert!(engine.resolve(&HierKey::parse("unknown.tld"), &EmptyLookup).is_empty());
    }

    #[test]
    fn punt_emitted_when_no_area_matches_and_not_root() {
        let areas = HashMap::new();
        let punts = vec!["rwhois://root.example:4321".to_string()];
        let engine = ReferralEngine::new(&areas, &punts, false);
        let referrals = engine.resolve(&HierKey::parse("unknown.tld"), &EmptyLookup);
        assert_eq!(referrals.len(), 1);
        assert_eq!(referrals[0].url, "rwhois://root.example:4321");
    }

    #[test]
    fn link_referral_found_via_lookup() {
        let mut areas = HashMap::new();
        let soa = crate::model::Soa {
            serial_number: "1".into(),
            refresh_interval: 3600,
            increment_interval: 3600,
            retry_interval: 600,
            time_to_live: 86400,
            primary_server: crate::model::ServerRef { host: "h".into(), port: 4321 },
            hostmaster: "hm@example".into(),
        };
        let referral_class = crate::model::Class::new(
            "referral",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            crate::model::Class::base_attributes(),
            vec![crate::model::AttributeBuilder::new("Referred-Auth-Area")
                .index(crate::model::IndexKind::ExactValue)
                .build()
                .unwrap()],
        )
        .unwrap();
        let area = crate::model::AuthorityArea::new(
            "biz.",
            crate::model::AreaType::Primary,
            "/data".into(),
            "/schema".into(),
            "/soa".into(),
            soa,
            vec![],
            vec![],
            vec![],
            vec![referral_class],
        )
        .unwrap();
        areas.insert("biz.".into(), area);

        let lookup = StubLookup(vec!["rwhois://other.example:4321".to_string()]);
        let engine = ReferralEngine::new(&areas, &[], false);
        let referrals = engine.resolve(&HierKey::parse("sub.biz."), &lookup);
        assert_eq!(referrals.len(), 1);
        assert_eq!(referrals[0].url, "rwhois://other.example:4321/auth-area=sub.biz.");
    }
}
