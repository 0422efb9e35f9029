//! On-disk indexes mapping a key to the `(file_no, offset)` of the data
//! record it names (spec.md §3, SPEC_FULL §2).
//!
//! All three index kinds share the same on-disk shape, a `key:file_no:offset`
//! line per entry, and differ only in how the lookup key is derived from a
//! query value.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::referral::key::NetworkPrefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub file_no: u32,
    pub offset: u64,
}

fn read_entries(path: &Path) -> io::Result<Vec<(String, Location)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = OpenOptions::new().read(true).open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.rsplitn(3, ':');
        let offset = parts.next();
        let file_no = parts.next();
        let key = parts.next();
        if let (Some(key), Some(file_no), Some(offset)) = (key, file_no, offset) {
            if let (Ok(file_no), Ok(offset)) = (file_no.parse(), offset.parse()) {
                entries.push((key.to_string(), Location { file_no, offset }));
            }
        }
    }
    Ok(entries)
}

fn write_entries(path: &Path, entries: &[(String, Location)]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    for (key, loc) in entries {
        writeln!(file, "{}:{}:{}", key, loc.file_no, loc.offset)?;
    }
    file.flush()
}

/// Exact-match index: one entry per literal attribute value, lower-cased.
#[derive(Debug, Clone)]
pub struct ExactIndex {
    path: PathBuf,
    entries: HashMap<String, Vec<Location>>,
}

impl ExactIndex {
    pub fn load(path: PathBuf) -> io::Result<Self> {
        let mut entries: HashMap<String, Vec<Location>> = HashMap::new();
        for (key, loc) in read_entries(&path)? {
            entries.entry(key).or_default().push(loc);
        }
        Ok(ExactIndex { path, entries })
    }

    pub fn lookup(&self, value: &str) -> &[Location] {
        self.entries.get(&value.to_ascii_lowercase()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, value: &str, loc: Location) {
        self.entries.entry(value.to_ascii_lowercase()).or_default().push(loc);
    }

    pub fn remove(&mut self, value: &str, loc: Location) {
        if let Some(locs) = self.entries.get_mut(&value.to_ascii_lowercase()) {
            locs.retain(|l| *l != loc);
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        let flat: Vec<(String, Location)> = self
            .entries
            .iter()
            .flat_map(|(key, locs)| locs.iter().map(move |loc| (key.clone(), *loc)))
            .collect();
        write_entries(&self.path, &flat)
    }
}

/// CIDR index: network prefixes, looked up by strict-or-equal containment
/// (spec.md §4.4) rather than exact string match.
#[derive(Debug, Clone)]
pub struct CidrIndex {
    path: PathBuf,
    entries: Vec<(NetworkPrefix, Location)>,
}

impl CidrIndex {
    pub fn load(path: PathBuf) -> io::Result<Self> {
        let mut entries = Vec::new();
        for (key, loc) in read_entries(&path)? {
            if let Ok(prefix) = key.parse::<NetworkPrefix>() {
                entries.push((prefix, loc));
            }
        }
        Ok(CidrIndex { path, entries })
    }

    /// Every indexed network that contains `query`, most specific first.
    pub fn lookup(&self, query: &NetworkPrefix) -> Vec<Location> {
        let mut matches: Vec<&(NetworkPrefix, Location)> =
            self.entries.iter().filter(|(net, _)| net.contains(query) || query.contains(net)).collect();
        matches.sort_by_key(|(net, _)| std::cmp::Reverse(net.len()));
        matches.into_iter().map(|(_, loc)| *loc).collect()
    }

    pub fn insert(&mut self, prefix: NetworkPrefix, loc: Location) {
        self.entries.push((prefix, loc));
    }

    pub fn remove(&mut self, prefix: NetworkPrefix, loc: Location) {
        self.entries.retain(|(p, l)| !(*p == prefix && *l == loc));
    }

    pub fn flush(&self) -> io::Result<()> {
        let flat: Vec<(String, Location)> =
            self.entries.iter().map(|(net, loc)| (net.to_string(), *loc)).collect();
        write_entries(&self.path, &flat)
    }
}

/// Soundex index: phonetic match on a text attribute (e.g. a contact's last
/// name), per spec.md §3's index-kind list.
#[derive(Debug, Clone)]
pub struct SoundexIndex {
    path: PathBuf,
    entries: HashMap<String, Vec<Location>>,
}

impl SoundexIndex {
    pub fn load(path: PathBuf) -> io::Result<Self> {
        let mut entries: HashMap<String, Vec<Location>> = HashMap::new();
        for (key, loc) in read_entries(&path)? {
            entries.entry(key).or_default().push(loc);
        }
        Ok(SoundexIndex { path, entries })
    }

    pub fn lookup(&self, value: &str) -> &[Location] {
        self.entries.get(&soundex(value)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, value: &str, loc: Location) {
        self.entries.entry(soundex(value)).or_default().push(loc);
    }

    pub fn remove(&mut self, value: &str, loc: Location) {
        if let Some(locs) = self.entries.get_mut(&soundex(value)) {
            locs.retain(|l| *l != loc);
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        let flat: Vec<(String, Location)> = self
            .entries
            .iter()
            .flat_map(|(key, locs)| locs.iter().map(move |loc| (key.clone(), *loc)))
            .collect();
        write_entries(&self.path, &flat)
    }
}

/// Classic American Soundex (4 characters: one letter, three digits).
pub fn soundex(value: &str) -> String {
    let letters: Vec<char> = value.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    let Some(&first) = letters.first() else {
        return "0000".to_string();
    };

    let code = |c: char| -> Option<char> {
        match c.to_ascii_uppercase() {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    };

    let mut digits = String::new();
    let mut last_code = code(first);
    for &c in &letters[1..] {
        // H and W are transparent: they neither produce a digit nor reset
        // the dedup state, so a repeated consonant separated only by H/W
        // still collapses (e.g. "Ashcraft" -> A,s,h,c,r,a,f,t -> A261).
        if matches!(c.to_ascii_uppercase(), 'H' | 'W') {
            continue;
        }
        let current = code(c);
        if let Some(d) = current {
            if current != last_code {
                digits.push(d);
            }
        }
        last_code = current;
        if digits.len() == 3 {
            break;
        }
    }

    while digits.len() < 3 {
        digits.push('0');
    }
    format!("{}{}", first.to_ascii_uppercase(), digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soundex_matches_classic_examples() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Ashcraft"), "A261");
    }

    #[test]
    fn exact_index_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domain.exact");
        let mut index = ExactIndex::load(path.clone()).unwrap();
        index.insert("Example.Com", Location { file_no: 1, offset: 42 });
        index.flush().unwrap();

        let reloaded = ExactIndex::load(path).unwrap();
        assert_eq!(reloaded.lookup("example.com"), &[Location { file_no: 1, offset: 42 }]);
    }

    #[test]
    fn cidr_index_orders_matches_most_specific_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.cidr");
        let mut index = CidrIndex::load(path).unwrap();
        index.insert("10.0.0.0/8".parse().unwrap(), Location { file_no: 1, offset: 0 });
        index.insert("10.1.0.0/16".parse().unwrap(), Location { file_no: 1, offset: 100 });

        let query: NetworkPrefix = "10.1.2.0/24".parse().unwrap();
        let matches = index.lookup(&query);
        assert_eq!(matches, vec![Location { file_no: 1, offset: 100 }, Location { file_no: 1, offset: 0 }]);
    }
}
