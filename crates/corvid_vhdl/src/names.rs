//! Allocation of unique VHDL identifiers.
//!
//! VHDL identifiers are case-insensitive, may not start or end with an
//! underscore and may not contain two underscores in a row. A [`NameTable`]
//! turns name hints into identifiers that satisfy those rules and collide
//! neither with each other nor with reserved words.

use crate::keywords;
use std::collections::HashSet;

/// The set of identifiers already in use within one naming region.
#[derive(Debug, Clone)]
pub struct NameTable {
    used: HashSet<String>,
}

impl NameTable {
    /// A table holding the VHDL keywords, the library names and `extra`.
    pub fn new<S: AsRef<str>>(extra: impl IntoIterator<Item = S>) -> Self {
        let mut table = Self {
            used: keywords::reserved().map(str::to_string).collect(),
        };
        for name in extra {
            table.reserve(name.as_ref());
        }
        table
    }

    /// Marks `name` as taken without checking it.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_ascii_lowercase());
    }

    /// Returns `true` if `name` is taken, ignoring letter case.
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(&name.to_ascii_lowercase())
    }

    /// Allocates an identifier derived from `hint`, or from `fallback` when
    /// there is no usable hint.
    pub fn allocate(&mut self, hint: Option<&str>, fallback: &str) -> String {
        let base = match hint.and_then(sanitize) {
            Some(name) if name.starts_with(|c: char| c.is_ascii_alphabetic()) => name,
            Some(name) => format!("{fallback}_{name}"),
            None => fallback.to_string(),
        };
        let name = if self.is_used(&base) {
            format!("{base}_{}", self.free_suffix(&base))
        } else {
            base
        };
        log::trace!("allocated VHDL name `{name}`");
        self.reserve(&name);
        name
    }

    /// The smallest free suffix, assuming suffixes are handed out in order.
    fn free_suffix(&self, base: &str) -> u32 {
        let taken = |n: u32| self.is_used(&format!("{base}_{n}"));
        let mut hi = 1;
        while taken(hi) {
            hi *= 2;
        }
        let mut lo = hi / 2;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if taken(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi
    }
}

/// Replaces characters VHDL does not allow, collapses underscore runs and
/// trims leading and trailing underscores.
fn sanitize(hint: &str) -> Option<String> {
    let mut out = String::with_capacity(hint.len());
    for c in hint.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_are_cleaned_up() {
        let mut names = NameTable::new(Vec::<String>::new());
        assert_eq!(names.allocate(Some("_count__reg_"), "sig"), "count_reg");
        assert_eq!(names.allocate(Some("a.b"), "sig"), "a_b");
        assert_eq!(names.allocate(None, "temp"), "temp");
        assert_eq!(names.allocate(Some("___"), "temp"), "temp_1");
        assert_eq!(names.allocate(Some("3x"), "sig"), "sig_3x");
    }

    #[test]
    fn collisions_ignore_case_and_keywords() {
        let mut names = NameTable::new(["Top"]);
        assert_eq!(names.allocate(Some("top"), "sig"), "top_1");
        assert_eq!(names.allocate(Some("signal"), "sig"), "signal_1");
        assert_eq!(names.allocate(Some("SIGNAL"), "sig"), "SIGNAL_2");
    }

    #[test]
    fn suffixes_stay_unique() {
        let mut names = NameTable::new(Vec::<String>::new());
        let all: Vec<String> = (0..20).map(|_| names.allocate(Some("temp"), "temp")).collect();
        let unique: HashSet<String> = all.iter().map(|n| n.to_ascii_lowercase()).collect();
        assert_eq!(unique.len(), all.len());
        assert_eq!(all[0], "temp");
        assert_eq!(all[1], "temp_1");
        assert_eq!(all[19], "temp_19");
    }

    #[test]
    fn reserved_suffixes_are_skipped() {
        let taken = ["x", "x_1", "x_2", "x_4"];
        let mut names = NameTable::new(taken);
        let first = names.allocate(Some("x"), "sig");
        let second = names.allocate(Some("x"), "sig");
        assert!(!taken.contains(&first.as_str()));
        assert!(!taken.contains(&second.as_str()));
        assert_ne!(first, second);
    }
}
