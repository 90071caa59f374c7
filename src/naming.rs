//! Unique output name generation.
//!
//! [`GrowOnlySet`] records claims and never forgets them. [`NameAllocator`]
//! builds on it to hand out output names such as `doc (2).tif` that never
//! collide with pending, existing or previously issued names.
//!
//! Neither type synchronizes internally. Claims take `&mut self`, so a single
//! owner (the controller thread) drives them; share one across threads only
//! behind a `Mutex`.

use regex::Regex;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::Hash;

/// A set that only grows, remembering insertion order.
#[derive(Debug, Clone)]
pub struct GrowOnlySet<T> {
    order: Vec<T>,
    members: HashSet<T>,
}

impl<T: Eq + Hash + Clone> GrowOnlySet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            members: HashSet::new(),
        }
    }

    /// Record `item` if it is new. Returns false if it was already claimed.
    pub fn try_claim(&mut self, item: T) -> bool {
        if self.members.contains(&item) {
            return false;
        }
        self.members.insert(item.clone());
        self.order.push(item);
        true
    }

    /// Check if `item` was claimed.
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.members.contains(item)
    }

    /// Number of successful claims.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing was claimed yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Claims in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}

impl<T: Eq + Hash + Clone> Default for GrowOnlySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> Extend<T> for GrowOnlySet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.try_claim(item);
        }
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for GrowOnlySet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Hands out output names that were never issued before.
///
/// When the candidate is taken, a ` (n)` suffix is placed before the
/// extension, counting up from `suffix_start` (or from one past the suffix the
/// candidate already carries) until a free name is found.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    claimed: GrowOnlySet<String>,
    issued: Vec<String>,
    case_sensitive: bool,
    suffix_start: u32,
    suffix_regex: Regex,
}

impl NameAllocator {
    /// Create an allocator with case-insensitive names and suffixes from 2.
    pub fn new() -> Self {
        Self {
            claimed: GrowOnlySet::new(),
            issued: Vec::new(),
            case_sensitive: false,
            suffix_start: 2,
            suffix_regex: Regex::new(r"^(?P<base>.*\S) \((?P<n>\d+)\)$")
                .expect("suffix pattern is valid"),
        }
    }

    /// Treat names differing only in case as distinct.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// First numeric suffix to try.
    pub fn with_suffix_start(mut self, start: u32) -> Self {
        self.suffix_start = start.max(1);
        self
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Claim `name` exactly. Returns false if it is already taken.
    pub fn try_claim(&mut self, name: &str) -> bool {
        let key = self.key(name);
        if self.claimed.try_claim(key) {
            self.issued.push(name.to_string());
            true
        } else {
            false
        }
    }

    /// Claim names that already exist elsewhere (files on disk, open documents).
    ///
    /// Returns how many were new.
    pub fn claim_existing<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| self.try_claim(name.as_ref()))
            .count()
    }

    /// Check if `name` was claimed.
    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(self.key(name).as_str())
    }

    /// Number of claims made.
    pub fn count(&self) -> usize {
        self.claimed.len()
    }

    /// Claimed names in claim order, with their original casing.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.issued.iter().map(String::as_str)
    }

    /// Claim `candidate`, or the first free numbered variant of it.
    pub fn allocate(&mut self, candidate: &str) -> String {
        if self.try_claim(candidate) {
            return candidate.to_string();
        }

        let (stem, extension) = split_extension(candidate);
        let start = u64::from(self.suffix_start);
        let (mut base, mut n) = self
            .suffix_regex
            .captures(stem)
            .and_then(|caps| {
                let next = caps["n"].parse::<u64>().ok()?.checked_add(1)?;
                Some((caps["base"].to_string(), next.max(start)))
            })
            .unwrap_or_else(|| (stem.to_string(), start));

        // Every attempt is a new string: the counter only grows, and when it
        // runs out the numbered name becomes the new base.
        loop {
            let name = format!("{} ({}){}", base, n, extension);
            if self.try_claim(&name) {
                log::debug!("allocated output name {:?} for {:?}", name, candidate);
                return name;
            }
            n = match n.checked_add(1) {
                Some(next) => next,
                None => {
                    base = format!("{} ({})", base, n);
                    start
                }
            };
        }
    }
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `name` into stem and extension (with its dot).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(dot) => name.split_at(dot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_only_set_claims_once() {
        let mut set = GrowOnlySet::new();
        assert!(set.try_claim("a"));
        assert!(set.try_claim("b"));
        assert!(!set.try_claim("a"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_grow_only_set_count_matches_successes() {
        let mut set = GrowOnlySet::new();
        let inputs = [3, 1, 3, 2, 1, 4, 4, 4];
        let successes = inputs.iter().filter(|&&i| set.try_claim(i)).count();
        assert_eq!(successes, 4);
        assert_eq!(set.len(), successes);
    }

    #[test]
    fn test_grow_only_set_from_iter() {
        let set: GrowOnlySet<u32> = [1, 2, 2, 3].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&2));
    }

    #[test]
    fn test_allocate_adds_suffix() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("doc.tif"), "doc.tif");
        assert_eq!(names.allocate("doc.tif"), "doc (2).tif");
        assert_eq!(names.allocate("doc.tif"), "doc (3).tif");
        assert_eq!(names.count(), 3);
    }

    #[test]
    fn test_allocate_continues_existing_suffix() {
        let mut names = NameAllocator::new();
        names.claim_existing(["report (4).pdf"]);
        assert_eq!(names.allocate("report (4).pdf"), "report (5).pdf");
    }

    #[test]
    fn test_allocate_skips_claimed_suffixes() {
        let mut names = NameAllocator::new();
        let added = names.claim_existing(["a.tif", "a (2).tif", "A (3).TIF"]);
        assert_eq!(added, 3);
        assert_eq!(names.allocate("a.tif"), "a (4).tif");
    }

    #[test]
    fn test_allocate_past_u32_suffix() {
        let mut names = NameAllocator::new();
        names.claim_existing(["x (4294967295).tif"]);
        assert_eq!(
            names.allocate("x (4294967295).tif"),
            "x (4294967296).tif"
        );

        let mut names = NameAllocator::new().with_suffix_start(u32::MAX);
        assert_eq!(names.allocate("a.tif"), "a.tif");
        assert_eq!(names.allocate("a.tif"), "a (4294967295).tif");
        assert_eq!(names.allocate("a.tif"), "a (4294967296).tif");
    }

    #[test]
    fn test_allocate_when_suffix_counter_is_exhausted() {
        let mut names = NameAllocator::new();
        let max = format!("x ({}).tif", u64::MAX);
        names.claim_existing([max.as_str()]);
        assert_eq!(
            names.allocate(&max),
            format!("x ({}) (2).tif", u64::MAX)
        );

        let huge = "y (99999999999999999999999).tif";
        names.claim_existing([huge]);
        assert_eq!(names.allocate(huge), "y (99999999999999999999999) (2).tif");
        assert_eq!(names.count(), 4);
    }

    #[test]
    fn test_case_sensitive_names() {
        let mut names = NameAllocator::new().with_case_sensitive(true);
        assert_eq!(names.allocate("Doc.tif"), "Doc.tif");
        assert_eq!(names.allocate("doc.tif"), "doc.tif");

        let mut names = NameAllocator::new();
        names.allocate("Doc.tif");
        assert!(names.is_claimed("DOC.TIF"));
    }

    #[test]
    fn test_no_extension_and_dotfile() {
        let mut names = NameAllocator::new();
        names.allocate("batch");
        assert_eq!(names.allocate("batch"), "batch (2)");
        names.allocate(".hidden");
        assert_eq!(names.allocate(".hidden"), ".hidden (2)");
    }

    #[test]
    fn test_history_keeps_order_and_case() {
        let mut names = NameAllocator::new().with_suffix_start(1);
        names.allocate("X.tif");
        names.allocate("x.tif");
        assert_eq!(names.history().collect::<Vec<_>>(), vec!["X.tif", "x (1).tif"]);
    }
}
