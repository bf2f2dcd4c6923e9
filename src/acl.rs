//! The NFSv4 ACL model: entries, ordered entry lists and their algebra, and
//! the gateway to the external tools that persist ACLs on disk.

use std::fmt;
use std::ops::{Add, Sub};

mod entry;
mod tools;

pub use entry::{AccessControlEntry, AceType, Permissions, PrincipalContext};
pub use tools::{resolve_domain, AclAction, Nfs4Tools};

/// An ordered collection of access control entries.
///
/// Order matters when the list is applied to a path, but not for equality:
/// two lists are equal when they hold the same entries (as a multiset),
/// irrespective of order.
#[derive(Debug, Clone, Default)]
pub struct AccessControlList {
    entries: Vec<AccessControlEntry>,
}

impl AccessControlList {
    pub fn new(entries: Vec<AccessControlEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AccessControlEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccessControlEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &AccessControlEntry) -> bool {
        self.entries.contains(entry)
    }

    /// Index of the first occurrence of `other`'s exact entry sequence as a
    /// contiguous run within this list.
    fn find_run(&self, other: &Self) -> Option<usize> {
        if other.entries.is_empty() || other.entries.len() > self.entries.len() {
            return None;
        }
        self.entries
            .windows(other.entries.len())
            .position(|window| window == other.entries.as_slice())
    }
}

impl PartialEq for AccessControlList {
    fn eq(&self, other: &Self) -> bool {
        let count = |list: &Self, entry: &AccessControlEntry| {
            list.entries.iter().filter(|e| *e == entry).count()
        };
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|entry| count(self, entry) == count(other, entry))
    }
}

impl Eq for AccessControlList {}

/// Concatenation: `other`'s entries appended after `self`'s.
impl Add<&AccessControlList> for AccessControlList {
    type Output = AccessControlList;

    fn add(mut self, other: &AccessControlList) -> AccessControlList {
        self.entries.extend(other.entries.iter().cloned());
        self
    }
}

/// Contiguous-subsequence removal: drops the first occurrence of `other`'s
/// exact entry sequence. This is not set subtraction; if no contiguous run
/// matches, the list is returned unchanged. It exists to retract a batch of
/// entries that was previously appended as one unit.
impl Sub<&AccessControlList> for AccessControlList {
    type Output = AccessControlList;

    fn sub(mut self, other: &AccessControlList) -> AccessControlList {
        if let Some(start) = self.find_run(other) {
            self.entries.drain(start..start + other.entries.len());
        }
        self
    }
}

impl fmt::Display for AccessControlList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{entry}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<AccessControlEntry> for AccessControlList {
    fn from_iter<I: IntoIterator<Item = AccessControlEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AccessControlList {
    type Item = &'a AccessControlEntry;
    type IntoIter = std::slice::Iter<'a, AccessControlEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
