// Strong Types - newtypes for identities and relationship sets
// Replaces bare strings with proper newtype patterns for compile-time safety

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed user identity - the document id of a user record
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Create a new uid
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is a usable id (non-blank, no path separators)
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty() && !self.0.contains('/')
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Set of uids with the storage array's insertion order.
///
/// Mirrors the array-union / array-remove semantics of the document store:
/// inserting an existing member is a no-op, removal keeps the order of the
/// remaining members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Uid>", into = "Vec<Uid>")]
pub struct UidSet(Vec<Uid>);

impl UidSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns true if the uid was not already present
    pub fn insert(&mut self, uid: Uid) -> bool {
        if self.contains(&uid) {
            return false;
        }
        self.0.push(uid);
        true
    }

    /// Returns true if the uid was present
    pub fn remove(&mut self, uid: &Uid) -> bool {
        let before = self.0.len();
        self.0.retain(|member| member != uid);
        before != self.0.len()
    }

    pub fn contains(&self, uid: &Uid) -> bool {
        self.0.iter().any(|member| member == uid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Uid> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<Uid> {
        self.0.clone()
    }
}

impl From<Vec<Uid>> for UidSet {
    fn from(uids: Vec<Uid>) -> Self {
        uids.into_iter().collect()
    }
}

impl From<UidSet> for Vec<Uid> {
    fn from(set: UidSet) -> Self {
        set.0
    }
}

impl FromIterator<Uid> for UidSet {
    fn from_iter<I: IntoIterator<Item = Uid>>(iter: I) -> Self {
        let mut set = UidSet::new();
        for uid in iter {
            set.insert(uid);
        }
        set
    }
}

impl<'a> IntoIterator for &'a UidSet {
    type Item = &'a Uid;
    type IntoIter = std::slice::Iter<'a, Uid>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Ergonomic macro for building uid sets in tests and seeders
#[macro_export]
macro_rules! uid_set {
    ($($uid:expr),* $(,)?) => {
        $crate::core::strong_types::UidSet::from(vec![
            $($crate::core::strong_types::Uid::from($uid)),*
        ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_validation() {
        assert!(Uid::new("alice").is_valid());
        assert!(!Uid::new("").is_valid());
        assert!(!Uid::new("   ").is_valid());
        assert!(!Uid::new("users/alice").is_valid());
    }

    #[test]
    fn test_uid_set_has_set_semantics() {
        let mut set = UidSet::new();
        assert!(set.insert(Uid::from("a")));
        assert!(set.insert(Uid::from("b")));
        assert!(!set.insert(Uid::from("a")));
        assert_eq!(set.len(), 2);

        assert!(set.remove(&Uid::from("a")));
        assert!(!set.remove(&Uid::from("a")));
        assert_eq!(set.to_vec(), vec![Uid::from("b")]);
    }

    #[test]
    fn test_uid_set_deserialize_drops_duplicates() {
        let set: UidSet = serde_json::from_str(r#"["x", "y", "x"]"#).unwrap();
        assert_eq!(set, crate::uid_set!["x", "y"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["x","y"]"#);
    }
}
