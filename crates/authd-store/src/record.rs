//! Records exchanged with the local store.
//!
//! The persister is keyed by the server-side attribute names produced by
//! the attribute-map resolver, so records carry the raw attribute map next
//! to the parsed core fields.

use std::collections::HashMap;

/// A row returned by an attribute read: attribute name to values.
pub type AttrRow = HashMap<String, Vec<String>>;

/// A user entry as parsed from a directory search result.
#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    /// Login name.
    pub name: String,

    /// Numeric uid, when the mapped attribute was present and parsable.
    pub uid: Option<u32>,

    /// Server-side modification timestamp of the entry.
    pub modstamp: Option<String>,

    /// All returned attributes, keyed by server-side attribute name.
    pub attrs: AttrRow,
}

impl UserRecord {
    /// Creates a record for the given login name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First value of an attribute, if present.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

/// A group entry as parsed from a directory search result.
#[derive(Debug, Clone, Default)]
pub struct GroupRecord {
    /// Group name.
    pub name: String,

    /// Numeric gid, when the mapped attribute was present and parsable.
    pub gid: Option<u32>,

    /// Server-side modification timestamp of the entry.
    pub modstamp: Option<String>,

    /// Login names of the group members.
    pub members: Vec<String>,

    /// All returned attributes, keyed by server-side attribute name.
    pub attrs: AttrRow,
}

impl GroupRecord {
    /// Creates a record for the given group name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
