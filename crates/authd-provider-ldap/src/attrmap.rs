//! Attribute maps.
//!
//! An [`AttributeMap`] translates a logical entity kind (user or group)
//! into the server-side attributes to request. The same names key the
//! persisted records in the local store, so the map is the single source
//! of truth for what the backend knows about an entry.

use serde::{Deserialize, Serialize};

/// Mapped attribute names for one entity kind.
///
/// `object_class` and `name` are always mapped; the rest are optional and
/// skipped when unmapped. Defaults follow RFC 2307.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeMap {
    /// Object class identifying entries of this kind.
    pub object_class: String,

    /// Name attribute (login or group name).
    pub name: String,

    /// Numeric id attribute (uid/gid).
    pub id: Option<String>,

    /// Modification-timestamp attribute used as the enumeration cursor.
    pub modstamp: Option<String>,

    /// Membership attribute (groups only).
    pub member: Option<String>,

    /// Additional mapped attributes requested alongside the core set.
    pub extras: Vec<String>,
}

impl AttributeMap {
    /// RFC 2307 user map: `posixAccount` with `uid`/`uidNumber`.
    #[must_use]
    pub fn users_rfc2307() -> Self {
        Self {
            object_class: "posixAccount".to_string(),
            name: "uid".to_string(),
            id: Some("uidNumber".to_string()),
            modstamp: Some("modifyTimestamp".to_string()),
            member: None,
            extras: vec![
                "gidNumber".to_string(),
                "gecos".to_string(),
                "homeDirectory".to_string(),
                "loginShell".to_string(),
                "userPrincipalName".to_string(),
            ],
        }
    }

    /// RFC 2307 group map: `posixGroup` with `cn`/`gidNumber`.
    #[must_use]
    pub fn groups_rfc2307() -> Self {
        Self {
            object_class: "posixGroup".to_string(),
            name: "cn".to_string(),
            id: Some("gidNumber".to_string()),
            modstamp: Some("modifyTimestamp".to_string()),
            member: Some("memberUid".to_string()),
            extras: Vec::new(),
        }
    }

    /// The attribute list to request from the server.
    ///
    /// Always begins with the object-class attribute, followed by the
    /// mapped names; unmapped slots are skipped.
    #[must_use]
    pub fn request_attrs(&self) -> Vec<String> {
        let mut attrs = vec!["objectClass".to_string(), self.name.clone()];
        for slot in [&self.id, &self.modstamp, &self.member] {
            if let Some(attr) = slot {
                attrs.push(attr.clone());
            }
        }
        attrs.extend(self.extras.iter().cloned());
        attrs
    }
}
