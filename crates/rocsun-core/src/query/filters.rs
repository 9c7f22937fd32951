//! Filter mapping and the outgoing page request.
//!
//! The backend reads "field present" as "apply this constraint", so a filter
//! with no value must be left out of the request body entirely. [`Filters`]
//! enforces that on insertion: blank text is never stored.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::models::Role;

/// Filter keys the page endpoint recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    Username,
    Status,
    Role,
}

impl FilterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Username => "username",
            FilterKey::Status => "status",
            FilterKey::Role => "role",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "username" => Some(FilterKey::Username),
            "status" => Some(FilterKey::Status),
            "role" => Some(FilterKey::Role),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
    Role(Role),
}

/// Active filters, one value per key, never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<FilterKey, FilterValue>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a filter. Blank text removes the key instead of storing it.
    pub fn set(&mut self, key: FilterKey, value: FilterValue) {
        match value {
            FilterValue::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    self.0.remove(&key);
                } else {
                    self.0.insert(key, FilterValue::Text(text.to_string()));
                }
            }
            other => {
                self.0.insert(key, other);
            }
        }
    }

    /// Set or clear a filter from an optional value.
    pub fn set_opt(&mut self, key: FilterKey, value: Option<FilterValue>) {
        match value {
            Some(value) => self.set(key, value),
            None => {
                self.0.remove(&key);
            }
        }
    }

    pub fn get(&self, key: FilterKey) -> Option<&FilterValue> {
        self.0.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FilterKey, &FilterValue)> {
        self.0.iter()
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

/// Search box contents as entered; any field may be absent or blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSearch {
    pub username: Option<String>,
    pub status: Option<bool>,
    pub role: Option<Role>,
}

impl From<UserSearch> for Filters {
    fn from(search: UserSearch) -> Self {
        let mut filters = Filters::new();
        filters.set_opt(FilterKey::Username, search.username.map(FilterValue::Text));
        filters.set_opt(FilterKey::Status, search.status.map(FilterValue::Bool));
        filters.set_opt(FilterKey::Role, search.role.map(FilterValue::Role));
        filters
    }
}

/// Body of `POST /user/page`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub current: u32,
    pub page_size: u32,
    #[serde(flatten)]
    pub filters: Filters,
}
