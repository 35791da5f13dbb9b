//! Filter predicates sent along with every cluster request.

use crate::core::subscription::{Listeners, Subscription};
use crate::{MapError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Either a boolean flag or a string-equality value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Flag(bool),
    Text(String),
}

impl FilterValue {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterValue::Flag(_) => FilterKind::Boolean,
            FilterValue::Text(_) => FilterKind::StringEquality,
        }
    }
}

impl From<bool> for FilterValue {
    fn from(flag: bool) -> Self {
        FilterValue::Flag(flag)
    }
}

impl From<&str> for FilterValue {
    fn from(text: &str) -> Self {
        FilterValue::Text(text.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(text: String) -> Self {
        FilterValue::Text(text)
    }
}

/// Conjunction of active filters; empty means "no filtering"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    entries: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        let mut set = Self::new();
        set.entries.insert(key.into(), value.into());
        set
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Boolean,
    StringEquality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub kind: FilterKind,
    pub display_name: String,
}

/// Recognized filter keys and their kinds
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCatalogue {
    entries: BTreeMap<String, FilterDescriptor>,
}

static DEFAULT_CATALOGUE: Lazy<FilterCatalogue> = Lazy::new(|| {
    let mut catalogue = FilterCatalogue::default();
    for (key, name) in [("gender", "Gender"), ("country_of_residence", "Country")] {
        catalogue.insert(key, FilterKind::StringEquality, name);
    }
    for (key, name) in [
        ("is_graduate_learner", "Graduate"),
        ("is_wage_employed", "Employed"),
        ("is_running_a_venture", "Entrepreneur"),
        ("is_featured", "Featured"),
        ("is_featured_video", "Has Video"),
    ] {
        catalogue.insert(key, FilterKind::Boolean, name);
    }
    catalogue
});

impl FilterCatalogue {
    /// The learner-map filters the reference clustering service understands
    pub fn standard() -> Self {
        DEFAULT_CATALOGUE.clone()
    }

    pub fn insert(&mut self, key: impl Into<String>, kind: FilterKind, display_name: impl Into<String>) {
        self.entries.insert(
            key.into(),
            FilterDescriptor {
                kind,
                display_name: display_name.into(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&FilterDescriptor> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a catalogue from the service's `availableFilters` document
    /// (`{"filters": {"key": "description", ...}}`).
    ///
    /// The document carries descriptions only, so kinds come from the standard
    /// catalogue when the key is known and from a `true/false` hint otherwise.
    pub fn from_available_filters(document: &Value) -> Result<Self> {
        let filters = document
            .get("filters")
            .and_then(Value::as_object)
            .ok_or_else(|| MapError::ParseError("availableFilters has no `filters` object".to_string()))?;

        let mut catalogue = Self::default();
        for (key, description) in filters {
            let description = description.as_str().unwrap_or_default();
            let known = DEFAULT_CATALOGUE.get(key);
            let kind = match known {
                Some(descriptor) => descriptor.kind,
                None if description.contains("true/false") => FilterKind::Boolean,
                None => FilterKind::StringEquality,
            };
            let display_name = known
                .map(|d| d.display_name.clone())
                .unwrap_or_else(|| key.clone());
            catalogue.insert(key.clone(), kind, display_name);
        }
        Ok(catalogue)
    }

    pub fn validate(&self, key: &str, value: &FilterValue) -> Result<()> {
        let descriptor = self
            .get(key)
            .ok_or_else(|| MapError::InvalidFilter(format!("unknown filter key `{key}`")))?;
        if descriptor.kind != value.kind() {
            return Err(MapError::InvalidFilter(format!(
                "filter `{key}` expects {:?}, got {:?}",
                descriptor.kind,
                value.kind()
            )));
        }
        if let FilterValue::Text(text) = value {
            if text.trim().is_empty() {
                return Err(MapError::InvalidFilter(format!("filter `{key}` has an empty value")));
            }
        }
        Ok(())
    }

    pub fn validate_set(&self, set: &FilterSet) -> Result<()> {
        set.iter().try_for_each(|(key, value)| self.validate(key, value))
    }
}

/// Owner of the active [`FilterSet`].
///
/// Every mutator reports whether the set actually changed; listeners are only
/// notified on real changes.
pub struct FilterState {
    catalogue: FilterCatalogue,
    active: FilterSet,
    listeners: Listeners<FilterSet>,
}

impl FilterState {
    pub fn new(catalogue: FilterCatalogue) -> Self {
        Self {
            catalogue,
            active: FilterSet::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn current(&self) -> &FilterSet {
        &self.active
    }

    pub fn catalogue(&self) -> &FilterCatalogue {
        &self.catalogue
    }

    /// Swaps the catalogue, dropping active filters it no longer recognizes
    pub fn set_catalogue(&mut self, catalogue: FilterCatalogue) -> bool {
        let retained: BTreeMap<_, _> = self
            .active
            .entries
            .iter()
            .filter(|(key, value)| catalogue.validate(key, value).is_ok())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.catalogue = catalogue;
        self.commit(FilterSet { entries: retained })
    }

    /// Adds or updates one filter, keeping the others (conjunction)
    pub fn set(&mut self, key: &str, value: impl Into<FilterValue>) -> Result<bool> {
        let value = value.into();
        self.catalogue.validate(key, &value)?;
        let next = self.active.clone().with(key, value);
        Ok(self.commit(next))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let mut next = self.active.clone();
        next.entries.remove(key);
        self.commit(next)
    }

    /// Radio-button semantics: make this the only active filter, or clear
    /// everything when it already is
    pub fn toggle_exclusive(&mut self, key: &str, value: impl Into<FilterValue>) -> Result<bool> {
        let value = value.into();
        self.catalogue.validate(key, &value)?;
        let candidate = FilterSet::single(key, value);
        if self.active == candidate {
            Ok(self.commit(FilterSet::new()))
        } else {
            Ok(self.commit(candidate))
        }
    }

    pub fn replace(&mut self, set: FilterSet) -> Result<bool> {
        self.catalogue.validate_set(&set)?;
        Ok(self.commit(set))
    }

    pub fn clear(&mut self) -> bool {
        self.commit(FilterSet::new())
    }

    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FilterSet) + Send + Sync + 'static,
    {
        self.listeners.subscribe(callback)
    }

    fn commit(&mut self, next: FilterSet) -> bool {
        if next == self.active {
            return false;
        }
        log::debug!("filters changed: {:?} -> {:?}", self.active, next);
        self.active = next;
        self.listeners.notify(&self.active);
        true
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(FilterCatalogue::standard())
    }
}
