use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Desired state of one URL query parameter.
///
/// A missing or empty `value` means the parameter is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryUpdate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl QueryUpdate {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Update that sets `name` to `value` (an empty `value` still removes it)
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Some(value.into()))
    }

    /// Update that removes `name`
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// The value to write, with empty strings folded into "absent"
    pub fn effective_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }
}

/// Ordered set of updates committed together as a single navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBatch(Vec<QueryUpdate>);

impl QueryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: QueryUpdate) {
        self.0.push(update);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryUpdate> {
        self.0.iter()
    }
}

impl From<QueryUpdate> for QueryBatch {
    fn from(update: QueryUpdate) -> Self {
        Self(vec![update])
    }
}

impl From<Vec<QueryUpdate>> for QueryBatch {
    fn from(updates: Vec<QueryUpdate>) -> Self {
        Self(updates)
    }
}

impl<const N: usize> From<[QueryUpdate; N]> for QueryBatch {
    fn from(updates: [QueryUpdate; N]) -> Self {
        Self(updates.into())
    }
}

impl FromIterator<QueryUpdate> for QueryBatch {
    fn from_iter<I: IntoIterator<Item = QueryUpdate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identifier of a selectable option.
///
/// Backends send identifiers either as strings or as numbers; both are kept
/// in their textual form so `3` and `"3"` identify the same option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OptionValue(String);

impl OptionValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Signed(n) => Self(n.to_string()),
            Raw::Unsigned(n) => Self(n.to_string()),
            Raw::Float(n) => Self(n.to_string()),
        })
    }
}

/// One entry of a selection list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption<T> {
    pub value: OptionValue,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<T>,
}

impl<T> SelectOption<T> {
    pub fn new(value: impl Into<OptionValue>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: T) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A page of options returned by a cursor-paginated source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPage<T> {
    pub items: Vec<SelectOption<T>>,
    /// `None` once the stream is exhausted
    #[serde(default)]
    pub next_cursor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl<T> FetchPage<T> {
    pub fn new(items: Vec<SelectOption<T>>, next_cursor: Option<u64>) -> Self {
        Self {
            items,
            next_cursor,
            total_count: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Parameters handed to an option source for one page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    pub search: String,
    pub cursor: u64,
    pub limit: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl FetchParams {
    /// Flat query-string pairs, fixed parameters first
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("search".to_string(), self.search.clone()),
            ("cursor".to_string(), self.cursor.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        pairs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

/// Identity of one pagination session.
///
/// Accumulated pages belong to exactly one key; any difference restarts
/// pagination from the first cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryKey {
    pub query_name: String,
    pub search: String,
    pub dependencies: Vec<Value>,
}

impl QueryKey {
    pub fn new(query_name: &str, search: &str, dependencies: &[Value]) -> Self {
        Self {
            query_name: query_name.to_string(),
            search: search.trim().to_string(),
            dependencies: dependencies.to_vec(),
        }
    }
}

/// Options keyed by value, in first-insertion order, last write wins.
#[derive(Debug, Clone)]
pub struct OptionSet<T> {
    entries: Vec<SelectOption<T>>,
    index: HashMap<OptionValue, usize>,
}

impl<T> Default for OptionSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> OptionSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten entry keeps its original position
    pub fn insert(&mut self, option: SelectOption<T>) {
        match self.index.get(&option.value) {
            Some(&pos) => self.entries[pos] = option,
            None => {
                self.index.insert(option.value.clone(), self.entries.len());
                self.entries.push(option);
            }
        }
    }

    pub fn get(&self, value: &OptionValue) -> Option<&SelectOption<T>> {
        self.index.get(value).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<SelectOption<T>> {
        self.entries
    }
}

impl<T> Extend<SelectOption<T>> for OptionSet<T> {
    fn extend<I: IntoIterator<Item = SelectOption<T>>>(&mut self, iter: I) {
        for option in iter {
            self.insert(option);
        }
    }
}
