//! URL query-string state and the single merge-and-commit path that mutates it.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::{QueryBatch, QueryUpdate};

/// Ordered query parameters with `URLSearchParams` semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=1&b=two` (a leading `?` is ignored)
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((name, value)) => (decode(name), decode(value)),
                None => (decode(part), String::new()),
            })
            .collect();

        Self { pairs }
    }

    /// First non-empty value of `name`; empty values read as absent
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, v)| n == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace the first `name` entry and drop any later duplicates
    pub fn set(&mut self, name: &str, value: &str) {
        match self.pairs.iter().position(|(n, _)| n == name) {
            Some(first) => {
                self.pairs[first].1 = value.to_string();
                let mut index = 0;
                self.pairs.retain(|(n, _)| {
                    let keep = index <= first || n != name;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn delete(&mut self, name: &str) {
        self.pairs.retain(|(n, _)| n != name);
    }

    pub fn apply(&mut self, update: &QueryUpdate) {
        match update.effective_value() {
            Some(value) => self.set(&update.name, value),
            None => self.delete(&update.name),
        }
    }

    /// Drop every `name=` entry
    pub fn normalize(&mut self) {
        self.pairs.retain(|(_, v)| !v.is_empty());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(n, v)| format!("{}={}", urlencoding::encode(n), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl FromStr for QueryParams {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateMode {
    /// New history entry
    Push,
    /// Overwrite the current history entry
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub mode: NavigateMode,
    pub scroll: bool,
}

/// Host routing layer that owns the current URL.
pub trait Navigator: Send + Sync {
    fn current(&self) -> QueryParams;
    fn navigate(&self, params: &QueryParams, options: NavigateOptions);
}

#[derive(Debug)]
struct History {
    entries: Vec<QueryParams>,
    index: usize,
    navigations: usize,
}

/// In-memory history stack, for hosts without a browser.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<History>,
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::with_params(QueryParams::new())
    }
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(query: &str) -> Self {
        Self::with_params(QueryParams::parse(query))
    }

    pub fn with_params(params: QueryParams) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![params],
                index: 0,
                navigations: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Step back one entry, as the browser back button would
    pub fn back(&self) -> bool {
        let mut history = self.lock();
        if history.index == 0 {
            return false;
        }
        history.index -= 1;
        true
    }

    pub fn forward(&self) -> bool {
        let mut history = self.lock();
        if history.index + 1 >= history.entries.len() {
            return false;
        }
        history.index += 1;
        true
    }

    /// Number of navigations committed through [`Navigator::navigate`]
    pub fn navigation_count(&self) -> usize {
        self.lock().navigations
    }

    pub fn history_len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn query_string(&self) -> String {
        self.current().to_query_string()
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> QueryParams {
        let history = self.lock();
        history.entries[history.index].clone()
    }

    fn navigate(&self, params: &QueryParams, options: NavigateOptions) {
        let mut history = self.lock();
        history.navigations += 1;
        match options.mode {
            NavigateMode::Push => {
                let next = history.index + 1;
                history.entries.truncate(next);
                history.entries.push(params.clone());
                history.index = next;
            }
            NavigateMode::Replace => {
                let index = history.index;
                history.entries[index] = params.clone();
            }
        }
    }
}

/// The only writer of URL query state.
///
/// Every call merges its whole batch into the current parameters and commits
/// one navigation. Clones share one commit lock, held from reading the current
/// parameters until the navigation lands, so concurrent writers never drop
/// each other's changes.
#[derive(Clone)]
pub struct QuerySync {
    navigator: Arc<dyn Navigator>,
    commit_lock: Arc<Mutex<()>>,
}

impl QuerySync {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> QueryParams {
        self.navigator.current()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.navigator.current().get(name).map(str::to_string)
    }

    /// Left fold of `batch` over `current`
    pub fn merge(current: &QueryParams, batch: &QueryBatch) -> QueryParams {
        let mut next = current.clone();
        for update in batch.iter() {
            next.apply(update);
        }
        next.normalize();
        next
    }

    pub fn apply(&self, updates: impl Into<QueryBatch>, replace: bool) {
        let batch = updates.into();
        if batch.is_empty() {
            return;
        }
        let _guard = self.lock();
        let next = Self::merge(&self.navigator.current(), &batch);
        self.commit(&next, replace);
    }

    /// Like [`QuerySync::apply`] but skips the navigation when nothing changes
    pub fn apply_if_changed(&self, updates: impl Into<QueryBatch>, replace: bool) -> bool {
        let batch = updates.into();
        let _guard = self.lock();
        let current = self.navigator.current();
        let next = Self::merge(&current, &batch);
        if batch.is_empty() || next == current {
            return false;
        }
        self.commit(&next, replace);
        true
    }

    fn commit(&self, next: &QueryParams, replace: bool) {
        let mode = if replace {
            NavigateMode::Replace
        } else {
            NavigateMode::Push
        };
        debug!("Committing query ?{} ({:?})", next, mode);
        self.navigator.navigate(
            next,
            NavigateOptions {
                mode,
                scroll: false,
            },
        );
    }
}
