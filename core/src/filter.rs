//! Filter bar: heterogeneous filter controls bound to URL query parameters.
//!
//! Search filters keep a local shadow of the typed text and commit it after a
//! quiet period; every other filter reads straight from the URL and commits on
//! change.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{QueryBatch, QueryUpdate};
use crate::query::QuerySync;
use crate::timers::{TimerError, TimerTable};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectChoice {
    pub value: String,
    pub label: String,
}

impl SelectChoice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterDescriptor {
    Search {
        name: String,
        #[serde(default)]
        placeholder: Option<String>,
        /// Overrides [`DEFAULT_SEARCH_DEBOUNCE`]
        #[serde(default)]
        debounce_ms: Option<u64>,
    },
    Select {
        name: String,
        #[serde(default)]
        placeholder: Option<String>,
        options: Vec<SelectChoice>,
    },
    Number {
        name: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        step: Option<f64>,
        #[serde(default)]
        clearable: bool,
    },
    Date {
        name: String,
        #[serde(default)]
        clearable: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Search,
    Select,
    Number,
    Date,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Search => "search",
            Self::Select => "select",
            Self::Number => "number",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

impl FilterDescriptor {
    pub fn search(name: impl Into<String>) -> Self {
        Self::Search {
            name: name.into(),
            placeholder: None,
            debounce_ms: None,
        }
    }

    pub fn select(name: impl Into<String>, options: Vec<SelectChoice>) -> Self {
        Self::Select {
            name: name.into(),
            placeholder: None,
            options,
        }
    }

    pub fn number(name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::Number {
            name: name.into(),
            min,
            max,
            step: None,
            clearable: true,
        }
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::Date {
            name: name.into(),
            clearable: true,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Search { name, .. }
            | Self::Select { name, .. }
            | Self::Number { name, .. }
            | Self::Date { name, .. } => name,
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Search { .. } => FilterKind::Search,
            Self::Select { .. } => FilterKind::Select,
            Self::Number { .. } => FilterKind::Number,
            Self::Date { .. } => FilterKind::Date,
        }
    }

    pub fn debounce(&self) -> Duration {
        match self {
            Self::Search {
                debounce_ms: Some(ms),
                ..
            } => Duration::from_millis(*ms),
            _ => DEFAULT_SEARCH_DEBOUNCE,
        }
    }

    pub fn is_clearable(&self) -> bool {
        match self {
            Self::Number { clearable, .. } | Self::Date { clearable, .. } => *clearable,
            Self::Search { .. } | Self::Select { .. } => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("filter name {0:?} is used more than once")]
    DuplicateName(String),
    #[error("no filter named {0:?}")]
    UnknownFilter(String),
    #[error("filter {name:?} is not a {expected} filter")]
    WrongKind { name: String, expected: FilterKind },
    #[error("{value:?} is not an option of filter {name:?}")]
    UnknownChoice { name: String, value: String },
    #[error("{value} is outside the allowed range of filter {name:?}")]
    OutOfRange { name: String, value: f64 },
    #[error("{value} is not a multiple of step {step} for filter {name:?}")]
    OffStep { name: String, value: f64, step: f64 },
    #[error("filter {0:?} cannot be cleared")]
    NotClearable(String),
    #[error("filter bar has been disposed")]
    Disposed,
    #[error(transparent)]
    Timer(#[from] TimerError),
}

pub struct FilterBar {
    descriptors: Vec<FilterDescriptor>,
    sync: Arc<QuerySync>,
    /// Parameters dropped alongside every filter commit, such as `page`
    reset_params: Vec<String>,
    /// Search text per filter name, possibly ahead of the URL
    shadow: Mutex<HashMap<String, String>>,
    timers: TimerTable,
}

impl FilterBar {
    pub fn new(descriptors: Vec<FilterDescriptor>, sync: Arc<QuerySync>) -> Result<Self, FilterError> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name()) {
                return Err(FilterError::DuplicateName(descriptor.name().to_string()));
            }
        }

        let current = sync.params();
        let values = descriptors
            .iter()
            .filter(|d| d.kind() == FilterKind::Search)
            .map(|d| {
                let value = current.get(d.name()).unwrap_or_default().to_string();
                (d.name().to_string(), value)
            })
            .collect();

        Ok(Self {
            descriptors,
            sync,
            reset_params: Vec::new(),
            shadow: Mutex::new(values),
            timers: TimerTable::new(),
        })
    }

    pub fn with_reset_params(mut self, params: Vec<String>) -> Self {
        self.reset_params = params;
        self
    }

    pub fn descriptors(&self) -> &[FilterDescriptor] {
        &self.descriptors
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.shadow.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn descriptor(&self, name: &str) -> Result<&FilterDescriptor, FilterError> {
        self.descriptors
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| FilterError::UnknownFilter(name.to_string()))
    }

    fn expect_kind(&self, name: &str, expected: FilterKind) -> Result<&FilterDescriptor, FilterError> {
        if self.timers.is_disposed() {
            return Err(FilterError::Disposed);
        }
        let descriptor = self.descriptor(name)?;
        if descriptor.kind() != expected {
            return Err(FilterError::WrongKind {
                name: name.to_string(),
                expected,
            });
        }
        Ok(descriptor)
    }

    fn batch_for(&self, update: QueryUpdate) -> QueryBatch {
        let mut batch = QueryBatch::new();
        batch.push(update);
        for param in &self.reset_params {
            batch.push(QueryUpdate::remove(param.clone()));
        }
        batch
    }

    /// The value the control for `name` should show right now
    pub fn display_value(&self, name: &str) -> Result<String, FilterError> {
        let descriptor = self.descriptor(name)?;
        if descriptor.kind() == FilterKind::Search {
            if let Some(value) = self.lock().get(name) {
                return Ok(value.clone());
            }
        }
        Ok(self.sync.get(name).unwrap_or_default())
    }

    /// Record a keystroke and (re)start the commit timer for this filter
    pub fn input_search(&self, name: &str, text: &str) -> Result<(), FilterError> {
        let descriptor = self.expect_kind(name, FilterKind::Search)?;
        let delay = descriptor.debounce();

        self.lock().insert(name.to_string(), text.to_string());

        let sync = self.sync.clone();
        let batch = self.batch_for(QueryUpdate::set(name, text));
        let filter = name.to_string();
        self.timers.arm(name, delay, async move {
            debug!("Committing search filter {}", filter);
            sync.apply(batch, false);
        })?;
        Ok(())
    }

    pub fn select(&self, name: &str, value: Option<&str>) -> Result<(), FilterError> {
        let descriptor = self.expect_kind(name, FilterKind::Select)?;
        let value = value.filter(|v| !v.is_empty());

        if let (Some(value), FilterDescriptor::Select { options, .. }) = (value, descriptor) {
            if !options.iter().any(|o| o.value == value) {
                return Err(FilterError::UnknownChoice {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }

        self.sync.apply(
            self.batch_for(QueryUpdate::new(name, value.map(str::to_string))),
            false,
        );
        Ok(())
    }

    pub fn set_number(&self, name: &str, value: f64) -> Result<(), FilterError> {
        let descriptor = self.expect_kind(name, FilterKind::Number)?;

        if let FilterDescriptor::Number { min, max, step, .. } = descriptor {
            let below = min.is_some_and(|min| value < min);
            let above = max.is_some_and(|max| value > max);
            if !value.is_finite() || below || above {
                return Err(FilterError::OutOfRange {
                    name: name.to_string(),
                    value,
                });
            }
            if let Some(step) = step.filter(|s| s.is_finite() && *s > 0.0) {
                if !on_step(value, min.unwrap_or(0.0), step) {
                    return Err(FilterError::OffStep {
                        name: name.to_string(),
                        value,
                        step,
                    });
                }
            }
        }

        self.sync
            .apply(self.batch_for(QueryUpdate::set(name, format_number(value))), false);
        Ok(())
    }

    pub fn set_date(&self, name: &str, date: NaiveDate) -> Result<(), FilterError> {
        self.expect_kind(name, FilterKind::Date)?;
        self.sync.apply(
            self.batch_for(QueryUpdate::set(name, date.format(DATE_FORMAT).to_string())),
            false,
        );
        Ok(())
    }

    /// Parsed value of a date filter, if the URL holds a valid date
    pub fn date_value(&self, name: &str) -> Result<Option<NaiveDate>, FilterError> {
        self.descriptor(name)?;
        Ok(self
            .sync
            .get(name)
            .and_then(|raw| NaiveDate::parse_from_str(&raw, DATE_FORMAT).ok()))
    }

    /// Emit an empty value for `name`
    pub fn clear(&self, name: &str) -> Result<(), FilterError> {
        if self.timers.is_disposed() {
            return Err(FilterError::Disposed);
        }
        let descriptor = self.descriptor(name)?;
        if !descriptor.is_clearable() {
            return Err(FilterError::NotClearable(name.to_string()));
        }

        if descriptor.kind() == FilterKind::Search {
            self.timers.cancel(name);
            self.lock().insert(name.to_string(), String::new());
        }

        self.sync
            .apply(self.batch_for(QueryUpdate::remove(name)), false);
        Ok(())
    }

    /// Resynchronize search shadows after the URL changed outside the bar.
    ///
    /// Each search shadow that disagrees with the URL takes the URL value,
    /// except while that filter still has a pending commit.
    pub fn on_url_change(&self) {
        if self.timers.is_disposed() {
            return;
        }
        let incoming = self.sync.params();
        let mut shadow = self.lock();

        for descriptor in self.descriptors.iter().filter(|d| d.kind() == FilterKind::Search) {
            let name = descriptor.name();
            let url_value = incoming.get(name).unwrap_or_default();
            if shadow.get(name).map(String::as_str) == Some(url_value) {
                continue;
            }
            if self.timers.is_pending(name) {
                continue;
            }
            debug!("Search filter {} resynced from URL", name);
            shadow.insert(name.to_string(), url_value.to_string());
        }
    }

    /// Commit defaults for filters missing from the URL, without a new history entry
    pub fn initialize_defaults(&self, defaults: &[(&str, &str)]) -> Result<usize, FilterError> {
        if self.timers.is_disposed() {
            return Err(FilterError::Disposed);
        }
        let current = self.sync.params();
        let mut batch = QueryBatch::new();

        for (name, value) in defaults {
            let descriptor = self.descriptor(name)?;
            if current.contains(name) || value.is_empty() {
                continue;
            }
            if descriptor.kind() == FilterKind::Search {
                self.lock().insert(name.to_string(), value.to_string());
            }
            batch.push(QueryUpdate::set(*name, *value));
        }

        let applied = batch.len();
        self.sync.apply(batch, true);
        Ok(applied)
    }

    /// Remove every filter parameter in a single navigation
    pub fn reset(&self) -> Result<(), FilterError> {
        if self.timers.is_disposed() {
            return Err(FilterError::Disposed);
        }
        self.timers.cancel_all();
        {
            let mut shadow = self.lock();
            for value in shadow.values_mut() {
                value.clear();
            }
        }

        let batch: QueryBatch = self
            .descriptors
            .iter()
            .map(|d| d.name().to_string())
            .chain(self.reset_params.iter().cloned())
            .map(QueryUpdate::remove)
            .collect();
        self.sync.apply(batch, false);
        Ok(())
    }

    pub fn pending_commits(&self) -> usize {
        self.timers.pending_count()
    }

    /// Cancel pending commits; later events are rejected
    pub fn dispose(&self) {
        self.timers.dispose();
    }
}

/// Whether `value` sits on the grid `base + k * step`, within rounding noise
fn on_step(value: f64, base: f64, step: f64) -> bool {
    let steps = (value - base) / step;
    (steps - steps.round()).abs() <= 1e-9 * steps.abs().max(1.0)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::query::{MemoryNavigator, Navigator, QueryParams};

    fn descriptors() -> Vec<FilterDescriptor> {
        vec![
            FilterDescriptor::search("q"),
            FilterDescriptor::select(
                "status",
                vec![
                    SelectChoice::new("active", "Active"),
                    SelectChoice::new("retired", "Retired"),
                ],
            ),
            FilterDescriptor::number("seats", Some(1.0), Some(80.0)),
            FilterDescriptor::Date {
                name: "from".to_string(),
                clearable: false,
            },
        ]
    }

    fn bar_with(query: &str) -> (Arc<MemoryNavigator>, FilterBar) {
        let navigator = Arc::new(MemoryNavigator::with_query(query));
        let sync = Arc::new(QuerySync::new(navigator.clone()));
        let bar = FilterBar::new(descriptors(), sync).unwrap();
        (navigator, bar)
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let navigator = Arc::new(MemoryNavigator::new());
        let sync = Arc::new(QuerySync::new(navigator));
        let result = FilterBar::new(
            vec![FilterDescriptor::search("q"), FilterDescriptor::date("q")],
            sync,
        );
        assert_eq!(result.err(), Some(FilterError::DuplicateName("q".to_string())));
    }

    #[test]
    fn test_descriptor_json_shape() {
        let descriptor: FilterDescriptor = serde_json::from_str(
            r#"{ "type": "number", "name": "seats", "min": 1, "clearable": true }"#,
        )
        .unwrap();
        assert_eq!(descriptor.kind(), FilterKind::Number);
        assert!(descriptor.is_clearable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_commits_once() {
        let (navigator, bar) = bar_with("");

        bar.input_search("q", "a").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        bar.input_search("q", "ab").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        bar.input_search("q", "abc").unwrap();

        assert_eq!(bar.display_value("q").unwrap(), "abc");
        assert_eq!(navigator.navigation_count(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(navigator.navigation_count(), 1);
        assert_eq!(navigator.query_string(), "q=abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_debounce() {
        let navigator = Arc::new(MemoryNavigator::new());
        let sync = Arc::new(QuerySync::new(navigator.clone()));
        let bar = FilterBar::new(
            vec![FilterDescriptor::Search {
                name: "plate".to_string(),
                placeholder: None,
                debounce_ms: Some(50),
            }],
            sync,
        )
        .unwrap();

        bar.input_search("plate", "1A").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(navigator.query_string(), "plate=1A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_commit_drops_reset_params() {
        let navigator = Arc::new(MemoryNavigator::with_query("page=4"));
        let sync = Arc::new(QuerySync::new(navigator.clone()));
        let bar = FilterBar::new(descriptors(), sync)
            .unwrap()
            .with_reset_params(vec!["page".to_string()]);

        bar.input_search("q", "bus").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(navigator.query_string(), "q=bus");
        assert_eq!(navigator.navigation_count(), 1);
    }

    #[test]
    fn test_select_commits_immediately() {
        let (navigator, bar) = bar_with("q=x");

        bar.select("status", Some("retired")).unwrap();

        assert_eq!(navigator.navigation_count(), 1);
        assert_eq!(bar.display_value("status").unwrap(), "retired");
        assert!(matches!(
            bar.select("status", Some("scrapped")),
            Err(FilterError::UnknownChoice { .. })
        ));

        bar.select("status", None).unwrap();
        assert_eq!(navigator.query_string(), "q=x");
    }

    #[test]
    fn test_number_range_and_clear() {
        let (navigator, bar) = bar_with("");

        bar.set_number("seats", 40.0).unwrap();
        assert_eq!(navigator.query_string(), "seats=40");

        assert!(matches!(
            bar.set_number("seats", 81.0),
            Err(FilterError::OutOfRange { .. })
        ));
        assert!(bar.set_number("seats", f64::NAN).is_err());

        bar.clear("seats").unwrap();
        assert_eq!(navigator.query_string(), "");
        assert_eq!(navigator.navigation_count(), 2);
    }

    #[test]
    fn test_number_step_grid() {
        let navigator = Arc::new(MemoryNavigator::new());
        let sync = Arc::new(QuerySync::new(navigator.clone()));
        let bar = FilterBar::new(
            vec![
                FilterDescriptor::Number {
                    name: "weight".to_string(),
                    min: Some(0.0),
                    max: None,
                    step: Some(0.5),
                    clearable: true,
                },
                FilterDescriptor::Number {
                    name: "length".to_string(),
                    min: Some(0.3),
                    max: None,
                    step: Some(0.1),
                    clearable: true,
                },
            ],
            sync,
        )
        .unwrap();

        bar.set_number("weight", 2.5).unwrap();
        assert_eq!(navigator.query_string(), "weight=2.5");
        assert!(matches!(
            bar.set_number("weight", 2.3),
            Err(FilterError::OffStep { step, .. }) if step == 0.5
        ));

        bar.set_number("length", 0.7).unwrap();
        assert!(bar.set_number("length", 0.75).is_err());
        assert_eq!(navigator.navigation_count(), 2);
    }

    #[test]
    fn test_date_filter() {
        let (navigator, bar) = bar_with("");
        let date = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();

        bar.set_date("from", date).unwrap();

        assert_eq!(navigator.query_string(), "from=2024-03-16");
        assert_eq!(bar.date_value("from").unwrap(), Some(date));
        assert_eq!(
            bar.clear("from"),
            Err(FilterError::NotClearable("from".to_string()))
        );
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let (_, bar) = bar_with("");
        assert!(matches!(
            bar.set_number("q", 1.0),
            Err(FilterError::WrongKind { .. })
        ));
        assert!(matches!(
            bar.display_value("nope"),
            Err(FilterError::UnknownFilter(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_navigation_resyncs_shadow() {
        let (navigator, bar) = bar_with("q=first");
        assert_eq!(bar.display_value("q").unwrap(), "first");

        bar.input_search("q", "second").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        bar.on_url_change();
        assert_eq!(bar.display_value("q").unwrap(), "second");

        assert!(navigator.back());
        bar.on_url_change();

        assert_eq!(bar.display_value("q").unwrap(), "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_initial_url_resyncs_shadow() {
        let (navigator, bar) = bar_with("");

        bar.input_search("q", "abc").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(navigator.query_string(), "q=abc");

        assert!(navigator.back());
        bar.on_url_change();

        assert_eq!(navigator.query_string(), "");
        assert_eq!(bar.display_value("q").unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_change_does_not_clobber_typing() {
        let (navigator, bar) = bar_with("q=first");

        bar.input_search("q", "typed").unwrap();
        navigator.navigate(
            &QueryParams::parse("q=other"),
            crate::query::NavigateOptions {
                mode: crate::query::NavigateMode::Push,
                scroll: false,
            },
        );
        bar.on_url_change();

        assert_eq!(bar.display_value("q").unwrap(), "typed");
    }

    #[test]
    fn test_initialize_defaults_replaces_history_entry() {
        let (navigator, bar) = bar_with("status=active");

        let applied = bar
            .initialize_defaults(&[("status", "retired"), ("q", "coach")])
            .unwrap();

        assert_eq!(applied, 1);
        assert_eq!(navigator.history_len(), 1);
        assert_eq!(navigator.query_string(), "status=active&q=coach");
        assert_eq!(bar.display_value("q").unwrap(), "coach");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_everything_at_once() {
        let (navigator, bar) = bar_with("q=a&status=active&seats=3&other=keep");

        bar.input_search("q", "ab").unwrap();
        bar.reset().unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(navigator.navigation_count(), 1);
        assert_eq!(navigator.query_string(), "other=keep");
        assert_eq!(bar.display_value("q").unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_prevents_late_navigation() {
        let (navigator, bar) = bar_with("");

        bar.input_search("q", "late").unwrap();
        bar.dispose();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(navigator.navigation_count(), 0);
        assert_eq!(bar.input_search("q", "x"), Err(FilterError::Disposed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_commit() {
        let (navigator, bar) = bar_with("");

        bar.input_search("q", "gone").unwrap();
        drop(bar);
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(navigator.navigation_count(), 0);
    }
}
