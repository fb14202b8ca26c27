//! Form-bound selection over a remote, cursor-paginated, searchable option list.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{FetchPage, FetchParams, OptionSet, OptionValue, QueryKey, SelectOption};
use crate::source::OptionSource;
use crate::timers::{TimerError, TimerTable};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const SCROLL_THRESHOLD_PX: f64 = 24.0;
pub const INITIAL_CURSOR: u64 = 0;

const SEARCH_TIMER: &str = "search";

/// The form control a selection field writes into.
pub trait FormField: Send + Sync {
    fn value(&self) -> Option<OptionValue>;
    fn set_value(&self, value: Option<OptionValue>);
}

#[derive(Debug, Default)]
pub struct MemoryField {
    value: Mutex<Option<OptionValue>>,
    writes: AtomicUsize,
}

impl MemoryField {
    pub fn new(initial: Option<OptionValue>) -> Self {
        Self {
            value: Mutex::new(initial),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl FormField for MemoryField {
    fn value(&self) -> Option<OptionValue> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_value(&self, value: Option<OptionValue>) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub query_name: String,
    pub page_size: u32,
    pub search_debounce: Duration,
    pub scroll_threshold: f64,
    /// Static parameters sent with every page request
    pub extra_params: BTreeMap<String, String>,
}

impl SelectionConfig {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            scroll_threshold: SCROLL_THRESHOLD_PX,
            extra_params: BTreeMap::new(),
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(name.into(), value.into());
        self
    }
}

/// Scroll position of the option list, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn remaining(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// First-page and next-page loads are reported separately so the input
/// spinner and the list's trailing spinner can be driven independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub first_page: bool,
    pub next_page: bool,
}

struct PageSession<T> {
    key: QueryKey,
    generation: u64,
    pages: Vec<FetchPage<T>>,
    in_flight: Option<u64>,
    halted: bool,
}

impl<T> PageSession<T> {
    fn new(key: QueryKey, generation: u64) -> Self {
        Self {
            key,
            generation,
            pages: Vec::new(),
            in_flight: None,
            halted: false,
        }
    }

    fn next_cursor(&self) -> Option<u64> {
        match self.pages.last() {
            None => Some(INITIAL_CURSOR),
            Some(page) => page.next_cursor,
        }
    }

    fn has_more(&self) -> bool {
        !self.halted && self.next_cursor().is_some()
    }
}

struct FieldState<T> {
    open: bool,
    input: String,
    debounced_search: String,
    dependencies: Vec<Value>,
    persisted: Option<SelectOption<T>>,
    session: PageSession<T>,
    generations: u64,
    disposed: bool,
}

impl<T> FieldState<T> {
    fn current_key(&self, config: &SelectionConfig) -> QueryKey {
        QueryKey::new(&config.query_name, &self.debounced_search, &self.dependencies)
    }

    fn restart(&mut self, key: QueryKey) {
        self.generations += 1;
        self.session = PageSession::new(key, self.generations);
    }

    /// Restart pagination if the key moved; returns whether it did
    fn sync_key(&mut self, config: &SelectionConfig) -> bool {
        let key = self.current_key(config);
        if key == self.session.key {
            return false;
        }
        debug!(
            "Query key changed for {}, discarding {} pages",
            config.query_name,
            self.session.pages.len()
        );
        self.restart(key);
        true
    }
}

struct Inner<T> {
    source: Arc<dyn OptionSource<T>>,
    config: SelectionConfig,
    field: Arc<dyn FormField>,
    state: Mutex<FieldState<T>>,
    timers: TimerTable,
}

/// Handle to a selection field; clones share the same state.
pub struct SelectionField<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SelectionField<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SelectionField<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        source: Arc<dyn OptionSource<T>>,
        config: SelectionConfig,
        field: Arc<dyn FormField>,
    ) -> Self {
        let key = QueryKey::new(&config.query_name, "", &[]);
        let state = FieldState {
            open: false,
            input: String::new(),
            debounced_search: String::new(),
            dependencies: Vec::new(),
            persisted: None,
            session: PageSession::new(key, 0),
            generations: 0,
            disposed: false,
        };

        Self {
            inner: Arc::new(Inner {
                source,
                config,
                field,
                state: Mutex::new(state),
                timers: TimerTable::new(),
            }),
        }
    }

    pub fn with_initial_option(self, option: Option<SelectOption<T>>) -> Self {
        self.set_initial_option(option);
        self
    }

    pub fn with_dependencies(self, dependencies: Vec<Value>) -> Self {
        {
            let mut state = self.lock();
            state.dependencies = dependencies;
            state.sync_key(&self.inner.config);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, FieldState<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the selected option, e.g. when editing an existing record
    pub fn set_initial_option(&self, option: Option<SelectOption<T>>) {
        self.lock().persisted = option;
    }

    /// Show the list and refresh it from the first page
    pub async fn open(&self) -> bool {
        {
            let mut state = self.lock();
            if state.disposed {
                return false;
            }
            state.open = true;
            let key = state.current_key(&self.inner.config);
            state.restart(key);
        }
        self.fetch_next_page().await
    }

    pub fn close(&self) {
        self.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Record typed search text; the query key follows after the debounce delay
    pub fn set_input(&self, text: &str) -> Result<(), TimerError> {
        {
            let mut state = self.lock();
            if state.disposed {
                return Err(TimerError::Disposed);
            }
            state.input = text.to_string();
        }

        let weak = Arc::downgrade(&self.inner);
        let text = text.to_string();
        self.inner
            .timers
            .arm(SEARCH_TIMER, self.inner.config.search_debounce, async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let field = SelectionField { inner };
                if field.settle_search(text) {
                    tokio::spawn(async move {
                        field.fetch_next_page().await;
                    });
                }
            })
    }

    /// Returns whether a first-page fetch should follow
    fn settle_search(&self, text: String) -> bool {
        let mut state = self.lock();
        if state.disposed {
            return false;
        }
        state.debounced_search = text;
        state.sync_key(&self.inner.config) && state.open
    }

    /// Apply search text immediately, as pressing Enter would
    pub async fn submit_search(&self, text: &str) -> bool {
        self.inner.timers.cancel(SEARCH_TIMER);
        let fetch = {
            let mut state = self.lock();
            if state.disposed {
                return false;
            }
            state.input = text.to_string();
            state.debounced_search = text.to_string();
            state.sync_key(&self.inner.config) && state.open
        };
        if fetch {
            self.fetch_next_page().await
        } else {
            false
        }
    }

    /// Replace the dependency values that are part of the query key
    pub async fn set_dependencies(&self, dependencies: Vec<Value>) -> bool {
        let fetch = {
            let mut state = self.lock();
            state.dependencies = dependencies;
            state.sync_key(&self.inner.config) && state.open && !state.disposed
        };
        if fetch {
            self.fetch_next_page().await
        } else {
            false
        }
    }

    /// Request the page after the last known cursor.
    ///
    /// Does nothing while closed, while another page is in flight, or once the
    /// stream is exhausted or has failed. Returns whether a page was merged.
    pub async fn fetch_next_page(&self) -> bool {
        let (key, generation, params) = {
            let mut state = self.lock();
            if state.disposed || !state.open {
                return false;
            }
            let session = &mut state.session;
            if session.in_flight.is_some() || !session.has_more() {
                return false;
            }
            let Some(cursor) = session.next_cursor() else {
                return false;
            };
            session.in_flight = Some(cursor);

            let params = FetchParams {
                search: session.key.search.clone(),
                cursor,
                limit: self.inner.config.page_size,
                extra: self.inner.config.extra_params.clone(),
            };
            (session.key.clone(), session.generation, params)
        };

        debug!(
            "Fetching {} options at cursor {} (search {:?})",
            self.inner.config.query_name, params.cursor, params.search
        );
        let result = self.inner.source.fetch_options(params).await;

        let mut state = self.lock();
        let session = &mut state.session;
        if session.key != key || session.generation != generation {
            debug!("Discarding page for superseded query {:?}", key.search);
            return false;
        }
        session.in_flight = None;

        match result {
            Ok(page) => {
                session.pages.push(page);
                true
            }
            Err(e) => {
                warn!("Failed to fetch {} options: {}", self.inner.config.query_name, e);
                session.halted = true;
                false
            }
        }
    }

    /// Load the next page once the list is scrolled close to its end
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> bool {
        if metrics.remaining() >= self.inner.config.scroll_threshold {
            return false;
        }
        self.fetch_next_page().await
    }

    /// Select an option; only its value reaches the form field
    pub fn select(&self, option: Option<SelectOption<T>>) {
        let value = option.as_ref().map(|o| o.value.clone());
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.persisted = option;
        }
        self.inner.field.set_value(value);
    }

    /// Fetched options in page order, deduplicated by value, with the selected
    /// option always present and carrying its own label.
    pub fn options(&self) -> Vec<SelectOption<T>> {
        let state = self.lock();
        let mut set = OptionSet::new();
        for page in &state.session.pages {
            set.extend(page.items.iter().cloned());
        }
        if let Some(persisted) = &state.persisted {
            set.insert(persisted.clone());
        }
        set.into_vec()
    }

    pub fn selected(&self) -> Option<SelectOption<T>> {
        self.lock().persisted.clone()
    }

    pub fn value(&self) -> Option<OptionValue> {
        self.inner.field.value()
    }

    pub fn loading(&self) -> LoadingState {
        let state = self.lock();
        let fetching = state.session.in_flight.is_some();
        let has_pages = !state.session.pages.is_empty();
        LoadingState {
            first_page: fetching && !has_pages,
            next_page: fetching && has_pages,
        }
    }

    pub fn has_more(&self) -> bool {
        self.lock().session.has_more()
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn debounced_search(&self) -> String {
        self.lock().debounced_search.clone()
    }

    pub fn query_key(&self) -> QueryKey {
        self.lock().session.key.clone()
    }

    pub fn page_count(&self) -> usize {
        self.lock().session.pages.len()
    }

    /// Total reported by the most recent page, if the source reports one
    pub fn total_count(&self) -> Option<u64> {
        self.lock()
            .session
            .pages
            .iter()
            .rev()
            .find_map(|p| p.total_count)
    }

    /// Cancel the search timer; later events are ignored
    pub fn dispose(&self) {
        self.inner.timers.dispose();
        let mut state = self.lock();
        state.disposed = true;
        state.open = false;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::source::SourceError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Pages per search text; cursor `n` returns page `n`
    #[derive(Default)]
    struct StubSource {
        pages: HashMap<String, Vec<FetchPage<Value>>>,
        delays: HashMap<String, Duration>,
        fail_at: Option<u64>,
        calls: Mutex<Vec<FetchParams>>,
    }

    impl StubSource {
        fn with_pages(mut self, search: &str, pages: Vec<FetchPage<Value>>) -> Self {
            self.pages.insert(search.to_string(), pages);
            self
        }

        fn with_delay(mut self, search: &str, delay: Duration) -> Self {
            self.delays.insert(search.to_string(), delay);
            self
        }

        fn calls(&self) -> Vec<FetchParams> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OptionSource<Value> for StubSource {
        async fn fetch_options(&self, params: FetchParams) -> Result<FetchPage<Value>, SourceError> {
            self.calls.lock().unwrap().push(params.clone());
            if let Some(delay) = self.delays.get(&params.search) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail_at == Some(params.cursor) {
                return Err(SourceError::Other("boom".to_string()));
            }
            self.pages
                .get(&params.search)
                .and_then(|pages| pages.get(params.cursor as usize))
                .cloned()
                .ok_or_else(|| SourceError::Other("no such page".to_string()))
        }
    }

    fn page(prefix: &str, range: std::ops::Range<usize>, next: Option<u64>) -> FetchPage<Value> {
        FetchPage::new(
            range
                .map(|i| SelectOption::new(format!("{}-{}", prefix, i), format!("{} {}", prefix, i)))
                .collect(),
            next,
        )
    }

    fn at_bottom() -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: 780.0,
            scroll_height: 1000.0,
            client_height: 200.0,
        }
    }

    fn field_over(source: Arc<StubSource>) -> (Arc<MemoryField>, SelectionField<Value>) {
        let form = Arc::new(MemoryField::default());
        let field: SelectionField<Value> =
            SelectionField::new(source, SelectionConfig::new("vehicles"), form.clone());
        (form, field)
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_until_opened() {
        let source = Arc::new(StubSource::default().with_pages("", vec![page("v", 0..5, None)]));
        let (_, field) = field_over(source.clone());

        field.set_input("x").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!field.fetch_next_page().await);
        assert!(source.calls().is_empty());

        field.set_input("").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(field.open().await);
        assert_eq!(field.options().len(), 5);
        assert_eq!(source.calls()[0].cursor, INITIAL_CURSOR);
    }

    #[tokio::test]
    async fn test_two_pages_then_stop() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..20, Some(1)), page("v", 20..40, None)]),
        );
        let (_, field) = field_over(source.clone());

        field.open().await;
        assert!(field.on_scroll(at_bottom()).await);
        assert!(!field.on_scroll(at_bottom()).await);
        assert!(!field.on_scroll(at_bottom()).await);

        assert_eq!(field.options().len(), 40);
        assert_eq!(source.calls().len(), 2);
        assert_eq!(source.calls()[1].cursor, 1);
        assert!(!field.has_more());
    }

    #[tokio::test]
    async fn test_scroll_above_threshold_does_nothing() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..20, Some(1)), page("v", 20..40, None)]),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        let far = ScrollMetrics {
            scroll_top: 100.0,
            scroll_height: 1000.0,
            client_height: 200.0,
        };
        assert!(!field.on_scroll(far).await);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_scrolls_issue_one_request() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..20, Some(1)), page("v", 20..40, None)])
                .with_delay("", Duration::from_millis(50)),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        let (a, b) = tokio::join!(field.on_scroll(at_bottom()), field.on_scroll(at_bottom()));

        assert!(a ^ b);
        assert_eq!(source.calls().len(), 2);
        assert_eq!(field.options().len(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_change_discards_previous_pages() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..3, None)])
                .with_pages("a", vec![page("a", 0..4, None)])
                .with_pages("ab", vec![page("ab", 0..2, None)]),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        field.set_input("a").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(field.options().len(), 4);

        field.set_input("ab").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let values: Vec<String> = field.options().iter().map(|o| o.value.to_string()).collect();
        assert_eq!(values, vec!["ab-0", "ab-1"]);
        assert_eq!(field.query_key().search, "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_debounces_to_one_fetch() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..3, None)])
                .with_pages("abc", vec![page("abc", 0..1, None)]),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        for text in ["a", "ab", "abc"] {
            field.set_input(text).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(field.input(), "abc");
        assert_eq!(field.debounced_search(), "");

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(field.debounced_search(), "abc");
        let searches: Vec<String> = source.calls().into_iter().map(|c| c.search).collect();
        assert_eq!(searches, vec!["", "abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_search_skips_debounce() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..3, None)])
                .with_pages("ab", vec![page("ab", 0..2, None)]),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        field.set_input("a").unwrap();
        assert!(field.submit_search("ab").await);
        tokio::time::sleep(Duration::from_millis(400)).await;

        let searches: Vec<String> = source.calls().into_iter().map(|c| c.search).collect();
        assert_eq!(searches, vec!["", "ab"]);
        assert_eq!(field.options().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_ignored() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..3, None)])
                .with_pages("a", vec![page("a", 0..4, None)])
                .with_pages("ab", vec![page("ab", 0..2, None)])
                .with_delay("a", Duration::from_secs(2)),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        field.set_input("a").unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(field.loading().first_page);

        field.set_input("ab").unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let values: Vec<String> = field.options().iter().map(|o| o.value.to_string()).collect();
        assert_eq!(values, vec!["ab-0", "ab-1"]);
        assert_eq!(field.loading(), LoadingState::default());
    }

    #[tokio::test]
    async fn test_persisted_option_survives_and_is_not_duplicated() {
        let mut first = page("v", 0..2, None);
        first
            .items
            .push(SelectOption::new("v-99", "Fetched label for 99"));
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![first])
                .with_pages("zzz", vec![page("zzz", 0..1, None)]),
        );
        let (_, field) = field_over(source.clone());
        let field = field.with_initial_option(Some(SelectOption::new("v-99", "Pinned 99")));

        assert_eq!(field.options().len(), 1);
        assert_eq!(field.options()[0].label, "Pinned 99");

        field.open().await;
        let options = field.options();
        let pinned: Vec<_> = options.iter().filter(|o| o.value.as_str() == "v-99").collect();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].label, "Pinned 99");
        assert_eq!(options.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_option_outside_search_window() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..3, None)])
                .with_pages("zzz", vec![page("zzz", 0..1, None)]),
        );
        let (form, field) = field_over(source);
        field.open().await;
        field.select(Some(field.options()[1].clone()));

        field.set_input("zzz").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let labels: Vec<String> = field.options().into_iter().map(|o| o.label).collect();
        assert_eq!(labels, vec!["zzz 0", "v 1"]);
        assert_eq!(form.value(), Some(OptionValue::from("v-1")));
    }

    #[tokio::test]
    async fn test_select_writes_only_value() {
        let source = Arc::new(StubSource::default().with_pages("", vec![page("v", 0..2, None)]));
        let (form, field) = field_over(source);

        field.select(Some(SelectOption::new("v-1", "v 1").with_meta(serde_json::json!({ "seats": 9 }))));
        assert_eq!(form.value(), Some(OptionValue::from("v-1")));
        assert_eq!(field.selected().unwrap().meta, Some(serde_json::json!({ "seats": 9 })));

        field.select(None);
        assert_eq!(form.value(), None);
        assert_eq!(form.writes(), 2);
        assert!(field.selected().is_none());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_previous_and_stops() {
        let mut stub = StubSource::default().with_pages(
            "",
            vec![page("v", 0..20, Some(1)), page("v", 20..40, Some(2)), page("v", 40..41, None)],
        );
        stub.fail_at = Some(1);
        let source = Arc::new(stub);
        let (_, field) = field_over(source.clone());
        field.select(Some(SelectOption::new("x", "Kept")));

        field.open().await;
        assert!(!field.on_scroll(at_bottom()).await);
        assert!(!field.on_scroll(at_bottom()).await);

        assert_eq!(field.options().len(), 21);
        assert_eq!(source.calls().len(), 2);
        assert_eq!(field.selected().unwrap().label, "Kept");
    }

    #[tokio::test]
    async fn test_reopen_refreshes_first_page() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..20, Some(1)), page("v", 20..40, None)]),
        );
        let (_, field) = field_over(source.clone());

        field.open().await;
        field.on_scroll(at_bottom()).await;
        field.close();
        assert_eq!(field.page_count(), 2);

        field.open().await;

        assert_eq!(field.page_count(), 1);
        assert_eq!(source.calls().len(), 3);
        assert_eq!(source.calls()[2].cursor, INITIAL_CURSOR);
    }

    #[tokio::test]
    async fn test_dependencies_are_part_of_key() {
        let source = Arc::new(StubSource::default().with_pages("", vec![page("v", 0..2, None)]));
        let (_, field) = field_over(source.clone());
        let field = field.with_dependencies(vec![serde_json::json!(1)]);

        field.open().await;
        assert!(field.set_dependencies(vec![serde_json::json!(2)]).await);
        assert!(!field.set_dependencies(vec![serde_json::json!(2)]).await);

        assert_eq!(field.query_key().dependencies, vec![serde_json::json!(2)]);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_extra_params_and_limit_forwarded() {
        let source = Arc::new(StubSource::default().with_pages("", vec![page("v", 0..2, None)]));
        let form = Arc::new(MemoryField::default());
        let field: SelectionField<Value> = SelectionField::new(
            source.clone(),
            SelectionConfig::new("drivers").page_size(50).param("depot", "7"),
            form,
        );

        field.open().await;

        let call = &source.calls()[0];
        assert_eq!(call.limit, 50);
        assert_eq!(call.extra.get("depot").map(String::as_str), Some("7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_pending_search() {
        let source = Arc::new(
            StubSource::default()
                .with_pages("", vec![page("v", 0..2, None)])
                .with_pages("a", vec![page("a", 0..2, None)]),
        );
        let (_, field) = field_over(source.clone());
        field.open().await;

        field.set_input("a").unwrap();
        field.dispose();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(source.calls().len(), 1);
        assert_eq!(field.set_input("b"), Err(TimerError::Disposed));
        assert!(!field.open().await);
    }
}
