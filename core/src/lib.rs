#![deny(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

pub mod api;
pub mod filter;
pub mod messages;
pub mod models;
pub mod query;
pub mod result;
pub mod select;
pub mod source;
pub mod timers;

// Re-export commonly used types
pub use api::{
    classify_response, ApiClient, CacheDirective, ClientConfig, ClientError, Method,
    RequestBody, RequestContext, RequestOptions,
};
pub use filter::{FilterBar, FilterDescriptor, FilterError, FilterKind, SelectChoice};
pub use messages::{GenericMessage, MessageCatalog};
pub use models::{
    FetchPage, FetchParams, OptionSet, OptionValue, QueryBatch, QueryKey, QueryUpdate,
    SelectOption,
};
pub use query::{MemoryNavigator, NavigateMode, NavigateOptions, Navigator, QueryParams, QuerySync};
pub use result::{ApiFailure, ApiResult, ApiSuccess, ErrorKind, FieldError};
pub use select::{
    FormField, LoadingState, MemoryField, ScrollMetrics, SelectionConfig, SelectionField,
};
pub use source::{OptionSource, RemoteOptionSource, SourceError};
pub use timers::{TimerError, TimerTable};
