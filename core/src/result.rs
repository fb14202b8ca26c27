use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// `code` attached to failures that never reached the backend
pub const TRANSPORT_ERROR_CODE: &str = "transport_error";
/// `code` attached to OK responses whose body could not be used
pub const UNEXPECTED_RESPONSE_CODE: &str = "unexpected_response";

/// Outcome of a single request. Exactly one variant carries data.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success(ApiSuccess<T>),
    Failure(ApiFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    pub message: String,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFailure {
    pub error: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Value>,
}

/// Failure taxonomy callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    ServerError,
    ServiceUnavailable,
    ValidationFailure,
    UnexpectedShape,
    Transport,
    Other,
}

/// A single field-addressable validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ApiFailure {
    pub fn new(error: impl Into<String>, status: u16) -> Self {
        Self {
            error: error.into(),
            status,
            code: None,
            details: None,
            data: None,
            validation_errors: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code.as_deref() {
            Some(TRANSPORT_ERROR_CODE) => return ErrorKind::Transport,
            Some(UNEXPECTED_RESPONSE_CODE) => return ErrorKind::UnexpectedShape,
            _ => {}
        }

        if self.validation_errors.is_some() {
            return ErrorKind::ValidationFailure;
        }

        match self.status {
            401 => ErrorKind::Unauthorized,
            404 => ErrorKind::NotFound,
            503 => ErrorKind::ServiceUnavailable,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Other,
        }
    }

    /// Validation errors in `[{field, message}]` or `{field: message | [messages]}` form.
    ///
    /// Entries in any other shape are skipped; the raw value stays in
    /// `validation_errors`.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match &self.validation_errors {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect(),
            Some(Value::Object(map)) => map
                .iter()
                .flat_map(|(field, messages)| {
                    let messages = match messages {
                        Value::String(s) => vec![s.clone()],
                        Value::Array(items) => items
                            .iter()
                            .filter_map(|m| m.as_str().map(str::to_string))
                            .collect(),
                        _ => vec![],
                    };
                    messages.into_iter().map(|message| FieldError {
                        field: field.clone(),
                        message,
                    })
                })
                .collect(),
            _ => vec![],
        }
    }
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Success(s) => s.status,
            Self::Failure(f) => f.status,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(s) => Some(&s.data),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ApiFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }

    pub fn into_result(self) -> Result<ApiSuccess<T>, ApiFailure> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Failure(f) => Err(f),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            Self::Success(s) => ApiResult::Success(ApiSuccess {
                data: f(s.data),
                meta: s.meta,
                message: s.message,
                status: s.status,
            }),
            Self::Failure(failure) => ApiResult::Failure(failure),
        }
    }
}

impl<T: Serialize> Serialize for ApiResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, B> {
            success: bool,
            #[serde(flatten)]
            body: &'a B,
        }

        match self {
            Self::Success(body) => Tagged {
                success: true,
                body,
            }
            .serialize(serializer),
            Self::Failure(body) => Tagged {
                success: false,
                body,
            }
            .serialize(serializer),
        }
    }
}
