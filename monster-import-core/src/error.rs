use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stat block: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Spell index unavailable: {0}")]
    SpellIndexUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// A field that could not be read as written and fell back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldIssue {
    /// A numeric slot held something that is not a number; 0 was used.
    UnparseableNumber { field: &'static str, raw: String },
    /// A token was not in the vocabulary for this field and was dropped.
    UnknownToken { field: &'static str, token: String },
    /// A list field, or one of its entries, had the wrong shape and was skipped.
    MalformedEntry { field: &'static str, raw: String },
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldIssue::UnparseableNumber { field, raw } => {
                write!(f, "{}: '{}' is not a number, using 0", field, raw)
            }
            FieldIssue::UnknownToken { field, token } => {
                write!(f, "{}: unrecognized '{}' dropped", field, token)
            }
            FieldIssue::MalformedEntry { field, raw } => {
                write!(f, "{}: malformed entry {} skipped", field, raw)
            }
        }
    }
}

/// Degraded-default findings gathered during one parse.
///
/// Nothing recorded here aborts a parse. `notifications` are the messages a
/// host should show to the user; `issues` are per-field fallbacks.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    pub issues: Vec<FieldIssue>,
    pub notifications: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unparseable(&mut self, field: &'static str, raw: &str) {
        tracing::warn!("{} value '{}' is not numeric, defaulting to 0", field, raw);
        self.issues.push(FieldIssue::UnparseableNumber {
            field,
            raw: raw.to_string(),
        });
    }

    pub fn unknown(&mut self, field: &'static str, token: &str) {
        tracing::debug!("Dropping unrecognized {} token '{}'", field, token);
        self.issues.push(FieldIssue::UnknownToken {
            field,
            token: token.to_string(),
        });
    }

    pub fn malformed(&mut self, field: &'static str, raw: &str) {
        tracing::warn!("Skipping malformed {} entry {}", field, raw);
        self.issues.push(FieldIssue::MalformedEntry {
            field,
            raw: raw.to_string(),
        });
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.notifications.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.notifications.is_empty()
    }
}
