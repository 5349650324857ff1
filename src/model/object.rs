use thiserror::Error;

/// Failure reported by an `ObjectClient` for a single remote call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Request { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn request(message: impl Into<String>) -> Self {
        ClientError::Request {
            message: message.into(),
        }
    }
}

/// An object entry as reported by a listing call.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: Option<u64>,
    /// Backend textual timestamp, parsed by the caller.
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

/// Single-object metadata as reported by a head/stat call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectMeta {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    /// Continuation marker returned by the previous page.
    pub marker: Option<String>,
    pub fetch_owner: bool,
}

impl ListRequest {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    pub fn delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = Some(delimiter.to_string());
        self
    }

    pub fn marker(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }

    pub fn fetch_owner(mut self, fetch_owner: bool) -> Self {
        self.fetch_owner = fetch_owner;
        self
    }
}

/// One page of a listing call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    /// Common prefixes, each ending with the delimiter.
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}
