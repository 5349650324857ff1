use std::fmt;

use thiserror::Error;

use crate::model::object::ClientError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataKind {
    Visibility,
    MimeType,
    LastModified,
    FileSize,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataKind::Visibility => "visibility",
            MetadataKind::MimeType => "mime_type",
            MetadataKind::LastModified => "last_modified",
            MetadataKind::FileSize => "file_size",
        };
        f.write_str(name)
    }
}

/// Errors raised by `ObjectFS`. Every variant keeps the backend failure, when
/// there was one, as its source.
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("unable to check existence for: {location}")]
    UnableToCheckExistence {
        location: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to read file from location: {location}. {reason}")]
    UnableToRead {
        location: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("unable to write file at location: {location}. {reason}")]
    UnableToWrite {
        location: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("unable to delete file located at: {location}. {reason}")]
    UnableToDelete {
        location: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },

    /// Objects under the prefix may already have been removed.
    #[error("unable to delete directory located at: {location}. {reason}")]
    UnableToDeleteDirectory {
        location: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("unable to create directory at location: {location}")]
    UnableToCreateDirectory {
        location: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to list contents of: {location}")]
    UnableToList {
        location: String,
        #[source]
        source: ClientError,
    },

    /// The object may exist at both paths.
    #[error("unable to move file from {from} to {to}")]
    UnableToMove {
        from: String,
        to: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to copy file from {from} to {to}")]
    UnableToCopy {
        from: String,
        to: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to retrieve the {kind} for file at location: {location}. {reason}")]
    UnableToRetrieveMetadata {
        location: String,
        kind: MetadataKind,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("unable to set visibility for file {location}. {reason}")]
    UnableToSetVisibility {
        location: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },
}

impl FilesystemError {
    pub fn metadata(location: &str, kind: MetadataKind, source: ClientError) -> Self {
        FilesystemError::UnableToRetrieveMetadata {
            location: location.to_string(),
            kind,
            reason: String::new(),
            source: Some(source),
        }
    }

    pub fn metadata_reason(location: &str, kind: MetadataKind, reason: impl Into<String>) -> Self {
        FilesystemError::UnableToRetrieveMetadata {
            location: location.to_string(),
            kind,
            reason: reason.into(),
            source: None,
        }
    }

    /// Primary path the failed operation was addressing.
    pub fn location(&self) -> &str {
        match self {
            FilesystemError::UnableToCheckExistence { location, .. }
            | FilesystemError::UnableToRead { location, .. }
            | FilesystemError::UnableToWrite { location, .. }
            | FilesystemError::UnableToDelete { location, .. }
            | FilesystemError::UnableToDeleteDirectory { location, .. }
            | FilesystemError::UnableToCreateDirectory { location, .. }
            | FilesystemError::UnableToList { location, .. }
            | FilesystemError::UnableToRetrieveMetadata { location, .. }
            | FilesystemError::UnableToSetVisibility { location, .. } => location,
            FilesystemError::UnableToMove { from, .. }
            | FilesystemError::UnableToCopy { from, .. } => from,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_source_is_preserved() {
        let err = FilesystemError::UnableToCheckExistence {
            location: "a.txt".to_string(),
            source: ClientError::request("access denied"),
        };

        assert_eq!(err.to_string(), "unable to check existence for: a.txt");
        assert_eq!(err.source().map(|e| e.to_string()), Some("access denied".to_string()));
    }

    #[test]
    fn test_metadata_message() {
        let err = FilesystemError::metadata_reason("a.txt", MetadataKind::MimeType, "unknown");

        assert_eq!(
            err.to_string(),
            "unable to retrieve the mime_type for file at location: a.txt. unknown"
        );
        assert!(err.source().is_none());
        assert_eq!(err.location(), "a.txt");
    }

    #[test]
    fn test_move_location_is_source_path() {
        let err = FilesystemError::UnableToMove {
            from: "a".to_string(),
            to: "b".to_string(),
            source: ClientError::NotFound("a".to_string()),
        };

        assert_eq!(err.location(), "a");
        assert_eq!(err.to_string(), "unable to move file from a to b");
    }
}
