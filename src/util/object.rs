use crate::model::object::ClientError;

pub const DELIMITER: &str = "/";

pub enum Provider {
    AWS,
    GCS,
}

impl Provider {
    pub fn is_aws(&self) -> bool {
        matches!(self, Provider::AWS)
    }
}

pub fn parse_provider_from_uri(bucket_uri: &str) -> Result<Provider, ClientError> {
    if bucket_uri.starts_with("s3://") {
        Ok(Provider::AWS)
    } else if bucket_uri.starts_with("gs://") {
        Ok(Provider::GCS)
    } else {
        Err(ClientError::request(format!(
            "failed to parse provider of: {}",
            bucket_uri
        )))
    }
}

pub fn parse_bucket_from_uri(bucket_uri: &str) -> &str {
    bucket_uri
        .split_once("://")
        .map(|(_, rest)| rest.trim_end_matches('/'))
        .unwrap_or("")
}

/// Object key for a file path: surrounding slashes removed.
pub fn normalize_key(path: &str) -> &str {
    path.trim_matches('/')
}

/// Listing prefix for a directory path: empty for the root, otherwise the
/// normalized key followed by a single `/`.
pub fn directory_prefix(path: &str) -> String {
    let key = normalize_key(path);
    if key.is_empty() {
        String::new()
    } else {
        format!("{}{}", key, DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert!(matches!(parse_provider_from_uri("s3://bucket"), Ok(Provider::AWS)));
        assert!(matches!(parse_provider_from_uri("gs://bucket"), Ok(Provider::GCS)));
        assert!(parse_provider_from_uri("ftp://bucket").is_err());
    }

    #[test]
    fn test_parse_bucket() {
        let cases = vec![
            ("s3://bucket", "bucket"),
            ("gs://bucket/", "bucket"),
            ("bucket", ""),
        ];

        for (uri, expected) in cases {
            assert_eq!(parse_bucket_from_uri(uri), expected, "failed for case: {}", uri);
        }
    }

    #[test]
    fn test_normalize_key() {
        let cases = vec![
            ("file.txt", "file.txt"),
            ("/file.txt", "file.txt"),
            ("dir/file.txt/", "dir/file.txt"),
            ("//a/b//", "a/b"),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_key(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_directory_prefix() {
        let cases = vec![
            ("", ""),
            ("/", ""),
            ("a", "a/"),
            ("a/b", "a/b/"),
            ("a/b/", "a/b/"),
            ("/a/b", "a/b/"),
        ];

        for (input, expected) in cases {
            assert_eq!(directory_prefix(input), expected, "failed for case: {}", input);
        }
    }
}
