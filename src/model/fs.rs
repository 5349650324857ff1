use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::options::OptionValue;

pub const ACL_PUBLIC_READ: &str = "public-read";
pub const ACL_PUBLIC_READ_WRITE: &str = "public-read-write";
pub const ACL_PRIVATE: &str = "private";
pub const ACL_DEFAULT: &str = "default";

/// Content type a backend reports when none was set on upload.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Projects a backend ACL onto the two-valued visibility.
    pub fn from_acl(acl: &str) -> Self {
        match acl {
            ACL_PUBLIC_READ | ACL_PUBLIC_READ_WRITE => Visibility::Public,
            _ => Visibility::Private,
        }
    }

    pub fn as_acl(&self) -> &'static str {
        match self {
            Visibility::Public => ACL_PUBLIC_READ,
            Visibility::Private => ACL_PRIVATE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("invalid visibility: {}", other)),
        }
    }
}

/// Attributes of a stored object. Fields the backend did not report are `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileAttributes {
    pub path: String,
    pub file_size: Option<u64>,
    pub visibility: Option<Visibility>,
    /// Seconds since the unix epoch.
    pub last_modified: Option<i64>,
    pub mime_type: Option<String>,
    pub extra: BTreeMap<String, OptionValue>,
}

impl FileAttributes {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }
}

/// A common key prefix, reported without its trailing slash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryAttributes {
    pub path: String,
}

impl DirectoryAttributes {
    pub fn new(prefix: &str) -> Self {
        Self {
            path: prefix.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StorageAttributes {
    File(FileAttributes),
    Directory(DirectoryAttributes),
}

impl StorageAttributes {
    pub fn path(&self) -> &str {
        match self {
            StorageAttributes::File(file) => &file.path,
            StorageAttributes::Directory(dir) => &dir.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_from_acl() {
        let cases = vec![
            ("public-read", Visibility::Public),
            ("public-read-write", Visibility::Public),
            ("private", Visibility::Private),
            ("default", Visibility::Private),
            ("authenticated-read", Visibility::Private),
            ("", Visibility::Private),
        ];

        for (acl, expected) in cases {
            assert_eq!(Visibility::from_acl(acl), expected, "failed for case: {}", acl);
        }
    }

    #[test]
    fn test_visibility_from_str() {
        assert_eq!("public".parse::<Visibility>(), Ok(Visibility::Public));
        assert_eq!("private".parse::<Visibility>(), Ok(Visibility::Private));
        assert!("public-read".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_directory_attributes_strip_trailing_slash() {
        let cases = vec![("dir1/", "dir1"), ("a/b/", "a/b"), ("c", "c")];

        for (prefix, expected) in cases {
            assert_eq!(
                DirectoryAttributes::new(prefix).path,
                expected,
                "failed for case: {}",
                prefix
            );
        }
    }
}
