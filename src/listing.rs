use std::collections::{HashSet, VecDeque};

use tracing::{debug, error};

use crate::{
    error::FilesystemError,
    fs::ObjectFS,
    model::{
        fs::{DirectoryAttributes, FileAttributes, StorageAttributes},
        object::{ClientError, ListRequest, ObjectInfo},
    },
    util::{object::DELIMITER, timestamp},
};

/// Iterator returned by `ObjectFS::list_contents`.
///
/// Each call to `next` either yields a buffered entry or fetches the next
/// page, following continuation markers in shallow and deep mode alike.
/// A failed page yields one error, after any entries already fetched, and
/// ends the iteration.
pub struct ListContents<'a> {
    fs: &'a ObjectFS,
    deep: bool,
    /// Prefixes discovered but not yet listed.
    frontier: VecDeque<String>,
    /// Prefix being paged through, with the marker of its next page.
    cursor: Option<(String, Option<String>)>,
    buffer: VecDeque<StorageAttributes>,
    seen: HashSet<String>,
    /// Failure to report once the entries fetched before it are drained.
    error: Option<FilesystemError>,
    done: bool,
}

impl<'a> ListContents<'a> {
    pub(crate) fn new(fs: &'a ObjectFS, prefix: &str, deep: bool) -> Self {
        Self {
            fs,
            deep,
            frontier: VecDeque::from([prefix.to_string()]),
            cursor: None,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            error: None,
            done: false,
        }
    }

    fn fetch(&mut self, prefix: String, marker: Option<String>) -> Result<(), FilesystemError> {
        let request = ListRequest::new(&prefix)
            .delimiter(DELIMITER)
            .marker(marker)
            .fetch_owner(true);

        let page = self
            .fs
            .client()
            .fs_list_objects(self.fs.bucket(), &request, self.fs.options())
            .map_err(|err| {
                error!(error_message=%err, error_group="list_objects");
                FilesystemError::UnableToList {
                    location: prefix.trim_end_matches('/').to_string(),
                    source: err,
                }
            })?;

        debug!(
            prefix = prefix.as_str(),
            objects = page.objects.len(),
            prefixes = page.prefixes.len(),
            truncated = page.is_truncated,
            "list page"
        );

        for object in page.objects {
            // the directory's own marker object
            if object.key == prefix {
                continue;
            }
            if self.seen.insert(object.key.clone()) {
                self.buffer
                    .push_back(StorageAttributes::File(map_object(object)));
            }
        }

        for common_prefix in page.prefixes {
            if !self.seen.insert(common_prefix.clone()) {
                continue;
            }
            self.buffer.push_back(StorageAttributes::Directory(
                DirectoryAttributes::new(&common_prefix),
            ));
            if self.deep {
                self.frontier.push_back(common_prefix);
            }
        }

        if page.is_truncated {
            let Some(next) = page.next_marker else {
                error!(error_message="truncated page without marker", error_group="list_objects");
                return Err(FilesystemError::UnableToList {
                    location: prefix.trim_end_matches('/').to_string(),
                    source: ClientError::request("truncated listing returned no continuation marker"),
                });
            };
            self.cursor = Some((prefix, Some(next)));
        }

        Ok(())
    }
}

impl Iterator for ListContents<'_> {
    type Item = Result<StorageAttributes, FilesystemError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            if let Some(err) = self.error.take() {
                return Some(Err(err));
            }
            if self.done {
                return None;
            }

            let (prefix, marker) = match self.cursor.take() {
                Some(cursor) => cursor,
                None => match self.frontier.pop_front() {
                    Some(prefix) => (prefix, None),
                    None => {
                        self.done = true;
                        return None;
                    }
                },
            };

            if let Err(err) = self.fetch(prefix, marker) {
                self.done = true;
                self.error = Some(err);
            }
        }
    }
}

fn map_object(object: ObjectInfo) -> FileAttributes {
    FileAttributes {
        last_modified: object
            .last_modified
            .as_deref()
            .and_then(timestamp::parse_epoch_seconds),
        path: object.key,
        file_size: object.size,
        visibility: None,
        mime_type: object.content_type,
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_object() {
        let cases = vec![
            (Some("2015-10-21T07:28:00Z"), Some(1445412480)),
            (Some("not a date"), None),
            (None, None),
        ];

        for (last_modified, expected) in cases {
            let attributes = map_object(ObjectInfo {
                key: "a/b.txt".to_string(),
                size: Some(3),
                last_modified: last_modified.map(String::from),
                content_type: Some("text/plain".to_string()),
            });

            assert_eq!(attributes.path, "a/b.txt");
            assert_eq!(attributes.file_size, Some(3));
            assert_eq!(attributes.visibility, None);
            assert_eq!(attributes.mime_type.as_deref(), Some("text/plain"));
            assert!(attributes.extra.is_empty());
            assert_eq!(
                attributes.last_modified, expected,
                "failed for case: {:?}",
                last_modified
            );
        }
    }
}
