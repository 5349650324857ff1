use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
};

use tracing::{error, info, span, Level};

use crate::{
    adapters::ObjectClient,
    error::{FilesystemError, MetadataKind},
    listing::ListContents,
    model::{
        fs::{FileAttributes, Visibility, ACL_DEFAULT, DEFAULT_CONTENT_TYPE},
        object::{ClientError, ListRequest},
    },
    options::{keys, Config, Options},
    util::{
        object::{directory_prefix, normalize_key},
        timestamp,
    },
};

/// Filesystem view over one bucket.
///
/// Holds no state besides the client, the bucket name and the instance
/// options, all fixed at construction, so it can be shared across threads.
pub struct ObjectFS {
    client: Box<dyn ObjectClient>,
    bucket: String,
    options: Options,
}

/// Readable, seekable contents of an object buffered in an anonymous
/// temporary file. The file is removed when the stream is dropped.
#[derive(Debug)]
pub struct ReadStream {
    file: File,
}

impl Read for ReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for ReadStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl ObjectFS {
    pub fn new(client: Box<dyn ObjectClient>, bucket: &str) -> Self {
        Self::with_options(client, bucket, Options::new())
    }

    pub fn with_options(client: Box<dyn ObjectClient>, bucket: &str, options: Options) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            options,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn client(&self) -> &dyn ObjectClient {
        self.client.as_ref()
    }

    fn request_options(&self, overrides: &Options) -> Options {
        self.options.merged(overrides)
    }

    pub fn file_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        let span = span!(Level::INFO, "file_exists", context = "file_exists");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        self.client
            .fs_object_exists(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="object_exists");
                FilesystemError::UnableToCheckExistence {
                    location: key.to_string(),
                    source: err,
                }
            })
    }

    /// Writes `contents` in one call. `config.visibility` becomes the object
    /// ACL: `Public` is `public-read`, `Private` is `private` and an unset
    /// visibility leaves the bucket default in place.
    pub fn write(&self, path: &str, contents: &[u8], config: &Config) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();
        info!(path = path, size = contents.len(), visibility = ?config.visibility, "called");

        let key = normalize_key(path);
        let acl = config.visibility.map_or(ACL_DEFAULT, |v| v.as_acl());
        let mut request = Options::new().with(
            keys::HEADERS,
            Options::new().with(keys::OBJECT_ACL, acl),
        );
        if let Some(mime) = mime_guess::from_path(key).first_raw() {
            request.insert(keys::CONTENT_TYPE, mime);
        }

        let options = self.request_options(&request.merged(&config.options));
        self.client
            .fs_put_object(&self.bucket, key, contents.to_vec(), &options)
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object");
                FilesystemError::UnableToWrite {
                    location: key.to_string(),
                    reason: String::new(),
                    source: Some(err),
                }
            })
    }

    /// Uploads `contents` as it is read. Unlike `write`, the visibility in
    /// `config` is not applied; the object gets the bucket default ACL.
    pub fn write_stream(
        &self,
        path: &str,
        contents: &mut dyn Read,
        config: &Config,
    ) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "write_stream", context = "write_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        let mut request = config.options.clone();
        if request.get(keys::CONTENT_TYPE).is_none() {
            if let Some(mime) = mime_guess::from_path(key).first_raw() {
                request.insert(keys::CONTENT_TYPE, mime);
            }
        }

        let options = self.request_options(&request);
        self.client
            .fs_upload_stream(&self.bucket, key, contents, &options)
            .map_err(|err| {
                error!(error_message=%err, error_group="upload_stream");
                FilesystemError::UnableToWrite {
                    location: key.to_string(),
                    reason: String::new(),
                    source: Some(err),
                }
            })
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>, FilesystemError> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        match self.client.fs_get_object(&self.bucket, key, &self.options) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => {
                error!(error_message="object not found", error_group="get_object");
                Err(FilesystemError::UnableToRead {
                    location: key.to_string(),
                    reason: "object not found".to_string(),
                    source: Some(ClientError::NotFound(key.to_string())),
                })
            }
            Err(err) => {
                error!(error_message=%err, error_group="get_object");
                Err(FilesystemError::UnableToRead {
                    location: key.to_string(),
                    reason: String::new(),
                    source: Some(err),
                })
            }
        }
    }

    /// Fetches the whole object and returns a stream over a local copy.
    /// An absent or empty object fails before any local file is created.
    pub fn read_stream(&self, path: &str) -> Result<ReadStream, FilesystemError> {
        let span = span!(Level::INFO, "read_stream", context = "read_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        let read_error = |reason: &str, source: Option<ClientError>| FilesystemError::UnableToRead {
            location: key.to_string(),
            reason: reason.to_string(),
            source,
        };

        let bytes = match self.client.fs_get_object(&self.bucket, key, &self.options) {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => {
                error!(error_message="object not found", error_group="get_object");
                return Err(read_error("object not found", None));
            }
            Err(err) => {
                error!(error_message=%err, error_group="get_object");
                return Err(read_error("", Some(err)));
            }
        };

        let buffer = || -> io::Result<File> {
            let mut file = tempfile::tempfile()?;
            file.write_all(&bytes)?;
            file.seek(SeekFrom::Start(0))?;
            Ok(file)
        };

        match buffer() {
            Ok(file) => Ok(ReadStream { file }),
            Err(err) => {
                error!(error_message=%err, error_group="tempfile");
                Err(read_error("unable to buffer object locally", Some(err.into())))
            }
        }
    }

    /// Removes one object. Removing an absent object succeeds.
    pub fn delete(&self, path: &str) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        self.client
            .fs_delete_object(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="delete_object");
                FilesystemError::UnableToDelete {
                    location: key.to_string(),
                    reason: String::new(),
                    source: Some(err),
                }
            })
    }

    /// Removes every object under the directory prefix, page by page, then
    /// the directory marker itself.
    ///
    /// Not isolated from concurrent writers: objects added under the prefix
    /// while pages are being drained may survive. On failure some objects may
    /// already be gone; calling again is safe.
    pub fn delete_directory(&self, path: &str) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "delete_directory", context = "delete_directory");
        let _e = span.enter();
        info!(path = path, "called");

        let prefix = directory_prefix(path);
        let fail = |group: &str, err: ClientError| {
            error!(error_message=%err, error_group=group);
            FilesystemError::UnableToDeleteDirectory {
                location: normalize_key(path).to_string(),
                reason: String::new(),
                source: Some(err),
            }
        };

        let mut marker: Option<String> = None;
        let mut deleted = 0;
        loop {
            let request = ListRequest::new(&prefix).marker(marker.take());
            let page = self
                .client
                .fs_list_objects(&self.bucket, &request, &self.options)
                .map_err(|err| fail("list_objects", err))?;

            let keys: Vec<String> = page.objects.into_iter().map(|o| o.key).collect();
            if !keys.is_empty() {
                self.client
                    .fs_delete_objects(&self.bucket, &keys, &self.options)
                    .map_err(|err| fail("delete_objects", err))?;
                deleted += keys.len();
            }

            if !page.is_truncated {
                break;
            }

            marker = match page.next_marker {
                Some(next) => Some(next),
                None => {
                    return Err(fail(
                        "list_objects",
                        ClientError::request("truncated listing returned no continuation marker"),
                    ))
                }
            };
        }

        if !prefix.is_empty() {
            self.client
                .fs_delete_object(&self.bucket, &prefix, &self.options)
                .map_err(|err| fail("delete_object", err))?;
        }

        info!(path = path, deleted = deleted, "directory deleted");
        Ok(())
    }

    /// Writes a directory marker. `config` is accepted for interface parity
    /// and not applied.
    pub fn create_directory(&self, path: &str, _config: &Config) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "create_directory", context = "create_directory");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        self.client
            .fs_create_object_dir(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="create_object_dir");
                FilesystemError::UnableToCreateDirectory {
                    location: key.to_string(),
                    source: err,
                }
            })
    }

    pub fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "set_visibility", context = "set_visibility");
        let _e = span.enter();
        info!(path = path, visibility = %visibility, "called");

        let key = normalize_key(path);
        self.client
            .fs_put_object_acl(&self.bucket, key, visibility.as_acl(), &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object_acl");
                FilesystemError::UnableToSetVisibility {
                    location: key.to_string(),
                    reason: String::new(),
                    source: Some(err),
                }
            })
    }

    /// Reports `Public` for `public-read` and `public-read-write` ACLs and
    /// `Private` for anything else. The backend ACL is kept in `extra["acl"]`.
    pub fn visibility(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        let span = span!(Level::INFO, "visibility", context = "visibility");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        let acl = self
            .client
            .fs_get_object_acl(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object_acl");
                FilesystemError::metadata(key, MetadataKind::Visibility, err)
            })?;

        let mut attributes = FileAttributes::new(key);
        attributes.visibility = Some(Visibility::from_acl(&acl));
        attributes.extra = BTreeMap::from([("acl".to_string(), acl.into())]);
        Ok(attributes)
    }

    /// Fails when the backend reports no content type or its default one.
    pub fn mime_type(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        let span = span!(Level::INFO, "mime_type", context = "mime_type");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        let meta = self
            .client
            .fs_get_object_meta(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object_meta");
                FilesystemError::metadata(key, MetadataKind::MimeType, err)
            })?;

        match meta.content_type {
            Some(mime) if mime != DEFAULT_CONTENT_TYPE => {
                let mut attributes = FileAttributes::new(key);
                attributes.mime_type = Some(mime);
                Ok(attributes)
            }
            _ => Err(FilesystemError::metadata_reason(
                key,
                MetadataKind::MimeType,
                "unknown mime type",
            )),
        }
    }

    pub fn last_modified(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        let span = span!(Level::INFO, "last_modified", context = "last_modified");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        let meta = self
            .client
            .fs_get_object_meta(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object_meta");
                FilesystemError::metadata(key, MetadataKind::LastModified, err)
            })?;

        let raw = meta.last_modified.ok_or_else(|| {
            FilesystemError::metadata_reason(key, MetadataKind::LastModified, "not reported")
        })?;
        let seconds = timestamp::parse_epoch_seconds(&raw).ok_or_else(|| {
            error!(error_message=%raw, error_group="parse_timestamp");
            FilesystemError::metadata_reason(
                key,
                MetadataKind::LastModified,
                format!("malformed timestamp: {}", raw),
            )
        })?;

        let mut attributes = FileAttributes::new(key);
        attributes.last_modified = Some(seconds);
        Ok(attributes)
    }

    pub fn file_size(&self, path: &str) -> Result<FileAttributes, FilesystemError> {
        let span = span!(Level::INFO, "file_size", context = "file_size");
        let _e = span.enter();
        info!(path = path, "called");

        let key = normalize_key(path);
        let meta = self
            .client
            .fs_get_object_meta(&self.bucket, key, &self.options)
            .map_err(|err| {
                error!(error_message=%err, error_group="get_object_meta");
                FilesystemError::metadata(key, MetadataKind::FileSize, err)
            })?;

        let size = meta.content_length.ok_or_else(|| {
            FilesystemError::metadata_reason(key, MetadataKind::FileSize, "not reported")
        })?;

        let mut attributes = FileAttributes::new(key);
        attributes.file_size = Some(size);
        Ok(attributes)
    }

    /// Lists the entries under `path`. With `deep`, every discovered
    /// subdirectory is listed as well, breadth first. Pages are fetched as
    /// the iterator advances.
    pub fn list_contents(&self, path: &str, deep: bool) -> ListContents<'_> {
        info!(path = path, deep = deep, "list_contents called");
        ListContents::new(self, &directory_prefix(path), deep)
    }

    /// Copies then deletes the source. If the delete fails the object is left
    /// at both paths.
    pub fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &Config,
    ) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "move_file", context = "move_file");
        let _e = span.enter();
        info!(source = source, destination = destination, "called");

        let (from, to) = (normalize_key(source), normalize_key(destination));
        let fail = |group: &str, err: ClientError| {
            error!(error_message=%err, error_group=group);
            FilesystemError::UnableToMove {
                from: from.to_string(),
                to: to.to_string(),
                source: err,
            }
        };

        let options = self.request_options(&config.options);
        self.client
            .fs_copy_object(&self.bucket, from, to, &options)
            .map_err(|err| fail("copy_object", err))?;
        self.client
            .fs_delete_object(&self.bucket, from, &options)
            .map_err(|err| fail("delete_object", err))
    }

    pub fn copy(&self, source: &str, destination: &str, config: &Config) -> Result<(), FilesystemError> {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();
        info!(source = source, destination = destination, "called");

        let (from, to) = (normalize_key(source), normalize_key(destination));
        let options = self.request_options(&config.options);
        self.client
            .fs_copy_object(&self.bucket, from, to, &options)
            .map_err(|err| {
                error!(error_message=%err, error_group="copy_object");
                FilesystemError::UnableToCopy {
                    from: from.to_string(),
                    to: to.to_string(),
                    source: err,
                }
            })
    }
}
