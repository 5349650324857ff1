use std::io::Read;

use aws_sdk_s3::{
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTimeFormat},
    types::{
        CompletedMultipartUpload, CompletedPart, Delete, ObjectCannedAcl, ObjectIdentifier,
        Permission,
    },
};
use tracing::warn;

use crate::{
    adapters::ObjectClient,
    model::{
        fs::{ACL_DEFAULT, ACL_PRIVATE, ACL_PUBLIC_READ, ACL_PUBLIC_READ_WRITE},
        object::{ClientError, ListPage, ListRequest, ObjectInfo, ObjectMeta},
    },
    options::{keys, Options},
    util,
};

const PART_SIZE: usize = 8 * 1024 * 1024;
const MAX_DELETE_BATCH: usize = 1000;
const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

fn request_error<E>(action: &str, key: &str, err: E) -> ClientError
where
    E: std::error::Error,
{
    ClientError::request(format!(
        "failed to {} at: {}, {}",
        action,
        key,
        DisplayErrorContext(&err)
    ))
}

fn canned_acl(options: &Options) -> Option<ObjectCannedAcl> {
    options
        .header(keys::OBJECT_ACL)
        .filter(|acl| *acl != ACL_DEFAULT)
        .map(ObjectCannedAcl::from)
}

fn content_type(options: &Options) -> Option<String> {
    options.get_str(keys::CONTENT_TYPE).map(String::from)
}

fn max_keys(options: &Options) -> Option<i32> {
    options
        .get_int(keys::MAX_KEYS)
        .and_then(|n| i32::try_from(n).ok())
}

fn read_part(body: &mut dyn Read) -> Result<Vec<u8>, ClientError> {
    let mut buf = Vec::with_capacity(PART_SIZE);
    Read::take(&mut *body, PART_SIZE as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

impl ObjectClient for aws_sdk_s3::Client {
    fn fs_object_exists(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<bool, ClientError> {
        let req = self.head_object().bucket(bucket).key(key);

        match util::poll::poll_until_ready(req.send()) {
            Ok(_) => Ok(true),
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Ok(false);
                    }
                }

                Err(request_error("head_object", key, err))
            }
        }
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        let req = self.get_object().bucket(bucket).key(key);

        let o = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Ok(None);
                    }
                }

                return Err(request_error("get_object", key, err));
            }
            Ok(o) => o,
        };

        let bytes = util::poll::poll_until_ready(o.body.collect())
            .map_err(|err| request_error("collect body", key, err))?;

        Ok(Some(bytes.into_bytes().to_vec()))
    }

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), ClientError> {
        let req = self
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_acl(canned_acl(options))
            .set_content_type(content_type(options));

        util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("put_object", key, err))?;

        Ok(())
    }

    fn fs_upload_stream(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &Options,
    ) -> Result<(), ClientError> {
        let first = read_part(body)?;
        if first.len() < PART_SIZE {
            return self.fs_put_object(bucket, key, first, options);
        }

        let req = self
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_acl(canned_acl(options))
            .set_content_type(content_type(options));

        let created = util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("create_multipart_upload", key, err))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| ClientError::request(format!("no upload id returned for: {}", key)))?
            .to_string();

        let mut parts = Vec::new();
        let mut part_number = 1;
        let mut chunk = first;
        let uploaded: Result<(), ClientError> = loop {
            let req = self
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk));

            let part = match util::poll::poll_until_ready(req.send()) {
                Ok(part) => part,
                Err(err) => break Err(request_error("upload_part", key, err)),
            };

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(part.e_tag().map(String::from))
                    .part_number(part_number)
                    .build(),
            );

            chunk = match read_part(body) {
                Ok(chunk) => chunk,
                Err(err) => break Err(err),
            };
            if chunk.is_empty() {
                break Ok(());
            }
            part_number += 1;
        };

        if let Err(err) = uploaded {
            let abort = self
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id);
            if let Err(abort_err) = util::poll::poll_until_ready(abort.send()) {
                warn!(error_message=%DisplayErrorContext(&abort_err), upload_id=%upload_id, "failed to abort multipart upload");
            }
            return Err(err);
        }

        let req = self
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            );

        util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("complete_multipart_upload", key, err))?;

        Ok(())
    }

    fn fs_delete_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let req = self.delete_object().bucket(bucket).key(key);

        util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("delete_object", key, err))?;

        Ok(())
    }

    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        _options: &Options,
    ) -> Result<(), ClientError> {
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            let identifiers = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|err| request_error("delete_objects", key, err))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|err| request_error("delete_objects", &batch[0], err))?;

            let req = self.delete_objects().bucket(bucket).delete(delete);
            let out = util::poll::poll_until_ready(req.send())
                .map_err(|err| request_error("delete_objects", &batch[0], err))?;

            if let Some(failed) = out.errors().first() {
                return Err(ClientError::request(format!(
                    "failed to delete_objects at: {}, {}",
                    failed.key().unwrap_or(""),
                    failed.message().unwrap_or("unknown error")
                )));
            }
        }

        Ok(())
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &ListRequest,
        options: &Options,
    ) -> Result<ListPage, ClientError> {
        let req = self
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.marker.clone())
            .fetch_owner(request.fetch_owner)
            .set_max_keys(max_keys(options));

        let lo = util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("list_objects", &request.prefix, err))?;

        let objects = lo
            .contents()
            .iter()
            .map(|o| ObjectInfo {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().and_then(|s| u64::try_from(s).ok()),
                last_modified: o
                    .last_modified()
                    .and_then(|dt| dt.fmt(DateTimeFormat::DateTime).ok()),
                content_type: None,
            })
            .collect();

        let prefixes = lo
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(String::from))
            .collect();

        Ok(ListPage {
            objects,
            prefixes,
            is_truncated: lo.is_truncated().unwrap_or(false),
            next_marker: lo.next_continuation_token().map(String::from),
        })
    }

    fn fs_copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let req = self
            .copy_object()
            .bucket(bucket)
            .key(destination)
            .copy_source(format!("{}/{}", bucket, urlencoding::encode(source)));

        util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("copy_object", source, err))?;

        Ok(())
    }

    fn fs_get_object_acl(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<String, ClientError> {
        let req = self.get_object_acl().bucket(bucket).key(key);

        let acl = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Err(ClientError::NotFound(key.to_string()));
                    }
                }

                return Err(request_error("get_object_acl", key, err));
            }
            Ok(acl) => acl,
        };

        let (mut read, mut write) = (false, false);
        for grant in acl.grants() {
            let everyone = grant
                .grantee()
                .and_then(|grantee| grantee.uri())
                .map_or(false, |uri| uri == ALL_USERS_URI);
            if !everyone {
                continue;
            }

            match grant.permission() {
                Some(Permission::Read) => read = true,
                Some(Permission::Write) => write = true,
                Some(Permission::FullControl) => {
                    read = true;
                    write = true;
                }
                _ => {}
            }
        }

        let canned = match (read, write) {
            (true, true) => ACL_PUBLIC_READ_WRITE,
            (true, false) => ACL_PUBLIC_READ,
            _ => ACL_PRIVATE,
        };

        Ok(canned.to_string())
    }

    fn fs_put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let req = self
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(acl));

        util::poll::poll_until_ready(req.send())
            .map_err(|err| request_error("put_object_acl", key, err))?;

        Ok(())
    }

    fn fs_get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<ObjectMeta, ClientError> {
        let req = self.head_object().bucket(bucket).key(key);

        let ho = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Err(ClientError::NotFound(key.to_string()));
                    }
                }

                return Err(request_error("head_object", key, err));
            }
            Ok(ho) => ho,
        };

        Ok(ObjectMeta {
            content_type: ho.content_type().map(String::from),
            content_length: ho.content_length().and_then(|n| u64::try_from(n).ok()),
            last_modified: ho
                .last_modified()
                .and_then(|dt| dt.fmt(DateTimeFormat::HttpDate).ok()),
        })
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<(), ClientError> {
        let marker = format!("{}/", key.trim_end_matches('/'));
        self.fs_put_object(bucket, &marker, Vec::new(), options)
    }
}
