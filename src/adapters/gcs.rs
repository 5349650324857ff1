use std::io::Read;

use google_cloud_storage::http::{
    bucket_access_controls::PredefinedBucketAcl,
    object_access_controls::{PredefinedObjectAcl, Projection},
    objects::{
        copy::CopyObjectRequest,
        delete::DeleteObjectRequest,
        download::Range,
        get::GetObjectRequest,
        list::ListObjectsRequest,
        patch::PatchObjectRequest,
        upload::{Media, UploadObjectRequest, UploadType},
    },
    Error,
};

use crate::{
    adapters::ObjectClient,
    model::{
        fs::{ACL_PRIVATE, ACL_PUBLIC_READ},
        object::{ClientError, ListPage, ListRequest, ObjectInfo, ObjectMeta},
    },
    options::{keys, Options},
    util,
};

const ALL_USERS: &str = "allUsers";

fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::Response(resp) if resp.code == 404)
}

fn request_error(action: &str, key: &str, err: Error) -> ClientError {
    ClientError::request(format!("failed to {} at: {}, {}", action, key, err))
}

fn predefined_acl(acl: &str) -> Option<PredefinedObjectAcl> {
    match acl {
        "public-read" | "public-read-write" => Some(PredefinedObjectAcl::PublicRead),
        "private" => Some(PredefinedObjectAcl::Private),
        "authenticated-read" => Some(PredefinedObjectAcl::AuthenticatedRead),
        "bucket-owner-read" => Some(PredefinedObjectAcl::BucketOwnerRead),
        "bucket-owner-full-control" => Some(PredefinedObjectAcl::BucketOwnerFullControl),
        _ => None,
    }
}

/// Object patches take the bucket-level ACL aliases.
fn patch_acl(acl: &str) -> Option<PredefinedBucketAcl> {
    match acl {
        "public-read" => Some(PredefinedBucketAcl::PublicRead),
        "public-read-write" => Some(PredefinedBucketAcl::PublicReadWrite),
        "private" => Some(PredefinedBucketAcl::Private),
        "authenticated-read" => Some(PredefinedBucketAcl::AuthenticatedRead),
        "project-private" => Some(PredefinedBucketAcl::ProjectPrivate),
        _ => None,
    }
}

fn get_request(bucket: &str, key: &str) -> GetObjectRequest {
    GetObjectRequest {
        bucket: bucket.to_string(),
        object: key.to_string(),
        ..Default::default()
    }
}

impl ObjectClient for google_cloud_storage::client::Client {
    fn fs_object_exists(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<bool, ClientError> {
        match util::poll::poll_until_ready(self.get_object(&get_request(bucket, key))) {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(request_error("get_object", key, err)),
        }
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        let req = get_request(bucket, key);

        match util::poll::poll_until_ready(self.download_object(&req, &Range::default())) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(request_error("download_object", key, err)),
        }
    }

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), ClientError> {
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            predefined_acl: options.header(keys::OBJECT_ACL).and_then(predefined_acl),
            ..Default::default()
        };

        let mut media = Media::new(key.to_string());
        if let Some(content_type) = options.get_str(keys::CONTENT_TYPE) {
            media.content_type = content_type.to_string().into();
        }

        util::poll::poll_until_ready(self.upload_object(&req, body, &UploadType::Simple(media)))
            .map_err(|err| request_error("upload_object", key, err))?;

        Ok(())
    }

    fn fs_upload_stream(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &Options,
    ) -> Result<(), ClientError> {
        // streamed uploads need a 'static body; buffer the source instead
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)?;

        self.fs_put_object(bucket, key, buf, options)
    }

    fn fs_delete_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let req = DeleteObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        match util::poll::poll_until_ready(self.delete_object(&req)) {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(request_error("delete_object", key, err)),
        }
    }

    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        options: &Options,
    ) -> Result<(), ClientError> {
        for key in keys {
            self.fs_delete_object(bucket, key, options)?;
        }

        Ok(())
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &ListRequest,
        options: &Options,
    ) -> Result<ListPage, ClientError> {
        let req = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: Some(request.prefix.clone()),
            delimiter: request.delimiter.clone(),
            page_token: request.marker.clone(),
            max_results: options
                .get_int(keys::MAX_KEYS)
                .and_then(|n| i32::try_from(n).ok()),
            ..Default::default()
        };

        let lo = util::poll::poll_until_ready(self.list_objects(&req))
            .map_err(|err| request_error("list_objects", &request.prefix, err))?;

        let objects = lo
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|obj| ObjectInfo {
                key: obj.name,
                size: u64::try_from(obj.size).ok(),
                last_modified: obj.updated.map(util::timestamp::format_rfc3339),
                content_type: obj.content_type,
            })
            .collect();

        Ok(ListPage {
            objects,
            prefixes: lo.prefixes.unwrap_or_default(),
            is_truncated: lo.next_page_token.is_some(),
            next_marker: lo.next_page_token,
        })
    }

    fn fs_copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let req = CopyObjectRequest {
            source_bucket: bucket.to_string(),
            source_object: source.to_string(),
            destination_bucket: bucket.to_string(),
            destination_object: destination.to_string(),
            ..Default::default()
        };

        util::poll::poll_until_ready(self.copy_object(&req))
            .map_err(|err| request_error("copy_object", source, err))?;

        Ok(())
    }

    fn fs_get_object_acl(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<String, ClientError> {
        let req = GetObjectRequest {
            projection: Some(Projection::Full),
            ..get_request(bucket, key)
        };

        let obj = match util::poll::poll_until_ready(self.get_object(&req)) {
            Ok(obj) => obj,
            Err(err) if is_not_found(&err) => return Err(ClientError::NotFound(key.to_string())),
            Err(err) => return Err(request_error("get_object", key, err)),
        };

        let public = obj
            .acl
            .unwrap_or_default()
            .iter()
            .any(|entry| entry.entity == ALL_USERS);

        Ok(if public { ACL_PUBLIC_READ } else { ACL_PRIVATE }.to_string())
    }

    fn fs_put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let predefined = patch_acl(acl)
            .ok_or_else(|| ClientError::request(format!("unsupported acl: {}", acl)))?;

        let req = PatchObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            predefined_acl: Some(predefined),
            ..Default::default()
        };

        match util::poll::poll_until_ready(self.patch_object(&req)) {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Err(ClientError::NotFound(key.to_string())),
            Err(err) => Err(request_error("patch_object", key, err)),
        }
    }

    fn fs_get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<ObjectMeta, ClientError> {
        let obj = match util::poll::poll_until_ready(self.get_object(&get_request(bucket, key))) {
            Ok(obj) => obj,
            Err(err) if is_not_found(&err) => return Err(ClientError::NotFound(key.to_string())),
            Err(err) => return Err(request_error("get_object", key, err)),
        };

        Ok(ObjectMeta {
            content_type: obj.content_type,
            content_length: u64::try_from(obj.size).ok(),
            last_modified: obj.updated.map(util::timestamp::format_rfc3339),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_acl() {
        let cases = vec![
            ("public-read", true),
            ("public-read-write", true),
            ("private", true),
            ("default", false),
            ("", false),
        ];

        for (acl, mapped) in cases {
            assert_eq!(predefined_acl(acl).is_some(), mapped, "failed for case: {}", acl);
        }
    }

    #[test]
    fn test_patch_acl() {
        let cases = vec![
            ("public-read", Some(PredefinedBucketAcl::PublicRead)),
            ("public-read-write", Some(PredefinedBucketAcl::PublicReadWrite)),
            ("private", Some(PredefinedBucketAcl::Private)),
            ("authenticated-read", Some(PredefinedBucketAcl::AuthenticatedRead)),
            ("default", None),
            ("bucket-owner-read", None),
        ];

        for (acl, expected) in cases {
            assert_eq!(patch_acl(acl), expected, "failed for case: {}", acl);
        }
    }
}
