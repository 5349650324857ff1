use std::io::Read;

use crate::{
    model::object::{ClientError, ListPage, ListRequest, ObjectMeta},
    options::Options,
};

pub mod gcs;
pub mod memory;
pub mod s3;

/// Object-store client consumed by `ObjectFS`.
///
/// Each method performs one logical remote operation and blocks until it
/// completes. Implementations do not retry.
pub trait ObjectClient: Send + Sync {
    fn fs_object_exists(&self, bucket: &str, key: &str, options: &Options)
        -> Result<bool, ClientError>;

    /// Returns `None` when the object does not exist.
    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<Option<Vec<u8>>, ClientError>;

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), ClientError>;

    /// Uploads from a byte source that is read once, front to back.
    fn fs_upload_stream(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &Options,
    ) -> Result<(), ClientError>;

    /// Deleting an absent object succeeds.
    fn fs_delete_object(&self, bucket: &str, key: &str, options: &Options)
        -> Result<(), ClientError>;

    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        options: &Options,
    ) -> Result<(), ClientError>;

    fn fs_list_objects(
        &self,
        bucket: &str,
        request: &ListRequest,
        options: &Options,
    ) -> Result<ListPage, ClientError>;

    /// Copies within one bucket.
    fn fs_copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        options: &Options,
    ) -> Result<(), ClientError>;

    fn fs_get_object_acl(&self, bucket: &str, key: &str, options: &Options)
        -> Result<String, ClientError>;

    fn fs_put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        options: &Options,
    ) -> Result<(), ClientError>;

    fn fs_get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<ObjectMeta, ClientError>;

    /// Writes an empty `key/` marker object.
    fn fs_create_object_dir(&self, bucket: &str, key: &str, options: &Options)
        -> Result<(), ClientError>;
}
