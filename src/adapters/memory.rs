//! In-memory `ObjectClient`.
//!
//! Behaves like a strongly consistent bucket: sorted keys, delimiter
//! grouping, marker pagination and canned ACL strings. Every call is
//! recorded, and individual operations can be made to fail, which makes it
//! the backend of choice for exercising `ObjectFS` without a network.
//! Clones share the same store.

use std::{
    collections::{BTreeMap, HashSet},
    io::Read,
    ops::Bound,
    sync::{Arc, Mutex, MutexGuard},
};

use time::OffsetDateTime;

use crate::{
    adapters::ObjectClient,
    model::{
        fs::{ACL_DEFAULT, DEFAULT_CONTENT_TYPE},
        object::{ClientError, ListPage, ListRequest, ObjectInfo, ObjectMeta},
    },
    options::{keys, Options},
    util::timestamp,
};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub acl: String,
    pub content_type: String,
    pub last_modified: String,
}

impl StoredObject {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            acl: ACL_DEFAULT.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            last_modified: timestamp::format_rfc3339(OffsetDateTime::now_utc()),
        }
    }
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

#[derive(Clone)]
pub struct MemoryClient {
    buckets: Arc<Mutex<Buckets>>,
    page_size: usize,
    markers: bool,
    failures: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Page size used when the request carries no `max-keys` option.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(BTreeMap::new())),
            page_size: page_size.max(1),
            markers: true,
            failures: Arc::new(Mutex::new(HashSet::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Truncated pages carry no continuation marker, like a misbehaving backend.
    pub fn without_markers(mut self) -> Self {
        self.markers = false;
        self
    }

    /// Makes every later call to `operation` fail.
    pub fn fail_on(&self, operation: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(operation.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    pub fn insert_object(&self, bucket: &str, key: &str, object: StoredObject) {
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets
                .entry(bucket.to_string())
                .or_default()
                .insert(key.to_string(), object);
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets
            .lock()
            .ok()
            .and_then(|buckets| buckets.get(bucket).and_then(|b| b.get(key).cloned()))
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .ok()
            .and_then(|buckets| buckets.get(bucket).map(|b| b.keys().cloned().collect()))
            .unwrap_or_default()
    }

    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, Buckets>, ClientError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation.to_string());
        }

        let failing = self
            .failures
            .lock()
            .map(|f| f.contains(operation))
            .unwrap_or(false);
        if failing {
            return Err(ClientError::request(format!(
                "injected failure for {}",
                operation
            )));
        }

        self.buckets
            .lock()
            .map_err(|_| ClientError::request("memory store lock poisoned"))
    }

    fn stored(body: Vec<u8>, options: &Options) -> StoredObject {
        let mut object = StoredObject::new(&[]);
        object.body = body;
        if let Some(acl) = options.header(keys::OBJECT_ACL) {
            object.acl = acl.to_string();
        }
        if let Some(content_type) = options.get_str(keys::CONTENT_TYPE) {
            object.content_type = content_type.to_string();
        }
        object
    }
}

impl ObjectClient for MemoryClient {
    fn fs_object_exists(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<bool, ClientError> {
        let buckets = self.begin("object_exists")?;
        Ok(buckets.get(bucket).map_or(false, |b| b.contains_key(key)))
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        let buckets = self.begin("get_object")?;
        Ok(buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.body.clone()))
    }

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &Options,
    ) -> Result<(), ClientError> {
        let mut buckets = self.begin("put_object")?;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), Self::stored(body, options));
        Ok(())
    }

    fn fs_upload_stream(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        options: &Options,
    ) -> Result<(), ClientError> {
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)?;

        let mut buckets = self.begin("upload_stream")?;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), Self::stored(buf, options));
        Ok(())
    }

    fn fs_delete_object(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let mut buckets = self.begin("delete_object")?;
        if let Some(b) = buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }

    fn fs_delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
        _options: &Options,
    ) -> Result<(), ClientError> {
        let mut buckets = self.begin("delete_objects")?;
        if let Some(b) = buckets.get_mut(bucket) {
            for key in keys {
                b.remove(key);
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
        let buckets = self.begin("list_objects")?;
        let mut page = ListPage::default();

        let Some(objects) = buckets.get(bucket) else {
            return Ok(page);
        };

        let max_keys = options
            .get_int(keys::MAX_KEYS)
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(self.page_size);

        let lower = match &request.marker {
            Some(marker) => Bound::Excluded(marker.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut count = 0;
        let mut last_key: Option<String> = None;
        let entries = objects
            .range::<String, _>((lower, Bound::Unbounded))
            .skip_while(|(key, _)| !key.starts_with(&request.prefix))
            .take_while(|(key, _)| key.starts_with(&request.prefix));

        for (key, object) in entries {
            let rest = &key[request.prefix.len()..];
            let common_prefix = request.delimiter.as_deref().and_then(|delim| {
                rest.find(delim)
                    .map(|idx| format!("{}{}", request.prefix, &rest[..idx + delim.len()]))
            });

            match common_prefix {
                Some(cp) if page.prefixes.last() == Some(&cp) => {}
                Some(cp) => {
                    if count == max_keys {
                        page.is_truncated = true;
                        break;
                    }
                    page.prefixes.push(cp);
                    count += 1;
                }
                None => {
                    if count == max_keys {
                        page.is_truncated = true;
                        break;
                    }
                    page.objects.push(ObjectInfo {
                        key: key.clone(),
                        size: Some(object.body.len() as u64),
                        last_modified: Some(object.last_modified.clone()),
                        content_type: Some(object.content_type.clone()),
                    });
                    count += 1;
                }
            }

            last_key = Some(key.clone());
        }

        if page.is_truncated && self.markers {
            page.next_marker = last_key;
        }

        Ok(page)
    }

    fn fs_copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let mut buckets = self.begin("copy_object")?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::NotFound(source.to_string()))?;
        let mut object = objects
            .get(source)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(source.to_string()))?;

        object.last_modified = timestamp::format_rfc3339(OffsetDateTime::now_utc());
        objects.insert(destination.to_string(), object);
        Ok(())
    }

    fn fs_get_object_acl(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<String, ClientError> {
        let buckets = self.begin("get_object_acl")?;
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.acl.clone())
            .ok_or_else(|| ClientError::NotFound(key.to_string()))
    }

    fn fs_put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
        _options: &Options,
    ) -> Result<(), ClientError> {
        let mut buckets = self.begin("put_object_acl")?;
        let object = buckets
            .get_mut(bucket)
            .and_then(|b| b.get_mut(key))
            .ok_or_else(|| ClientError::NotFound(key.to_string()))?;

        object.acl = acl.to_string();
        Ok(())
    }

    fn fs_get_object_meta(
        &self,
        bucket: &str,
        key: &str,
        _options: &Options,
    ) -> Result<ObjectMeta, ClientError> {
        let buckets = self.begin("get_object_meta")?;
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| ObjectMeta {
                content_type: Some(o.content_type.clone()),
                content_length: Some(o.body.len() as u64),
                last_modified: Some(o.last_modified.clone()),
            })
            .ok_or_else(|| ClientError::NotFound(key.to_string()))
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        options: &Options,
    ) -> Result<(), ClientError> {
        let mut buckets = self.begin("create_object_dir")?;
        let marker = format!("{}/", key.trim_end_matches('/'));
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(marker, Self::stored(Vec::new(), options));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "dummy-bucket";

    fn seeded(page_size: usize, keys: &[&str]) -> MemoryClient {
        let client = MemoryClient::with_page_size(page_size);
        for key in keys {
            client.insert_object(BUCKET, key, StoredObject::new(b"x"));
        }
        client
    }

    #[test]
    fn test_list_groups_common_prefixes() {
        let client = seeded(
            100,
            &["dir1/a.txt", "dir1/b.txt", "dir2/c/d.txt", "f1.txt"],
        );

        let page = client
            .fs_list_objects(BUCKET, &ListRequest::new("").delimiter("/"), &Options::new())
            .unwrap();

        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["f1.txt"]);
        assert_eq!(page.prefixes, vec!["dir1/", "dir2/"]);
        assert!(!page.is_truncated);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_list_paginates_with_marker() {
        let client = seeded(2, &["a/1", "a/2", "a/3", "b/1"]);

        let mut seen = Vec::new();
        let mut marker = None;
        loop {
            let request = ListRequest::new("a/").marker(marker.clone());
            let page = client.fs_list_objects(BUCKET, &request, &Options::new()).unwrap();
            seen.extend(page.objects.into_iter().map(|o| o.key));
            if !page.is_truncated {
                break;
            }
            marker = page.next_marker;
        }

        assert_eq!(seen, vec!["a/1", "a/2", "a/3"]);
        assert_eq!(client.count_calls("list_objects"), 2);
    }

    #[test]
    fn test_list_max_keys_option() {
        let client = seeded(100, &["k1", "k2", "k3"]);
        let options = Options::new().with(keys::MAX_KEYS, 1);

        let page = client
            .fs_list_objects(BUCKET, &ListRequest::new(""), &options)
            .unwrap();

        assert_eq!(page.objects.len(), 1);
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("k1"));
    }

    #[test]
    fn test_list_does_not_split_common_prefix_across_pages() {
        let client = seeded(1, &["d/1", "d/2", "d/3", "e"]);

        let first = client
            .fs_list_objects(BUCKET, &ListRequest::new("").delimiter("/"), &Options::new())
            .unwrap();
        assert_eq!(first.prefixes, vec!["d/"]);
        assert_eq!(first.next_marker.as_deref(), Some("d/3"));

        let second = client
            .fs_list_objects(
                BUCKET,
                &ListRequest::new("").delimiter("/").marker(first.next_marker),
                &Options::new(),
            )
            .unwrap();
        assert!(second.prefixes.is_empty());
        assert_eq!(second.objects[0].key, "e");
        assert!(!second.is_truncated);
    }

    #[test]
    fn test_put_reads_acl_and_content_type() {
        let client = MemoryClient::new();
        let options = Options::new()
            .with(keys::HEADERS, Options::new().with(keys::OBJECT_ACL, "public-read"))
            .with(keys::CONTENT_TYPE, "text/plain");

        client.fs_put_object(BUCKET, "a.txt", b"hi".to_vec(), &options).unwrap();

        let object = client.object(BUCKET, "a.txt").unwrap();
        assert_eq!(object.acl, "public-read");
        assert_eq!(object.content_type, "text/plain");
    }

    #[test]
    fn test_fail_on() {
        let client = MemoryClient::new();
        client.fail_on("get_object");

        assert!(client.fs_get_object(BUCKET, "a", &Options::new()).is_err());
        assert!(client.fs_object_exists(BUCKET, "a", &Options::new()).is_ok());

        client.clear_failures();
        assert!(client.fs_get_object(BUCKET, "a", &Options::new()).is_ok());
        assert_eq!(client.calls(), vec!["get_object", "object_exists", "get_object"]);
    }

    #[test]
    fn test_create_object_dir_writes_marker() {
        let client = MemoryClient::new();

        client.fs_create_object_dir(BUCKET, "a/b", &Options::new()).unwrap();

        assert_eq!(client.keys(BUCKET), vec!["a/b/"]);
    }

    #[test]
    fn test_clones_share_store() {
        let client = MemoryClient::new();
        let other = client.clone();

        other.fs_put_object(BUCKET, "a", b"x".to_vec(), &Options::new()).unwrap();

        assert_eq!(client.keys(BUCKET), vec!["a"]);
        assert_eq!(client.calls(), vec!["put_object"]);
    }
}
