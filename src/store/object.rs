//! Object storage snapshot store
//!
//! Same single-document contract as the local store, kept in a bucket at
//! `<prefix>schemas.json`. Reads are soft: "not found" and transient fetch
//! failures both start from an empty history. Writes are hard failures.

use super::{corrupt_suffix, History, SnapshotStore};
use crate::checkpoint::CheckpointId;
use crate::config::{ConfigError, ObjectStoreSettings};
use crate::error::{load_error, save_error, DriftResult};
use crate::snapshot::SchemaSnapshot;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Minimal blob access needed by `ObjectStore`
pub trait BlobClient: Send + Sync {
    /// Object body, or `None` when the object does not exist
    fn get(&self, bucket: &str, key: &str) -> DriftResult<Option<String>>;

    fn put(&self, bucket: &str, key: &str, body: String, content_type: &str) -> DriftResult<()>;
}

/// Google Cloud Storage over its JSON API
#[derive(Debug, Clone)]
pub struct GcsClient {
    http: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl GcsClient {
    pub fn new(endpoint: &str, access_token: Option<String>, timeout: Duration) -> DriftResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidValue(format!("gcs_endpoint: {}", e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue(format!("gcs_endpoint: '{}' is not a base URL", endpoint)).into());
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            access_token,
        })
    }

    /// `{endpoint}/{segments...}` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl BlobClient for GcsClient {
    fn get(&self, bucket: &str, key: &str) -> DriftResult<Option<String>> {
        let mut url = self.url(&["storage", "v1", "b", bucket, "o", key]);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self
            .authorize(self.http.get(url))
            .send()
            .map_err(|e| load_error(format!("GET gs://{}/{}: {}", bucket, key, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .text()
                .map(Some)
                .map_err(|e| load_error(format!("reading gs://{}/{}: {}", bucket, key, e))),
            status => Err(load_error(format!(
                "GET gs://{}/{} returned {}",
                bucket, key, status
            ))),
        }
    }

    fn put(&self, bucket: &str, key: &str, body: String, content_type: &str) -> DriftResult<()> {
        let mut url = self.url(&["upload", "storage", "v1", "b", bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let response = self
            .authorize(self.http.post(url))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .map_err(|e| save_error(format!("upload gs://{}/{}: {}", bucket, key, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(save_error(format!(
                "upload gs://{}/{} returned {}: {}",
                bucket, key, status, detail
            )));
        }

        Ok(())
    }
}

/// History document stored in an object-storage bucket
pub struct ObjectStore {
    client: Box<dyn BlobClient>,
    bucket: String,
    key: String,
}

impl ObjectStore {
    pub fn new(settings: &ObjectStoreSettings, client: impl BlobClient + 'static) -> Self {
        Self {
            client: Box::new(client),
            bucket: settings.bucket.clone(),
            key: settings.object_key(),
        }
    }

    /// Store backed by Google Cloud Storage
    pub fn gcs(settings: &ObjectStoreSettings, timeout: Duration) -> DriftResult<Self> {
        let client = GcsClient::new(&settings.endpoint, settings.access_token.clone(), timeout)?;
        Ok(Self::new(settings, client))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Strict re-read used before merging: only "not found" counts as empty
    fn read_for_merge(&self) -> DriftResult<History> {
        let text = match self.client.get(&self.bucket, &self.key) {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(History::new()),
            Err(e) => {
                return Err(save_error(format!(
                    "re-reading {} before merge: {}",
                    self.location(),
                    e
                )))
            }
        };

        match History::from_json(&text) {
            Ok(history) => Ok(history),
            Err(parse_err) => {
                let aside = format!("{}.{}", self.key, corrupt_suffix());
                self.client
                    .put(&self.bucket, &aside, text, JSON_CONTENT_TYPE)?;
                warn!(
                    "Replacing unreadable history at {} ({}); previous document kept at gs://{}/{}",
                    self.location(),
                    parse_err,
                    self.bucket,
                    aside
                );
                Ok(History::new())
            }
        }
    }
}

impl SnapshotStore for ObjectStore {
    fn fetch(&self) -> DriftResult<Option<History>> {
        let Some(text) = self.client.get(&self.bucket, &self.key)? else {
            debug!("No history document at {} yet", self.location());
            return Ok(None);
        };

        History::from_json(&text)
            .map(Some)
            .map_err(|e| load_error(format!("corrupt document {}: {}", self.location(), e)))
    }

    fn save(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<()> {
        let mut history = self.read_for_merge()?;
        history.insert(checkpoint_id.clone(), snapshot.clone());

        let body = history
            .to_json()
            .map_err(|e| save_error(format!("serializing history: {}", e)))?;
        self.client
            .put(&self.bucket, &self.key, body, JSON_CONTENT_TYPE)?;

        info!(
            "Saved snapshot for {} to {}: {} columns, {} rows",
            checkpoint_id,
            self.location(),
            snapshot.column_count(),
            snapshot.row_count()
        );
        Ok(())
    }

    fn location(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::normalize_prefix;
    use crate::error::DriftError;
    use crate::snapshot::ColumnDescriptor;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory bucket with switchable failures
    #[derive(Clone, Default)]
    struct FakeBucket {
        objects: Arc<Mutex<HashMap<String, String>>>,
        fail_reads: Arc<Mutex<bool>>,
        fail_writes: Arc<Mutex<bool>>,
    }

    impl BlobClient for FakeBucket {
        fn get(&self, bucket: &str, key: &str) -> DriftResult<Option<String>> {
            if *self.fail_reads.lock().unwrap() {
                return Err(load_error("503 Service Unavailable"));
            }
            Ok(self.objects.lock().unwrap().get(&format!("{}/{}", bucket, key)).cloned())
        }

        fn put(&self, bucket: &str, key: &str, body: String, _content_type: &str) -> DriftResult<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(save_error("403 Forbidden"));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(format!("{}/{}", bucket, key), body);
            Ok(())
        }
    }

    fn settings() -> ObjectStoreSettings {
        ObjectStoreSettings {
            bucket: "pipeline-schemas".to_string(),
            prefix: normalize_prefix("/team/"),
            endpoint: "https://storage.googleapis.com".to_string(),
            access_token: None,
        }
    }

    fn snapshot(rows: u64) -> SchemaSnapshot {
        SchemaSnapshot::new(vec![ColumnDescriptor::new("user_id", "int64", 0)], rows).unwrap()
    }

    #[test]
    fn test_not_found_is_empty_history() {
        let store = ObjectStore::new(&settings(), FakeBucket::default());
        assert_eq!(store.key(), "team/schemas.json");
        assert!(store.fetch().unwrap().is_none());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_transient_read_failure_is_empty_history() {
        let bucket = FakeBucket::default();
        *bucket.fail_reads.lock().unwrap() = true;
        let store = ObjectStore::new(&settings(), bucket);

        assert!(matches!(store.fetch(), Err(DriftError::StoreLoad(_))));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_round_trip() {
        let bucket = FakeBucket::default();
        let store = ObjectStore::new(&settings(), bucket.clone());
        let id = CheckpointId::new("job:42");

        store.save(&id, &snapshot(3)).unwrap();
        store.save(&CheckpointId::new("job:43"), &snapshot(4)).unwrap();

        let history = store.load();
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(&id), Some(&snapshot(3)));
        assert!(bucket
            .objects
            .lock()
            .unwrap()
            .contains_key("pipeline-schemas/team/schemas.json"));
    }

    #[test]
    fn test_write_failure_is_raised() {
        let bucket = FakeBucket::default();
        *bucket.fail_writes.lock().unwrap() = true;
        let store = ObjectStore::new(&settings(), bucket);

        let result = store.save(&CheckpointId::new("job:42"), &snapshot(3));
        assert!(matches!(result, Err(DriftError::StoreSave(_))));
    }

    #[test]
    fn test_save_refuses_to_merge_after_failed_read() {
        let bucket = FakeBucket::default();
        let store = ObjectStore::new(&settings(), bucket.clone());
        store.save(&CheckpointId::new("other"), &snapshot(1)).unwrap();

        *bucket.fail_reads.lock().unwrap() = true;
        let result = store.save(&CheckpointId::new("job:42"), &snapshot(3));
        assert!(matches!(result, Err(DriftError::StoreSave(_))));

        *bucket.fail_reads.lock().unwrap() = false;
        assert!(store.load().get(&CheckpointId::new("other")).is_some());
    }

    #[test]
    fn test_corrupt_document_is_preserved() {
        let bucket = FakeBucket::default();
        bucket
            .objects
            .lock()
            .unwrap()
            .insert("pipeline-schemas/team/schemas.json".to_string(), "garbage".to_string());
        let store = ObjectStore::new(&settings(), bucket.clone());

        assert!(store.load().is_empty());
        store.save(&CheckpointId::new("job:42"), &snapshot(3)).unwrap();

        let objects = bucket.objects.lock().unwrap();
        assert!(objects
            .iter()
            .any(|(key, body)| key.contains("schemas.json.corrupt-") && body == "garbage"));
    }

    #[test]
    fn test_gcs_urls_encode_object_key() {
        let client = GcsClient::new("https://storage.googleapis.com", None, Duration::from_secs(1)).unwrap();
        let url = client.url(&["storage", "v1", "b", "bucket", "o", "team/schemas.json"]);
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bucket/o/team%2Fschemas.json"
        );
    }

    #[test]
    fn test_gcs_rejects_bad_endpoint() {
        let result = GcsClient::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(DriftError::Config(_))));
    }
}
