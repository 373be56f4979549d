//! # Content Store
//!
//! Typed CRUD over flat JSON collections. Every collection is one document in
//! a [`Backend`]; each call re-reads it, and every mutation rewrites it whole.
//!
//! Partial updates are shallow merges: the incoming JSON object's top-level
//! keys replace the record's keys, then the merged object is decoded back into
//! the record type. `id`, `createdAt` and `createdBy` cannot be overwritten.
//!
//! Mutations on one collection are serialized within this process. Another
//! process writing the same files is not coordinated: the last write wins.
//!
//! Backends are synchronous; every backend call runs on tokio's blocking pool
//! so file I/O never stalls the async workers.

pub mod backend;
pub mod blocks;
pub mod models;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
pub use backend::{Backend, FileBackend, MemoryBackend};
use models::{FormSubmission, Job, MediaItem, Page, SiteSettings, Theme, User};

/// Keys a partial can never set.
const PROTECTED_KEYS: &[&str] = &["id", "createdAt", "createdBy", "updatedAt", "updatedBy"];

/// A record kept in a collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Backing collection name.
    const COLLECTION: &'static str;
    /// Fields that must be present and non-blank.
    const REQUIRED: &'static [&'static str] = &[];
    /// Whether the record carries `createdAt/updatedAt/createdBy/updatedBy`.
    const STAMPED: bool = true;

    fn id(&self) -> &str;

    /// Field values used when a create omits them.
    fn defaults(now: DateTime<Utc>) -> Map<String, Value>;

    /// Checked (and normalized) after every create and update merge.
    fn validate(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// A record stored as a collection of one.
pub trait SingletonRecord:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    const NAME: &'static str;
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn merge_partial(fields: &mut Map<String, Value>, partial: Map<String, Value>) {
    for (key, value) in partial {
        if PROTECTED_KEYS.contains(&key.as_str()) {
            continue;
        }
        fields.insert(key, value);
    }
}

fn to_fields<T: Serialize>(collection: &str, record: &T) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::invalid(collection, "record is not a JSON object")),
        Err(source) => Err(StoreError::Serialization {
            collection: collection.to_string(),
            source,
        }),
    }
}

/// Run a backend call off the async workers.
async fn blocking<R, F>(collection: &str, op: F) -> StoreResult<R>
where
    R: Send + 'static,
    F: FnOnce() -> StoreResult<R> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::Io {
            collection: collection.to_string(),
            source: std::io::Error::other(e),
        })?
}

/// Decode merged request data; a type mismatch is the caller's fault.
fn from_fields<T: DeserializeOwned>(collection: &str, fields: Map<String, Value>) -> StoreResult<T> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| StoreError::invalid(collection, e.to_string()))
}

pub struct Collection<T> {
    backend: Arc<dyn Backend>,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Collection<T> {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    async fn read_all(&self) -> StoreResult<Vec<T>> {
        let backend = Arc::clone(&self.backend);
        let loaded = blocking(T::COLLECTION, move || backend.load(T::COLLECTION)).await?;
        match loaded {
            None => Ok(Vec::new()),
            Some(value) => {
                serde_json::from_value(value).map_err(|source| StoreError::Serialization {
                    collection: T::COLLECTION.to_string(),
                    source,
                })
            }
        }
    }

    async fn write_all(&self, records: &[T]) -> StoreResult<()> {
        let value = serde_json::to_value(records).map_err(|source| StoreError::Serialization {
            collection: T::COLLECTION.to_string(),
            source,
        })?;
        let backend = Arc::clone(&self.backend);
        blocking(T::COLLECTION, move || backend.save(T::COLLECTION, &value)).await
    }

    /// Every record, in insertion order.
    pub async fn list(&self) -> StoreResult<Vec<T>> {
        self.read_all().await
    }

    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        Ok(self.read_all().await?.into_iter().find(|r| r.id() == id))
    }

    /// First record matching `pred`.
    pub async fn find(&self, pred: impl Fn(&T) -> bool) -> StoreResult<Option<T>> {
        Ok(self.read_all().await?.into_iter().find(|r| pred(r)))
    }

    pub async fn create(&self, partial: Map<String, Value>, actor: Option<&str>) -> StoreResult<T> {
        for field in T::REQUIRED {
            if partial.get(*field).map_or(true, is_blank) {
                return Err(StoreError::MissingField((*field).to_string()));
            }
        }

        let now = Utc::now();
        let mut fields = T::defaults(now);
        merge_partial(&mut fields, partial);
        fields.insert("id".into(), Value::from(Uuid::now_v7().to_string()));
        if T::STAMPED {
            fields.insert("createdAt".into(), json!(now));
            fields.insert("updatedAt".into(), json!(now));
            fields.insert("createdBy".into(), json!(actor));
            fields.insert("updatedBy".into(), json!(actor));
        }

        let mut record: T = from_fields(T::COLLECTION, fields)?;
        record.validate()?;

        let _guard = self.lock().await;
        let mut records = self.read_all().await?;
        records.push(record.clone());
        self.write_all(&records).await?;

        tracing::info!(collection = T::COLLECTION, id = record.id(), "record created");
        Ok(record)
    }

    pub async fn update(
        &self,
        id: &str,
        partial: Map<String, Value>,
        actor: Option<&str>,
    ) -> StoreResult<T> {
        for field in T::REQUIRED {
            if partial.get(*field).is_some_and(is_blank) {
                return Err(StoreError::MissingField((*field).to_string()));
            }
        }

        self.modify_fields(id, actor, |fields| {
            merge_partial(fields, partial);
            Ok(())
        })
        .await
    }

    /// Apply a typed change to one record and persist it.
    pub async fn modify(
        &self,
        id: &str,
        actor: Option<&str>,
        change: impl FnOnce(&mut T) -> StoreResult<()>,
    ) -> StoreResult<T> {
        self.modify_fields(id, actor, |fields| {
            let mut record: T = from_fields(T::COLLECTION, std::mem::take(fields))?;
            change(&mut record)?;
            *fields = to_fields(T::COLLECTION, &record)?;
            Ok(())
        })
        .await
    }

    async fn modify_fields(
        &self,
        id: &str,
        actor: Option<&str>,
        change: impl FnOnce(&mut Map<String, Value>) -> StoreResult<()>,
    ) -> StoreResult<T> {
        let _guard = self.lock().await;
        let mut records = self.read_all().await?;
        let index = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id))?;

        let mut fields = to_fields(T::COLLECTION, &records[index])?;
        change(&mut fields)?;
        if T::STAMPED {
            fields.insert("updatedAt".into(), json!(Utc::now()));
            fields.insert("updatedBy".into(), json!(actor));
        }

        let mut updated: T = from_fields(T::COLLECTION, fields)?;
        updated.validate()?;
        records[index] = updated.clone();
        self.write_all(&records).await?;

        tracing::info!(collection = T::COLLECTION, id, "record updated");
        Ok(updated)
    }

    /// Remove a record; `false` when no record had this id.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.lock().await;
        let mut records = self.read_all().await?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records).await?;

        tracing::info!(collection = T::COLLECTION, id, "record deleted");
        Ok(true)
    }
}

impl Collection<Page> {
    /// Exact slug match; no trailing-slash or case folding.
    pub async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Page>> {
        self.find(|p| p.slug == slug).await
    }

    pub async fn list_published(&self) -> StoreResult<Vec<Page>> {
        Ok(self.list().await?.into_iter().filter(Page::is_published).collect())
    }
}

impl Collection<Job> {
    pub async fn list_visible(&self) -> StoreResult<Vec<Job>> {
        Ok(self.list().await?.into_iter().filter(|j| j.visible).collect())
    }
}

impl Collection<User> {
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.find(|u| u.email == email).await
    }
}

pub struct Singleton<T> {
    backend: Arc<dyn Backend>,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SingletonRecord> Singleton<T> {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// The stored record, or defaults when nothing was saved yet.
    pub async fn get(&self) -> StoreResult<T> {
        let backend = Arc::clone(&self.backend);
        match blocking(T::NAME, move || backend.load(T::NAME)).await? {
            None => Ok(T::default()),
            Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Serialization {
                collection: T::NAME.to_string(),
                source,
            }),
        }
    }

    pub async fn update(&self, partial: Map<String, Value>, actor: Option<&str>) -> StoreResult<T> {
        let _guard = self.write_lock.lock().await;
        let mut fields = to_fields(T::NAME, &self.get().await?)?;
        merge_partial(&mut fields, partial);
        fields.insert("updatedAt".into(), json!(Utc::now()));
        fields.insert("updatedBy".into(), json!(actor));

        let updated: T = from_fields(T::NAME, fields)?;
        let value = serde_json::to_value(&updated).map_err(|source| StoreError::Serialization {
            collection: T::NAME.to_string(),
            source,
        })?;
        let backend = Arc::clone(&self.backend);
        blocking(T::NAME, move || backend.save(T::NAME, &value)).await?;

        tracing::info!(collection = T::NAME, "singleton updated");
        Ok(updated)
    }
}

/// All CMS collections over one backend.
pub struct ContentStore {
    backend: Arc<dyn Backend>,
    pub pages: Collection<Page>,
    pub jobs: Collection<Job>,
    pub media: Collection<MediaItem>,
    pub forms: Collection<FormSubmission>,
    pub users: Collection<User>,
    pub settings: Singleton<SiteSettings>,
    pub theme: Singleton<Theme>,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            pages: Collection::new(backend.clone()),
            jobs: Collection::new(backend.clone()),
            media: Collection::new(backend.clone()),
            forms: Collection::new(backend.clone()),
            users: Collection::new(backend.clone()),
            settings: Singleton::new(backend.clone()),
            theme: Singleton::new(backend.clone()),
            backend,
        }
    }

    /// JSON files under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FileBackend::new(dir.as_ref())))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Readiness probe: the backing storage can be read.
    pub async fn ping(&self) -> StoreResult<()> {
        let backend = Arc::clone(&self.backend);
        blocking(SiteSettings::NAME, move || backend.load(SiteSettings::NAME))
            .await
            .map(|_| ())
    }
}
