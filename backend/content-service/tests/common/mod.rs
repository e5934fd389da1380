//! Shared fixtures for content-service integration tests
//!
//! A household of three members over the in-memory store, a clock the
//! test moves by hand, and a distributor that records what it was given.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use content_model::{
    ChatMessage, ContentEvent, ContentItem, ContentKind, Credential, DistributionMode, Draft,
    Identity, MediaKind, Post, Reply,
};
use hearth_content::clock::Clock;
use hearth_content::db::{ContentStore, EditGuard, MemoryContentStore, StoreError, UpdateOutcome};
use hearth_content::realtime::{DistributeError, Distributor};
use hearth_content::services::{
    AccessCode, BlobUploader, ContentService, StaticIdentityResolver, UploadError,
};
use std::sync::{Arc, Mutex};

pub const ACCESS_CODE: &str = "hearth";
pub const KAY_PHONE: &str = "555-0100";
pub const STEPH_PHONE: &str = "555-0101";
pub const ADMIN_PHONE: &str = "555-0199";

pub fn kay() -> Credential {
    Credential::new(KAY_PHONE, ACCESS_CODE)
}

pub fn steph() -> Credential {
    Credential::new(STEPH_PHONE, ACCESS_CODE)
}

pub fn admin() -> Credential {
    Credential::new(ADMIN_PHONE, ACCESS_CODE)
}

/// Clock the test advances explicitly.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Keeps every published event in order.
pub struct RecordingDistributor {
    mode: DistributionMode,
    events: Mutex<Vec<ContentEvent>>,
}

impl RecordingDistributor {
    pub fn new(mode: DistributionMode) -> Self {
        Self {
            mode,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<ContentEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.label()).collect()
    }
}

#[async_trait]
impl Distributor for RecordingDistributor {
    fn mode(&self) -> DistributionMode {
        self.mode
    }

    async fn publish(&self, event: &ContentEvent) -> Result<(), DistributeError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Stores nothing; hands back a predictable URL.
#[derive(Default)]
pub struct FakeUploader {
    uploads: Mutex<Vec<(MediaKind, usize)>>,
}

impl FakeUploader {
    pub fn uploads(&self) -> Vec<(MediaKind, usize)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobUploader for FakeUploader {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((kind, bytes.len()));
        Ok(format!("https://media.test/{}/{}", kind.as_str(), uploads.len()))
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub fn household_resolver() -> StaticIdentityResolver {
    StaticIdentityResolver::new(AccessCode::from_plain(ACCESS_CODE))
        .with_member(KAY_PHONE, Identity::member("Kay", "Daughter"))
        .with_member(STEPH_PHONE, Identity::member("Steph", "Mom"))
        .with_member(ADMIN_PHONE, Identity::admin("Dad"))
}

/// Memory store that yields to the scheduler after every read, so two
/// requests joined on one task both read before either writes.
pub struct InterleavingStore {
    inner: Arc<MemoryContentStore>,
}

#[async_trait]
impl ContentStore for InterleavingStore {
    async fn insert_post(
        &self,
        author: &str,
        draft: &Draft,
        created_at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        self.inner.insert_post(author, draft, created_at).await
    }

    async fn insert_reply(
        &self,
        post_id: i64,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Reply, StoreError> {
        self.inner
            .insert_reply(post_id, author, content, created_at)
            .await
    }

    async fn insert_chat(
        &self,
        author: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ChatMessage, StoreError> {
        self.inner.insert_chat(author, content, created_at).await
    }

    async fn find(&self, kind: ContentKind, id: i64) -> Result<Option<ContentItem>, StoreError> {
        let found = self.inner.find(kind, id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn update_content(
        &self,
        kind: ContentKind,
        id: i64,
        content: &str,
        guard: EditGuard,
    ) -> Result<UpdateOutcome, StoreError> {
        self.inner.update_content(kind, id, content, guard).await
    }

    async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool, StoreError> {
        self.inner.delete(kind, id).await
    }

    async fn list_recent(
        &self,
        kind: ContentKind,
        limit: i64,
    ) -> Result<Vec<ContentItem>, StoreError> {
        self.inner.list_recent(kind, limit).await
    }

    async fn list_replies(&self, post_id: i64) -> Result<Vec<Reply>, StoreError> {
        self.inner.list_replies(post_id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

pub struct Household {
    pub service: Arc<ContentService>,
    pub store: Arc<MemoryContentStore>,
    pub clock: Arc<ManualClock>,
    pub distributor: Arc<RecordingDistributor>,
}

impl Household {
    pub fn new() -> Self {
        Self::with_mode(DistributionMode::Push)
    }

    pub fn with_mode(mode: DistributionMode) -> Self {
        Self::build(mode, false)
    }

    /// Reads yield before returning; see [`InterleavingStore`].
    pub fn interleaved() -> Self {
        Self::build(DistributionMode::Push, true)
    }

    fn build(mode: DistributionMode, interleave: bool) -> Self {
        let store = Arc::new(MemoryContentStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let distributor = Arc::new(RecordingDistributor::new(mode));

        let service_store: Arc<dyn ContentStore> = if interleave {
            Arc::new(InterleavingStore {
                inner: store.clone(),
            })
        } else {
            store.clone()
        };

        let service = ContentService::new(
            service_store,
            Arc::new(household_resolver()),
            distributor.clone(),
            clock.clone(),
        );

        Self {
            service: Arc::new(service),
            store,
            clock,
            distributor,
        }
    }
}
