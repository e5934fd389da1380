use crate::realtime::ConnectionRegistry;
use crate::services::{BlobUploader, ContentService};
use content_model::RealtimeInfo;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ContentService>,
    pub registry: ConnectionRegistry,
    pub realtime: RealtimeInfo,
    pub uploader: Arc<dyn BlobUploader>,
    pub media_max_bytes: usize,
}
