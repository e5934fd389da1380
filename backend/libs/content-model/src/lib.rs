//! Shared content types for the Hearth household app
//!
//! Used by both the content service and its clients:
//! - `models`: Post, Reply and ChatMessage plus the `ContentItem` union
//! - `identity`: resolved member identity and the acting `Actor`
//! - `events`: realtime event envelope fanned out to subscribers
//! - `policy`: the edit/delete authorization table
//! - `validation`: draft shape and length checks
//!
//! Nothing in this crate performs I/O.
pub mod events;
pub mod identity;
pub mod models;
pub mod policy;
pub mod validation;

pub use events::{ContentEvent, DistributionMode, RealtimeInfo};
pub use identity::{Actor, Credential, Identity};
pub use models::{
    ChatMessage, ContentItem, ContentKind, Draft, ItemMeta, MediaKind, MediaRef, Post, Reply,
};
pub use policy::{authorize, delete_window, edit_window, Decision, DenyReason, Operation};
pub use validation::{validate_content, validate_draft, ValidationError};
