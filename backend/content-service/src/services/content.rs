/// Content service - the only writer to the content store
///
/// Every operation re-resolves the caller from its credential and, for
/// edits and deletes, re-reads the target right before authorizing, so a
/// stale client view can never widen what the caller is allowed to do.
use crate::clock::Clock;
use crate::db::{ContentStore, EditGuard, UpdateOutcome};
use crate::error::{AppError, Result};
use crate::metrics::content::record_mutation;
use crate::realtime::Distributor;
use crate::services::identity::IdentityResolver;
use content_model::{
    authorize, validate_content, validate_draft, Actor, ChatMessage, ContentEvent, ContentItem,
    ContentKind, Credential, Decision, DistributionMode, Draft, Identity, Operation, Post, Reply,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Bounds for recent-item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default: i64,
    pub max: i64,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default: 50,
            max: 200,
        }
    }
}

impl ListLimits {
    pub fn clamp(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.default).clamp(1, self.max.max(1))
    }
}

pub struct ContentService {
    store: Arc<dyn ContentStore>,
    identity: Arc<dyn IdentityResolver>,
    distributor: Arc<dyn Distributor>,
    clock: Arc<dyn Clock>,
    limits: ListLimits,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        identity: Arc<dyn IdentityResolver>,
        distributor: Arc<dyn Distributor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identity,
            distributor,
            clock,
            limits: ListLimits::default(),
        }
    }

    pub fn with_list_limits(mut self, limits: ListLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn distribution_mode(&self) -> DistributionMode {
        self.distributor.mode()
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Resolve a credential to the member it belongs to.
    pub async fn resolve(&self, credential: &Credential) -> Result<Identity> {
        Ok(self.identity.resolve(credential).await?)
    }

    /// Create a post
    pub async fn create_post(&self, credential: &Credential, draft: &Draft) -> Result<Post> {
        let result = self.create_post_inner(credential, draft).await;
        record(ContentKind::Post, Mutation::Create, &result);
        result
    }

    async fn create_post_inner(&self, credential: &Credential, draft: &Draft) -> Result<Post> {
        validate_draft(ContentKind::Post, draft)?;
        let identity = self.resolve(credential).await?;

        let post = self
            .store
            .insert_post(&identity.display_name, draft, self.clock.now())
            .await?;

        info!(post_id = post.id, author = %post.author, has_media = post.media.is_some(), "post created");
        self.distribute(ContentEvent::created(post.clone())).await;
        Ok(post)
    }

    /// Reply to a post. Fails with `NotFound` when the post is gone,
    /// including when it is deleted between the check and the insert.
    pub async fn create_reply(
        &self,
        credential: &Credential,
        post_id: i64,
        draft: &Draft,
    ) -> Result<Reply> {
        let result = self.create_reply_inner(credential, post_id, draft).await;
        record(ContentKind::Reply, Mutation::Create, &result);
        result
    }

    async fn create_reply_inner(
        &self,
        credential: &Credential,
        post_id: i64,
        draft: &Draft,
    ) -> Result<Reply> {
        validate_draft(ContentKind::Reply, draft)?;
        let identity = self.resolve(credential).await?;

        if self.store.find(ContentKind::Post, post_id).await?.is_none() {
            return Err(AppError::not_found(ContentKind::Post, post_id));
        }

        let reply = self
            .store
            .insert_reply(post_id, &identity.display_name, &draft.content, self.clock.now())
            .await?;

        info!(reply_id = reply.id, post_id, author = %reply.author, "reply created");
        self.distribute(ContentEvent::created(reply.clone())).await;
        Ok(reply)
    }

    /// Send a chat message
    pub async fn send_chat_message(
        &self,
        credential: &Credential,
        text: &str,
    ) -> Result<ChatMessage> {
        let result = self.send_chat_inner(credential, text).await;
        record(ContentKind::Chat, Mutation::Create, &result);
        result
    }

    async fn send_chat_inner(&self, credential: &Credential, text: &str) -> Result<ChatMessage> {
        validate_draft(ContentKind::Chat, &Draft::text(text))?;
        let identity = self.resolve(credential).await?;

        let message = self
            .store
            .insert_chat(&identity.display_name, text, self.clock.now())
            .await?;

        info!(message_id = message.id, author = %message.author, "chat message sent");
        self.distribute(ContentEvent::created(message.clone())).await;
        Ok(message)
    }

    /// Replace an item's text. Returns the updated item; posts come back
    /// with their replies.
    pub async fn edit_item(
        &self,
        credential: &Credential,
        kind: ContentKind,
        id: i64,
        content: &str,
    ) -> Result<ContentItem> {
        let result = self.edit_inner(credential, kind, id, content).await;
        record(kind, Mutation::Edit, &result);
        result
    }

    async fn edit_inner(
        &self,
        credential: &Credential,
        kind: ContentKind,
        id: i64,
        content: &str,
    ) -> Result<ContentItem> {
        validate_content(kind, content)?;
        let identity = self.resolve(credential).await?;
        let actor = Actor::from(&identity);

        let current = self.load(kind, id).await?;
        self.check(&actor, &current, Operation::Edit)?;

        let guard = if actor.is_admin {
            EditGuard::admin()
        } else {
            EditGuard::author(current.meta().edit_count)
        };

        let updated = match self.store.update_content(kind, id, content, guard).await? {
            UpdateOutcome::Updated(item) => item,
            UpdateOutcome::Missing => return Err(AppError::not_found(kind, id)),
            UpdateOutcome::Conflict => {
                // Another edit landed first; report what the fresh state says.
                let fresh = self.load(kind, id).await?;
                self.check(&actor, &fresh, Operation::Edit)?;
                warn!(kind = %kind, id, actor = %actor.identity, "edit lost a race");
                return Err(AppError::Conflict);
            }
        };
        let updated = self.with_replies(updated).await?;

        info!(kind = %kind, id, actor = %actor.identity, admin = actor.is_admin, edit_count = updated.meta().edit_count, "item edited");
        self.distribute(ContentEvent::updated(updated.clone())).await;
        Ok(updated)
    }

    /// Delete an item. A post takes its replies with it.
    pub async fn delete_item(
        &self,
        credential: &Credential,
        kind: ContentKind,
        id: i64,
    ) -> Result<()> {
        let result = self.delete_inner(credential, kind, id).await;
        record(kind, Mutation::Delete, &result);
        result
    }

    async fn delete_inner(&self, credential: &Credential, kind: ContentKind, id: i64) -> Result<()> {
        let identity = self.resolve(credential).await?;
        let actor = Actor::from(&identity);

        let current = self.load(kind, id).await?;
        self.check(&actor, &current, Operation::Delete)?;

        if !self.store.delete(kind, id).await? {
            return Err(AppError::not_found(kind, id));
        }

        info!(kind = %kind, id, actor = %actor.identity, admin = actor.is_admin, "item deleted");
        self.distribute(ContentEvent::deleted(&current)).await;
        Ok(())
    }

    /// Most recent items of `kind`, oldest first.
    pub async fn list_recent(
        &self,
        credential: &Credential,
        kind: ContentKind,
        limit: Option<i64>,
    ) -> Result<Vec<ContentItem>> {
        self.resolve(credential).await?;
        let limit = self.limits.clamp(limit);
        Ok(self.store.list_recent(kind, limit).await?)
    }

    /// Replies of a post, oldest first. A deleted post has none.
    pub async fn list_replies(&self, credential: &Credential, post_id: i64) -> Result<Vec<Reply>> {
        self.resolve(credential).await?;
        Ok(self.store.list_replies(post_id).await?)
    }

    async fn load(&self, kind: ContentKind, id: i64) -> Result<ContentItem> {
        self.store
            .find(kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(kind, id))
    }

    fn check(
        &self,
        actor: &Actor,
        item: &ContentItem,
        operation: Operation,
    ) -> Result<()> {
        match authorize(actor, &item.meta(), operation, self.clock.now()) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                info!(kind = %item.kind(), id = item.id(), actor = %actor.identity, operation = operation.as_str(), reason = %reason, "mutation denied");
                Err(AppError::Denied(reason))
            }
        }
    }

    async fn with_replies(&self, item: ContentItem) -> Result<ContentItem> {
        match item {
            ContentItem::Post(mut post) => {
                post.replies = self.store.list_replies(post.id).await?;
                Ok(ContentItem::Post(post))
            }
            other => Ok(other),
        }
    }

    async fn distribute(&self, event: ContentEvent) {
        if let Err(err) = self.distributor.publish(&event).await {
            warn!(error = %err, kind = %event.kind(), id = event.id(), event = event.label(), "failed to distribute content event");
        }
    }
}

/// Metric operation label; creation is not an authorizer operation.
#[derive(Debug, Clone, Copy)]
enum Mutation {
    Create,
    Edit,
    Delete,
}

impl Mutation {
    fn as_str(&self) -> &'static str {
        match self {
            Mutation::Create => "create",
            Mutation::Edit => "edit",
            Mutation::Delete => "delete",
        }
    }
}

fn record<T>(kind: ContentKind, operation: Mutation, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.outcome(),
    };
    record_mutation(kind.as_str(), operation.as_str(), outcome);
}
