//! Content service behavior over the in-memory store
//!
//! Run with: cargo test -p hearth-content --test content_service

mod common;

use chrono::Duration;
use common::{admin, kay, steph, Household};
use content_model::{
    ContentEvent, ContentItem, ContentKind, Credential, DenyReason, DistributionMode, Draft,
    MediaKind, MediaRef, ValidationError,
};
use hearth_content::db::ContentStore;
use hearth_content::services::ListLimits;
use hearth_content::AppError;

fn denied(result: Result<impl std::fmt::Debug, AppError>) -> DenyReason {
    match result {
        Err(AppError::Denied(reason)) => reason,
        other => panic!("expected Denied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_household_post_lifecycle() {
    let household = Household::new();
    let service = &household.service;

    let post = service
        .create_post(&kay(), &Draft::text("Dinner at six"))
        .await
        .unwrap();
    assert_eq!(post.author, "Kay");
    assert_eq!(post.edit_count, 0);

    service
        .create_reply(&steph(), post.id, &Draft::text("I'll bring salad"))
        .await
        .unwrap();

    household.clock.advance(Duration::minutes(9));
    let reason = denied(
        service
            .delete_item(&steph(), ContentKind::Post, post.id)
            .await,
    );
    assert_eq!(reason, DenyReason::Unauthorized);

    household.clock.advance(Duration::minutes(5));
    let edited = service
        .edit_item(&kay(), ContentKind::Post, post.id, "Dinner at seven")
        .await
        .unwrap();
    match &edited {
        ContentItem::Post(p) => {
            assert_eq!(p.content, "Dinner at seven");
            assert_eq!(p.edit_count, 1);
            assert_eq!(p.replies.len(), 1);
        }
        other => panic!("expected a post, got {:?}", other),
    }

    household.clock.advance(Duration::seconds(30));
    let reason = denied(
        service
            .edit_item(&kay(), ContentKind::Post, post.id, "Dinner at eight")
            .await,
    );
    assert_eq!(reason, DenyReason::EditLimitReached);

    household.clock.advance(Duration::minutes(45) + Duration::seconds(30));
    service
        .delete_item(&admin(), ContentKind::Post, post.id)
        .await
        .unwrap();

    let replies = service.list_replies(&steph(), post.id).await.unwrap();
    assert!(replies.is_empty());
    assert!(household
        .store
        .find(ContentKind::Post, post.id)
        .await
        .unwrap()
        .is_none());

    assert_eq!(
        household.distributor.labels(),
        vec!["created", "created", "updated", "deleted"]
    );
}

#[tokio::test]
async fn test_window_boundaries_deny_at_exact_expiry() {
    let household = Household::new();
    let service = &household.service;

    let message = service.send_chat_message(&kay(), "brb").await.unwrap();
    let other = service.send_chat_message(&kay(), "back").await.unwrap();

    household.clock.advance(Duration::minutes(10));
    let reason = denied(
        service
            .delete_item(&kay(), ContentKind::Chat, message.id)
            .await,
    );
    assert_eq!(reason, DenyReason::DeleteWindowExpired);

    // Still inside the edit window.
    service
        .edit_item(&kay(), ContentKind::Chat, other.id, "back now")
        .await
        .unwrap();

    household.clock.advance(Duration::minutes(5));
    let reason = denied(
        service
            .edit_item(&kay(), ContentKind::Chat, message.id, "brb!")
            .await,
    );
    assert_eq!(reason, DenyReason::EditWindowExpired);
}

#[tokio::test]
async fn test_edit_limit_reported_before_expired_window() {
    let household = Household::new();
    let service = &household.service;

    let post = service
        .create_post(&kay(), &Draft::text("first"))
        .await
        .unwrap();
    service
        .edit_item(&kay(), ContentKind::Post, post.id, "second")
        .await
        .unwrap();

    household.clock.advance(Duration::hours(2));
    let reason = denied(
        service
            .edit_item(&kay(), ContentKind::Post, post.id, "third")
            .await,
    );
    assert_eq!(reason, DenyReason::EditLimitReached);
}

#[tokio::test]
async fn test_racing_author_edits_spend_one_allowance() {
    let household = Household::interleaved();
    let service = &household.service;

    let message = service.send_chat_message(&kay(), "at the store").await.unwrap();

    let (kay_first, kay_second) = (kay(), kay());
    let (first, second) = tokio::join!(
        service.edit_item(&kay_first, ContentKind::Chat, message.id, "at the store, need milk?"),
        service.edit_item(&kay_second, ContentKind::Chat, message.id, "leaving the store"),
    );

    let edited = first.unwrap();
    assert_eq!(edited.content(), "at the store, need milk?");
    assert_eq!(denied(second), DenyReason::EditLimitReached);

    let stored = household
        .store
        .find(ContentKind::Chat, message.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.meta().edit_count, 1);
    assert_eq!(stored.content(), "at the store, need milk?");
    assert_eq!(household.distributor.labels(), vec!["created", "updated"]);
}

#[tokio::test]
async fn test_admin_bypasses_rules_without_counting_edits() {
    let household = Household::new();
    let service = &household.service;

    let reply_parent = service
        .create_post(&steph(), &Draft::text("Who took the car?"))
        .await
        .unwrap();
    let reply = service
        .create_reply(&kay(), reply_parent.id, &Draft::text("me"))
        .await
        .unwrap();

    household.clock.advance(Duration::days(3));
    let edited = service
        .edit_item(&admin(), ContentKind::Reply, reply.id, "me, sorry")
        .await
        .unwrap();
    assert_eq!(edited.meta().edit_count, 0);
    assert_eq!(edited.content(), "me, sorry");

    // Admin edits leave the author's allowance alone; only the window stops Kay.
    let reason = denied(
        service
            .edit_item(&kay(), ContentKind::Reply, reply.id, "me again")
            .await,
    );
    assert_eq!(reason, DenyReason::EditWindowExpired);

    service
        .delete_item(&admin(), ContentKind::Reply, reply.id)
        .await
        .unwrap();
    assert!(service
        .list_replies(&steph(), reply_parent.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_reply_to_missing_post_is_not_found() {
    let household = Household::new();

    let result = household
        .service
        .create_reply(&kay(), 42, &Draft::text("hello?"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(household.distributor.events().is_empty());
}

#[tokio::test]
async fn test_missing_item_is_not_found_for_edit_and_delete() {
    let household = Household::new();
    let service = &household.service;

    assert!(matches!(
        service.edit_item(&admin(), ContentKind::Chat, 7, "x").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_item(&admin(), ContentKind::Post, 7).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_validation_runs_before_identity() {
    let household = Household::new();
    let service = &household.service;
    let stranger = Credential::new("555-0000", "hearth");

    assert!(matches!(
        service.create_post(&stranger, &Draft::text("   ")).await,
        Err(AppError::Validation(ValidationError::Empty))
    ));
    assert!(matches!(
        service.create_post(&stranger, &Draft::text("hi")).await,
        Err(AppError::Unauthenticated)
    ));

    let too_long = "x".repeat(251);
    assert!(matches!(
        service.create_post(&kay(), &Draft::text(too_long)).await,
        Err(AppError::Validation(ValidationError::TooLong { limit: 250, .. }))
    ));

    let photo_reply = Draft {
        content: String::new(),
        media: Some(MediaRef {
            url: "https://media.test/image/1".to_string(),
            kind: MediaKind::Image,
        }),
    };
    assert!(matches!(
        service.create_reply(&kay(), 1, &photo_reply).await,
        Err(AppError::Validation(ValidationError::MediaNotAllowed))
    ));

    // A photo post needs no caption.
    let post = service.create_post(&kay(), &photo_reply).await.unwrap();
    assert_eq!(post.media.map(|m| m.kind), Some(MediaKind::Image));
}

#[tokio::test]
async fn test_wrong_access_code_is_rejected() {
    let household = Household::new();

    let result = household
        .service
        .send_chat_message(&Credential::new(common::KAY_PHONE, "guess"), "hi")
        .await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_recent_listing_is_oldest_first_and_clamped() {
    let household = Household::new();
    let service = &household.service;

    for n in 0..5 {
        service
            .send_chat_message(&kay(), &format!("message {}", n))
            .await
            .unwrap();
        household.clock.advance(Duration::seconds(1));
    }

    let recent = service
        .list_recent(&steph(), ContentKind::Chat, Some(3))
        .await
        .unwrap();
    let contents: Vec<&str> = recent.iter().map(|item| item.content()).collect();
    assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);

    let clamped = service
        .list_recent(&steph(), ContentKind::Chat, Some(0))
        .await
        .unwrap();
    assert_eq!(clamped.len(), 1);
}

#[test]
fn test_list_limits_clamp() {
    let limits = ListLimits {
        default: 20,
        max: 100,
    };
    assert_eq!(limits.clamp(None), 20);
    assert_eq!(limits.clamp(Some(500)), 100);
    assert_eq!(limits.clamp(Some(-3)), 1);
}

#[tokio::test]
async fn test_recent_posts_carry_their_replies() {
    let household = Household::new();
    let service = &household.service;

    let post = service
        .create_post(&steph(), &Draft::text("Trip photos soon"))
        .await
        .unwrap();
    service
        .create_reply(&kay(), post.id, &Draft::text("yay"))
        .await
        .unwrap();

    let recent = service
        .list_recent(&kay(), ContentKind::Post, None)
        .await
        .unwrap();
    match recent.as_slice() {
        [ContentItem::Post(p)] => {
            assert_eq!(p.replies.len(), 1);
            assert_eq!(p.replies[0].author, "Kay");
        }
        other => panic!("unexpected listing {:?}", other),
    }
}

#[tokio::test]
async fn test_store_outage_surfaces_as_unavailable() {
    let household = Household::new();
    household.store.set_offline(true);

    let result = household
        .service
        .create_post(&kay(), &Draft::text("anyone home?"))
        .await;
    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    assert!(household.distributor.events().is_empty());

    household.store.set_offline(false);
    household
        .service
        .create_post(&kay(), &Draft::text("anyone home?"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_events_describe_the_change() {
    let household = Household::with_mode(DistributionMode::Poll);
    let service = &household.service;
    assert_eq!(service.distribution_mode(), DistributionMode::Poll);

    let post = service
        .create_post(&kay(), &Draft::text("hello"))
        .await
        .unwrap();
    let reply = service
        .create_reply(&steph(), post.id, &Draft::text("hi"))
        .await
        .unwrap();
    service
        .delete_item(&steph(), ContentKind::Reply, reply.id)
        .await
        .unwrap();

    let events = household.distributor.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ContentEvent::Created { item } if item.id() == post.id));
    assert_eq!(
        events[2],
        ContentEvent::Deleted {
            kind: ContentKind::Reply,
            id: reply.id,
            post_id: Some(post.id),
        }
    );
}
