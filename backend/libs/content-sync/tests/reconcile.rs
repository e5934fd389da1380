mod common;

use chrono::Duration;
use common::{chat, t0};
use content_model::{ChatMessage, Post, Reply};
use content_sync::{Merge, SyncEvent, Timeline};

fn ids(timeline: &Timeline<ChatMessage>) -> Vec<i64> {
    timeline.items().map(|m| m.id).collect()
}

fn contents(timeline: &Timeline<ChatMessage>) -> Vec<String> {
    timeline.items().map(|m| m.content.clone()).collect()
}

fn seeded() -> Timeline<ChatMessage> {
    let mut timeline = Timeline::new();
    timeline.apply(SyncEvent::Created(chat(1, "Steph", "dinner at 7?", 0)));
    timeline.apply(SyncEvent::Created(chat(2, "Kay", "yes", 30)));
    timeline
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            all.push(tail);
        }
    }
    all
}

#[test]
fn test_duplicate_created_event_renders_once() {
    let mut timeline = Timeline::new();
    let event = SyncEvent::Created(chat(5, "Steph", "hello", 0));

    assert_eq!(timeline.apply(event.clone()), Merge::Inserted);
    assert_eq!(timeline.apply(event), Merge::Ignored);
    assert_eq!(ids(&timeline), vec![5]);
}

#[test]
fn test_any_arrival_order_converges() {
    let mut edited = chat(1, "Steph", "dinner at 8", 0);
    edited.edit_count = 1;
    let events = vec![
        SyncEvent::Created(chat(1, "Steph", "dinner at 7", 0)),
        SyncEvent::Created(chat(2, "Kay", "ok", 10)),
        SyncEvent::Created(chat(3, "Kay", "wait", 20)),
        SyncEvent::Updated(edited.clone()),
        SyncEvent::Deleted(3),
        SyncEvent::Created(chat(1, "Steph", "dinner at 7", 0)),
    ];

    let orders = permutations(&events);
    assert_eq!(orders.len(), 720);

    let mut reference: Option<Timeline<ChatMessage>> = None;
    for order in orders {
        let mut timeline = Timeline::new();
        for event in order {
            timeline.apply(event);
        }
        assert_eq!(ids(&timeline), vec![1, 2]);
        assert_eq!(timeline.get(1), Some(&edited));
        match &reference {
            Some(expected) => assert_eq!(timeline.entries(), expected.entries()),
            None => reference = Some(timeline),
        }
    }
}

#[test]
fn test_failed_create_restores_pre_submit_state() {
    let mut timeline = seeded();
    let before = timeline.entries().to_vec();

    let pending = timeline.propose_create(chat(0, "Kay", "running late", 60), t0());
    assert_eq!(timeline.len(), 3);
    assert!(timeline.rollback(pending, "service unavailable: store down"));

    assert_eq!(timeline.entries(), before.as_slice());
    assert_eq!(timeline.pending_count(), 0);
    let notices = timeline.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "service unavailable: store down");
}

#[test]
fn test_event_before_confirm_adopts_provisional() {
    let mut timeline = seeded();
    let pending = timeline.propose_create(chat(0, "Kay", "running late", 60), t0());

    // The push arrives before the HTTP response, a few seconds off.
    let confirmed = chat(9, "Kay", "running late", 62);
    assert_eq!(
        timeline.apply(SyncEvent::Created(confirmed.clone())),
        Merge::Matched
    );
    assert_eq!(ids(&timeline), vec![1, 2, 9]);
    assert!(timeline.entries().iter().all(|e| !e.pending));

    assert!(timeline.confirm_create(pending, confirmed));
    assert_eq!(ids(&timeline), vec![1, 2, 9]);
}

#[test]
fn test_confirm_before_event_dedupes() {
    let mut timeline = seeded();
    let pending = timeline.propose_create(chat(0, "Kay", "running late", 60), t0());
    let confirmed = chat(9, "Kay", "running late", 62);

    assert!(timeline.confirm_create(pending, confirmed.clone()));
    assert_eq!(timeline.apply(SyncEvent::Created(confirmed)), Merge::Ignored);
    assert_eq!(ids(&timeline), vec![1, 2, 9]);
}

#[test]
fn test_both_race_orders_render_the_same() {
    let confirmed = chat(9, "Kay", "running late", 62);

    let mut event_first = seeded();
    let pending = event_first.propose_create(chat(0, "Kay", "running late", 60), t0());
    event_first.apply(SyncEvent::Created(confirmed.clone()));
    event_first.confirm_create(pending, confirmed.clone());

    let mut confirm_first = seeded();
    let pending = confirm_first.propose_create(chat(0, "Kay", "running late", 60), t0());
    confirm_first.confirm_create(pending, confirmed.clone());
    confirm_first.apply(SyncEvent::Created(confirmed));

    assert_eq!(event_first.entries(), confirm_first.entries());
}

#[test]
fn test_adopted_create_survives_failed_response() {
    let mut timeline = seeded();
    let pending = timeline.propose_create(chat(0, "Kay", "running late", 60), t0());
    timeline.apply(SyncEvent::Created(chat(9, "Kay", "running late", 61)));

    // The write committed but the response was lost.
    timeline.rollback(pending, "request timed out");
    assert_eq!(ids(&timeline), vec![1, 2, 9]);
}

#[test]
fn test_two_identical_provisionals_match_in_submission_order() {
    let mut timeline = Timeline::new();
    let first = timeline.propose_create(chat(0, "Kay", "ping", 0), t0());
    let second = timeline.propose_create(chat(0, "Kay", "ping", 1), t0());

    timeline.apply(SyncEvent::Created(chat(20, "Kay", "ping", 0)));
    assert_eq!(ids(&timeline), vec![20, -2]);

    timeline.confirm_create(first, chat(20, "Kay", "ping", 0));
    timeline.confirm_create(second, chat(21, "Kay", "ping", 1));
    assert_eq!(ids(&timeline), vec![20, 21]);
}

#[test]
fn test_failed_edit_restores_previous_content() {
    let mut timeline = seeded();
    let pending = timeline.propose_edit(2, "yes!!", t0()).unwrap();
    assert_eq!(contents(&timeline)[1], "yes!!");
    assert!(timeline.entries()[1].pending);

    timeline.rollback(pending, "edit-limit-reached");
    assert_eq!(contents(&timeline)[1], "yes");
    assert!(!timeline.entries()[1].pending);
    assert_eq!(timeline.take_notices()[0].message, "edit-limit-reached");
}

#[test]
fn test_rollback_does_not_clobber_server_update() {
    let mut timeline = seeded();
    let pending = timeline.propose_edit(2, "yes!!", t0()).unwrap();

    let mut admin_fix = chat(2, "Kay", "yes (fixed by admin)", 30);
    admin_fix.edit_count = 0;
    assert_eq!(
        timeline.apply(SyncEvent::Updated(admin_fix)),
        Merge::Replaced
    );

    timeline.rollback(pending, "edit-window-expired");
    assert_eq!(contents(&timeline)[1], "yes (fixed by admin)");
}

#[test]
fn test_failed_delete_restores_in_order() {
    let mut timeline = seeded();
    timeline.apply(SyncEvent::Created(chat(3, "Steph", "great", 60)));

    let pending = timeline.propose_delete(2, t0()).unwrap();
    assert_eq!(ids(&timeline), vec![1, 3]);

    timeline.rollback(pending, "delete-window-expired");
    assert_eq!(ids(&timeline), vec![1, 2, 3]);
}

#[test]
fn test_failed_delete_stays_gone_when_server_deleted() {
    let mut timeline = seeded();
    let pending = timeline.propose_delete(2, t0()).unwrap();

    timeline.apply(SyncEvent::Deleted(2));
    timeline.rollback(pending, "request timed out");
    assert_eq!(ids(&timeline), vec![1]);
}

#[test]
fn test_update_during_pending_delete_stays_hidden() {
    let mut timeline = seeded();
    let pending = timeline.propose_delete(2, t0()).unwrap();

    timeline.apply(SyncEvent::Updated(chat(2, "Kay", "yes, 7 works", 30)));
    assert_eq!(ids(&timeline), vec![1]);

    timeline.rollback(pending, "delete-window-expired");
    assert_eq!(contents(&timeline), vec!["dinner at 7?", "yes, 7 works"]);
}

#[test]
fn test_confirmed_delete_blocks_late_create() {
    let mut timeline = seeded();
    let pending = timeline.propose_delete(2, t0()).unwrap();
    assert!(timeline.confirm(pending));

    assert_eq!(
        timeline.apply(SyncEvent::Created(chat(2, "Kay", "yes", 30))),
        Merge::Ignored
    );
    assert_eq!(ids(&timeline), vec![1]);
}

#[test]
fn test_snapshot_drops_missing_items_inside_window_only() {
    let mut timeline = Timeline::new();
    for (id, offset) in [(1, 0), (2, 10), (3, 20), (4, 30)] {
        timeline.apply(SyncEvent::Created(chat(id, "Kay", "x", offset)));
    }
    timeline.propose_create(chat(0, "Kay", "unsent", 25), t0());

    // The server's recent window starts at id 2; id 3 was deleted.
    let summary = timeline.apply_snapshot(vec![
        chat(2, "Kay", "x", 10),
        chat(4, "Kay", "x", 30),
        chat(5, "Steph", "new", 40),
    ]);

    assert_eq!(summary.removed, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.replaced, 2);
    assert_eq!(ids(&timeline), vec![1, 2, -1, 4, 5]);
}

#[test]
fn test_snapshot_adopts_provisional_create() {
    let mut timeline = seeded();
    let pending = timeline.propose_create(chat(0, "Kay", "on my way", 90), t0());

    let summary = timeline.apply_snapshot(vec![
        chat(1, "Steph", "dinner at 7?", 0),
        chat(2, "Kay", "yes", 30),
        chat(3, "Kay", "on my way", 91),
    ]);
    assert_eq!(summary.matched, 1);
    assert_eq!(ids(&timeline), vec![1, 2, 3]);

    assert!(timeline.confirm_create(pending, chat(3, "Kay", "on my way", 91)));
    assert_eq!(ids(&timeline), vec![1, 2, 3]);
}

#[test]
fn test_empty_snapshot_clears_confirmed_entries() {
    let mut timeline = seeded();
    timeline.propose_create(chat(0, "Kay", "hello?", 60), t0());

    let summary = timeline.apply_snapshot(Vec::new());
    assert_eq!(summary.removed, 2);
    assert_eq!(timeline.len(), 1);
    assert!(timeline.entries()[0].pending);
}

#[test]
fn test_expired_requests_roll_back() {
    let mut timeline = seeded();
    timeline.propose_create(chat(0, "Kay", "stuck", 60), t0());
    timeline.propose_edit(1, "dinner at 6?", t0()).unwrap();

    let expired = timeline.expire_pending(t0() + Duration::seconds(10), Duration::seconds(10));
    assert_eq!(expired.len(), 2);
    assert_eq!(ids(&timeline), vec![1, 2]);
    assert_eq!(contents(&timeline)[0], "dinner at 7?");
    assert_eq!(timeline.take_notices().len(), 2);
}

#[test]
fn test_snapshot_keeps_provisional_replies() {
    let post = Post {
        id: 3,
        author: "Steph".to_string(),
        content: "first tomato!".to_string(),
        created_at: t0(),
        edit_count: 0,
        media: None,
        replies: Vec::new(),
    };
    let mut timeline = Timeline::new();
    timeline.apply(SyncEvent::Created(post.clone()));
    timeline.modify(3, |p| {
        p.replies.push(Reply {
            id: -1,
            post_id: 3,
            author: "Kay".to_string(),
            content: "salad time".to_string(),
            created_at: t0() + Duration::seconds(60),
            edit_count: 0,
        })
    });

    let summary = timeline.apply_snapshot(vec![post]);
    assert_eq!(summary.replaced, 1);
    let replies: Vec<i64> = timeline.get(3).unwrap().replies.iter().map(|r| r.id).collect();
    assert_eq!(replies, vec![-1]);
}
