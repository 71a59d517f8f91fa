//! Unit tests for the channel registry.

use std::collections::BTreeSet;

use herald_log::{latest_seq, query_log, LogFilter, NotificationRecord};
use herald_types::{ActorId, NotificationContent, MAX_NOTIF_SETTINGS_LEN};
use rusqlite::Connection;

use crate::*;

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().expect("failed to open in-memory db");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("failed to enable foreign keys");
    herald_db::run_migrations(&conn).expect("failed to run migrations");
    conn
}

fn actor(id: &str) -> ActorId {
    ActorId::new(id)
}

fn params(name: &str) -> ChannelParams {
    ChannelParams {
        name: name.to_string(),
        description: "desc".to_string(),
        icon_ref: "i".to_string(),
        badge_ref: "b".to_string(),
    }
}

fn content() -> NotificationContent {
    NotificationContent {
        title: "Hi".to_string(),
        action: "open".to_string(),
        body: "body".to_string(),
        image_ref: "img".to_string(),
    }
}

fn subscriber_set(conn: &Connection, index: u32) -> BTreeSet<ActorId> {
    subscribers_of(conn, index)
        .expect("subscribers_of failed")
        .into_iter()
        .collect()
}

/// Relation and subscriber set agree for every actor we know about.
fn assert_ledger_consistent(conn: &Connection, index: u32, known: &[&str]) {
    let set = subscriber_set(conn, index);
    for id in known {
        let a = actor(id);
        assert_eq!(
            is_subscribed(conn, index, &a).unwrap(),
            set.contains(&a),
            "relation and subscriber set disagree for {id}"
        );
    }
    assert_eq!(subscribers_count(conn, index).unwrap(), set.len() as u64);
}

// ── Channel store ───────────────────────────────────────────────────

#[test]
fn create_channel_assigns_dense_indices() {
    let conn = setup_db();
    let a = actor("alice");
    let b = actor("bob");

    assert_eq!(create_channel(&conn, &a, &params("one")).unwrap(), 0);
    assert_eq!(create_channel(&conn, &b, &params("two")).unwrap(), 1);
    assert_eq!(create_channel(&conn, &a, &params("one")).unwrap(), 2);

    let channels = all_channels(&conn).unwrap();
    let indices: Vec<u32> = channels.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(channels[1].admin, b);
    assert!(channels.iter().all(|c| c.subscribers.is_empty()));
}

#[test]
fn get_channel_returns_fields_and_subscribers() {
    let conn = setup_db();
    let admin = actor("admin");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    subscribe(&conn, &actor("u1"), index).unwrap();

    let channel = get_channel(&conn, index).unwrap();
    assert_eq!(channel.name, "news");
    assert_eq!(channel.description, "desc");
    assert_eq!(channel.icon_ref, "i");
    assert_eq!(channel.badge_ref, "b");
    assert_eq!(channel.admin, admin);
    assert_eq!(channel.subscribers, vec![actor("u1")]);
}

#[test]
fn get_channel_unknown_index() {
    let conn = setup_db();
    match get_channel(&conn, 0).unwrap_err() {
        ChannelError::NotFound(0) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn edit_channel_by_admin_overwrites_descriptive_fields() {
    let conn = setup_db();
    let admin = actor("admin");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    subscribe(&conn, &actor("u1"), index).unwrap();

    let updated = ChannelParams {
        name: "breaking".to_string(),
        description: "new desc".to_string(),
        icon_ref: "i2".to_string(),
        badge_ref: "b2".to_string(),
    };
    edit_channel(&conn, &admin, index, &updated).unwrap();

    let channel = get_channel(&conn, index).unwrap();
    assert_eq!(channel.name, "breaking");
    assert_eq!(channel.badge_ref, "b2");
    assert_eq!(channel.admin, admin, "admin is immutable");
    assert_eq!(channel.subscribers, vec![actor("u1")], "subscribers untouched");
}

#[test]
fn edit_channel_by_non_admin_is_rejected() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();

    let err = edit_channel(&conn, &actor("mallory"), index, &params("pwned")).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));

    let channel = get_channel(&conn, index).unwrap();
    assert_eq!(channel.name, "news");
    assert_eq!(channel.description, "desc");
}

#[test]
fn edit_channel_unknown_index() {
    let conn = setup_db();
    let err = edit_channel(&conn, &actor("admin"), 3, &params("x")).unwrap_err();
    assert!(matches!(err, ChannelError::NotFound(3)));
}

// ── Subscription ledger ─────────────────────────────────────────────

#[test]
fn subscribe_then_unsubscribe_restores_membership() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    subscribe(&conn, &actor("a"), index).unwrap();
    subscribe(&conn, &actor("b"), index).unwrap();
    let before = subscriber_set(&conn, index);

    subscribe(&conn, &actor("c"), index).unwrap();
    unsubscribe(&conn, &actor("c"), index).unwrap();

    assert_eq!(subscriber_set(&conn, index), before);
    assert_ledger_consistent(&conn, index, &["a", "b", "c"]);
}

#[test]
fn double_subscribe_fails() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    subscribe(&conn, &actor("a"), index).unwrap();

    let err = subscribe(&conn, &actor("a"), index).unwrap_err();
    assert!(matches!(err, ChannelError::AlreadySubscribed(0)));
    assert_eq!(subscribers_count(&conn, index).unwrap(), 1);
}

#[test]
fn unsubscribe_without_subscription_fails() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();

    let err = unsubscribe(&conn, &actor("a"), index).unwrap_err();
    assert!(matches!(err, ChannelError::NotSubscribed(0)));

    subscribe(&conn, &actor("a"), index).unwrap();
    unsubscribe(&conn, &actor("a"), index).unwrap();
    let err = unsubscribe(&conn, &actor("a"), index).unwrap_err();
    assert!(matches!(err, ChannelError::NotSubscribed(0)));
}

#[test]
fn resubscribe_after_unsubscribe_succeeds() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    let a = actor("a");

    subscribe(&conn, &a, index).unwrap();
    unsubscribe(&conn, &a, index).unwrap();
    subscribe(&conn, &a, index).unwrap();

    assert!(is_subscribed(&conn, index, &a).unwrap());
    assert_eq!(subscribers_count(&conn, index).unwrap(), 1);
}

#[test]
fn removing_a_middle_subscriber_keeps_the_rest() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    for id in ["a", "b", "c", "d"] {
        subscribe(&conn, &actor(id), index).unwrap();
    }

    unsubscribe(&conn, &actor("b"), index).unwrap();

    let expected: BTreeSet<ActorId> = ["a", "c", "d"].into_iter().map(actor).collect();
    assert_eq!(subscriber_set(&conn, index), expected);
    assert_ledger_consistent(&conn, index, &["a", "b", "c", "d"]);
}

#[test]
fn subscription_ops_on_unknown_channel() {
    let conn = setup_db();
    assert!(matches!(
        subscribe(&conn, &actor("a"), 0),
        Err(ChannelError::NotFound(0))
    ));
    assert!(matches!(
        unsubscribe(&conn, &actor("a"), 0),
        Err(ChannelError::NotFound(0))
    ));
    assert!(matches!(subscribers_of(&conn, 0), Err(ChannelError::NotFound(0))));
    assert!(matches!(subscribers_count(&conn, 0), Err(ChannelError::NotFound(0))));
}

#[test]
fn subscriptions_of_lists_channels_per_actor() {
    let conn = setup_db();
    let admin = actor("admin");
    for name in ["a", "b", "c"] {
        create_channel(&conn, &admin, &params(name)).unwrap();
    }
    let u = actor("u");
    subscribe(&conn, &u, 2).unwrap();
    subscribe(&conn, &u, 0).unwrap();
    subscribe(&conn, &u, 1).unwrap();
    unsubscribe(&conn, &u, 1).unwrap();

    assert_eq!(subscriptions_of(&conn, &u).unwrap(), vec![0, 2]);
    assert!(subscriptions_of(&conn, &actor("nobody")).unwrap().is_empty());
}

// ── Push-access ledger ──────────────────────────────────────────────

#[test]
fn set_push_access_by_admin_is_idempotent() {
    let conn = setup_db();
    let admin = actor("admin");
    let v = actor("v");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();

    assert!(!has_push_access(&conn, index, &v).unwrap());
    set_push_access(&conn, &admin, index, &v, true).unwrap();
    set_push_access(&conn, &admin, index, &v, true).unwrap();
    assert!(has_push_access(&conn, index, &v).unwrap());

    set_push_access(&conn, &admin, index, &v, false).unwrap();
    set_push_access(&conn, &admin, index, &v, false).unwrap();
    assert!(!has_push_access(&conn, index, &v).unwrap());
}

#[test]
fn set_push_access_by_non_admin_leaves_grant_unchanged() {
    let conn = setup_db();
    let admin = actor("admin");
    let v = actor("v");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    set_push_access(&conn, &admin, index, &v, true).unwrap();

    // A grantee cannot revoke or re-grant, not even for itself.
    let err = set_push_access(&conn, &v, index, &v, false).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));
    assert!(has_push_access(&conn, index, &v).unwrap());

    let err = set_push_access(&conn, &actor("m"), index, &actor("m"), true).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));
    assert!(!has_push_access(&conn, index, &actor("m")).unwrap());
}

#[test]
fn push_access_is_scoped_per_channel() {
    let conn = setup_db();
    let admin = actor("admin");
    let v = actor("v");
    let first = create_channel(&conn, &admin, &params("one")).unwrap();
    let second = create_channel(&conn, &admin, &params("two")).unwrap();

    set_push_access(&conn, &admin, first, &v, true).unwrap();
    assert!(has_push_access(&conn, first, &v).unwrap());
    assert!(!has_push_access(&conn, second, &v).unwrap());
}

#[test]
fn is_admin_predicate() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    assert!(is_admin(&conn, index, &actor("admin")).unwrap());
    assert!(!is_admin(&conn, index, &actor("other")).unwrap());
    assert!(matches!(
        is_admin(&conn, 5, &actor("admin")),
        Err(ChannelError::NotFound(5))
    ));
}

// ── Public key registry ─────────────────────────────────────────────

#[test]
fn public_key_absent_then_set_then_overwritten() {
    let conn = setup_db();
    let a = actor("a");

    assert_eq!(get_public_key(&conn, &a).unwrap(), None);
    set_public_key(&conn, &a, "pk-1").unwrap();
    assert_eq!(get_public_key(&conn, &a).unwrap().as_deref(), Some("pk-1"));
    set_public_key(&conn, &a, "pk-2").unwrap();
    assert_eq!(get_public_key(&conn, &a).unwrap().as_deref(), Some("pk-2"));

    assert_eq!(get_public_key(&conn, &actor("b")).unwrap(), None);
}

#[test]
fn public_key_is_not_validated() {
    let conn = setup_db();
    set_public_key(&conn, &actor("a"), "").unwrap();
    assert_eq!(get_public_key(&conn, &actor("a")).unwrap().as_deref(), Some(""));
}

// ── Notification settings ───────────────────────────────────────────

#[test]
fn settings_require_subscription() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    let u = actor("u");

    let err = set_notification_settings(&conn, &u, index, 1, "mute").unwrap_err();
    assert!(matches!(err, ChannelError::NotSubscribed(0)));
    assert_eq!(get_notification_settings(&conn, index, &u).unwrap(), None);

    subscribe(&conn, &u, index).unwrap();
    let stored = set_notification_settings(&conn, &u, index, 7, "mute").unwrap();
    assert_eq!(stored, "7+mute");
    set_notification_settings(&conn, &u, index, 8, "loud").unwrap();
    assert_eq!(
        get_notification_settings(&conn, index, &u).unwrap().as_deref(),
        Some("8+loud")
    );
}

#[test]
fn settings_length_is_bounded() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();
    let u = actor("u");
    subscribe(&conn, &u, index).unwrap();

    let at_limit = "x".repeat(MAX_NOTIF_SETTINGS_LEN);
    set_notification_settings(&conn, &u, index, 1, &at_limit).unwrap();

    let too_long = "x".repeat(MAX_NOTIF_SETTINGS_LEN + 1);
    let err = set_notification_settings(&conn, &u, index, 1, &too_long).unwrap_err();
    assert!(matches!(err, ChannelError::InvalidArgument(_)));
}

// ── Dispatcher ──────────────────────────────────────────────────────

#[test]
fn notify_one_logs_targeted_record_unchanged() {
    let conn = setup_db();
    let admin = actor("admin");
    let u = actor("u");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    subscribe(&conn, &u, index).unwrap();

    let entry = notify_one(&conn, &admin, &u, index, &content(), false).unwrap();
    assert_eq!(entry.seq, 1);
    assert_eq!(
        entry.record,
        NotificationRecord::Targeted {
            channel: index,
            sender: admin.clone(),
            recipient: u.clone(),
            is_private: false,
            content: content(),
        }
    );

    let logged = query_log(&conn, &LogFilter::default()).unwrap();
    assert_eq!(logged, vec![entry]);
}

#[test]
fn private_notifications_are_admin_only() {
    let conn = setup_db();
    let admin = actor("admin");
    let u = actor("u");
    let v = actor("v");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    subscribe(&conn, &u, index).unwrap();
    set_push_access(&conn, &admin, index, &v, true).unwrap();

    let err = notify_one(&conn, &v, &u, index, &content(), true).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));
    assert_eq!(latest_seq(&conn).unwrap(), 0, "rejected send must not log");

    let entry = notify_one(&conn, &admin, &u, index, &content(), true).unwrap();
    assert!(entry.record.is_private());
}

#[test]
fn public_notify_requires_admin_or_grant() {
    let conn = setup_db();
    let admin = actor("admin");
    let u = actor("u");
    let v = actor("v");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    subscribe(&conn, &u, index).unwrap();

    // Being a subscriber does not confer sending rights.
    let err = notify_one(&conn, &u, &u, index, &content(), false).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));
    let err = notify_one(&conn, &v, &u, index, &content(), false).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));

    set_push_access(&conn, &admin, index, &v, true).unwrap();
    notify_one(&conn, &v, &u, index, &content(), false).unwrap();

    set_push_access(&conn, &admin, index, &v, false).unwrap();
    let err = notify_one(&conn, &v, &u, index, &content(), false).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));

    assert_eq!(latest_seq(&conn).unwrap(), 1);
}

#[test]
fn notify_one_to_non_subscriber_fails_for_every_sender() {
    let conn = setup_db();
    let admin = actor("admin");
    let v = actor("v");
    let outsider = actor("outsider");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();
    set_push_access(&conn, &admin, index, &v, true).unwrap();

    for (sender, is_private) in [(&admin, false), (&admin, true), (&v, false)] {
        let err = notify_one(&conn, sender, &outsider, index, &content(), is_private).unwrap_err();
        match err {
            ChannelError::RecipientNotSubscribed { recipient, channel } => {
                assert_eq!(recipient, outsider);
                assert_eq!(channel, index);
            }
            other => panic!("expected RecipientNotSubscribed, got {other:?}"),
        }
    }

    // The admin is not implicitly a subscriber of its own channel.
    let err = notify_one(&conn, &admin, &admin, index, &content(), false).unwrap_err();
    assert!(matches!(err, ChannelError::RecipientNotSubscribed { .. }));
    assert_eq!(latest_seq(&conn).unwrap(), 0);
}

#[test]
fn unauthorized_is_reported_before_recipient_check() {
    let conn = setup_db();
    let index = create_channel(&conn, &actor("admin"), &params("news")).unwrap();

    let err = notify_one(&conn, &actor("m"), &actor("nobody"), index, &content(), false)
        .unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));
}

#[test]
fn notify_all_requires_admin_or_grant() {
    let conn = setup_db();
    let admin = actor("admin");
    let v = actor("v");
    let index = create_channel(&conn, &admin, &params("news")).unwrap();

    // Broadcasting to an empty channel is still a valid declaration.
    let entry = notify_all(&conn, &admin, index, &content()).unwrap();
    assert!(matches!(entry.record, NotificationRecord::Broadcast { .. }));
    assert!(!entry.record.is_private());

    let err = notify_all(&conn, &v, index, &content()).unwrap_err();
    assert!(matches!(err, ChannelError::Unauthorized { .. }));

    set_push_access(&conn, &admin, index, &v, true).unwrap();
    let entry = notify_all(&conn, &v, index, &content()).unwrap();
    assert_eq!(entry.record.sender(), &v);
    assert_eq!(latest_seq(&conn).unwrap(), 2);
}

#[test]
fn dispatch_on_unknown_channel() {
    let conn = setup_db();
    let a = actor("a");
    assert!(matches!(
        notify_one(&conn, &a, &a, 0, &content(), false),
        Err(ChannelError::NotFound(0))
    ));
    assert!(matches!(
        notify_all(&conn, &a, 0, &content()),
        Err(ChannelError::NotFound(0))
    ));
    assert_eq!(latest_seq(&conn).unwrap(), 0);
}

fn event_types(conn: &Connection) -> Vec<String> {
    registry_events(conn, &RegistryEventFilter::default())
        .expect("registry_events failed")
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

#[test]
fn state_changes_each_record_one_registry_event() {
    let conn = setup_db();
    let (a, u, v) = (actor("a"), actor("u"), actor("v"));
    let index = create_channel(&conn, &a, &params("news")).unwrap();
    edit_channel(&conn, &a, index, &params("renamed")).unwrap();
    subscribe(&conn, &u, index).unwrap();
    set_notification_settings(&conn, &u, index, 3, "quiet").unwrap();
    set_push_access(&conn, &a, index, &v, true).unwrap();
    set_push_access(&conn, &a, index, &v, false).unwrap();
    unsubscribe(&conn, &u, index).unwrap();

    assert_eq!(
        event_types(&conn),
        [
            "CHANNEL_CREATED",
            "CHANNEL_EDITED",
            "SUBSCRIBED",
            "NOTIFICATION_SETTINGS_UPDATED",
            "PUSH_ACCESS_GRANTED",
            "PUSH_ACCESS_REVOKED",
            "UNSUBSCRIBED",
        ]
    );

    let entries = registry_events(&conn, &RegistryEventFilter::default()).unwrap();
    assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(
        entries[3].payload,
        RegistryEvent::NotificationSettingsUpdated {
            actor: u.clone(),
            notif_id: 3,
            settings: "3+quiet".to_string(),
        }
    );
    assert_eq!(
        entries[4].payload,
        RegistryEvent::PushAccessGranted {
            actor: v,
            granted_by: a,
        }
    );

    // The registry feed never reaches the broadcast log.
    assert_eq!(latest_seq(&conn).unwrap(), 0);
}

#[test]
fn failed_operations_record_no_registry_event() {
    let conn = setup_db();
    let (a, m, u) = (actor("a"), actor("m"), actor("u"));
    let index = create_channel(&conn, &a, &params("news")).unwrap();
    subscribe(&conn, &u, index).unwrap();
    let before = event_types(&conn).len();

    assert!(subscribe(&conn, &u, index).is_err());
    assert!(unsubscribe(&conn, &m, index).is_err());
    assert!(edit_channel(&conn, &m, index, &params("hijack")).is_err());
    assert!(set_push_access(&conn, &m, index, &m, true).is_err());
    assert!(set_notification_settings(&conn, &m, index, 1, "x").is_err());
    assert!(subscribe(&conn, &u, 9).is_err());

    assert_eq!(event_types(&conn).len(), before);
}

#[test]
fn notifications_do_not_produce_registry_events() {
    let conn = setup_db();
    let (a, u) = (actor("a"), actor("u"));
    let index = create_channel(&conn, &a, &params("news")).unwrap();
    subscribe(&conn, &u, index).unwrap();
    let before = event_types(&conn).len();

    notify_one(&conn, &a, &u, index, &content(), false).unwrap();
    notify_all(&conn, &a, index, &content()).unwrap();

    assert_eq!(event_types(&conn).len(), before);
    assert_eq!(latest_seq(&conn).unwrap(), 2);
}

#[test]
fn registry_events_filter_by_cursor_channel_and_actor() {
    let conn = setup_db();
    let (a, u, w) = (actor("a"), actor("u"), actor("w"));
    let zero = create_channel(&conn, &a, &params("zero")).unwrap();
    let one = create_channel(&conn, &a, &params("one")).unwrap();
    subscribe(&conn, &u, zero).unwrap();
    subscribe(&conn, &w, one).unwrap();

    let on_one = registry_events(
        &conn,
        &RegistryEventFilter {
            channel: Some(one),
            ..RegistryEventFilter::default()
        },
    )
    .unwrap();
    assert_eq!(on_one.len(), 2);
    assert!(on_one.iter().all(|e| e.channel_index == one));

    let about_u = registry_events(
        &conn,
        &RegistryEventFilter {
            actor: Some(u.clone()),
            ..RegistryEventFilter::default()
        },
    )
    .unwrap();
    assert_eq!(about_u.len(), 1);
    assert_eq!(about_u[0].payload, RegistryEvent::Subscribed { actor: u });

    let page = registry_events(
        &conn,
        &RegistryEventFilter {
            after_seq: Some(2),
            limit: Some(1),
            ..RegistryEventFilter::default()
        },
    )
    .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].seq, 3);
    assert_eq!(page[0].event_type, "SUBSCRIBED");
}
