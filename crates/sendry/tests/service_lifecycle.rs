// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end exercise of a running service: account setup, credit grants,
//! a scheduled task delivered through the paced queue, and an inbound
//! moderation incident, all against one SQLite file.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use sendry::Service;
use sendry::core::{
    AccountId, ChannelId, DestinationId, InboundMessage, MessageId, MessageRef, ParticipantId,
    ParticipantRole,
};
use sendry::ledger::EntryKind;
use sendry::storage::queries::{accounts, tasks};
use sendry::storage::{
    Account, ModerationPolicy, NewTask, Recurrence, TaskCategory, TaskStatus,
};
use sendry_test_utils::{roster_with_self_admin, MockTransport};

fn config_for(db_path: &str) -> sendry::config::SendryConfig {
    sendry::config::load_and_validate_str(&format!(
        r#"
        [service]
        name = "lifecycle-test"

        [storage]
        database_path = "{db_path}"

        [queue]
        min_delay_ms = 0
        max_delay_ms = 0
        congestion_step_ms = 0
        congestion_cap_ms = 0
        typing_ms_per_char = 0
        typing_min_ms = 0
        typing_max_ms = 0
        send_timeout_secs = 5

        [scheduler]
        poll_interval_secs = 1
        startup_delay_secs = 0
        "#
    ))
    .expect("valid test config")
}

fn account_id() -> AccountId {
    AccountId::from("acct-1")
}

fn channel() -> ChannelId {
    ChannelId::from("chan-1")
}

fn dest() -> DestinationId {
    DestinationId::from("group-1")
}

#[tokio::test(start_paused = true)]
async fn scheduled_task_and_moderation_flow_through_one_service() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lifecycle.db");
    let config = config_for(db_path.to_str().unwrap());

    let transport = Arc::new(MockTransport::new());
    transport.set_roster(
        &channel(),
        roster_with_self_admin(&dest(), "Lifecycle Group", &[(
            "bob@host",
            ParticipantRole::Member,
        )]),
    );

    let service = Service::start(config, transport.clone()).await.unwrap();

    accounts::upsert_account(
        service.db(),
        &Account {
            id: account_id(),
            owner: "owner-1".into(),
            channel_id: channel(),
            unlimited: false,
            created_at: Utc::now(),
        },
    )
    .await
    .unwrap();
    service
        .ledger()
        .credit(&account_id(), 10, EntryKind::Purchase, "seed")
        .await
        .unwrap();

    // A due one-shot task picked up by the background poll loop.
    let task_id = service
        .scheduler()
        .schedule_task(NewTask {
            account_id: account_id(),
            destination_id: dest(),
            category: TaskCategory::Engagement,
            body: Some("good morning".into()),
            media_url: None,
            media_kind: None,
            scheduled_at: Utc::now() - chrono::Duration::minutes(1),
            recurrence: Recurrence::None,
        })
        .await
        .unwrap();

    let mut completed = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let task = tasks::get_task(service.db(), &task_id).await.unwrap().unwrap();
        if task.status == TaskStatus::Completed {
            completed = true;
            break;
        }
    }
    assert!(completed, "scheduled task never completed");
    assert_eq!(transport.sent().len(), 1);

    // An inbound violation against a policy on the same destination.
    service
        .moderation()
        .set_policy(&ModerationPolicy {
            account_id: account_id(),
            destination_id: dest(),
            enabled: true,
            anti_link: true,
            banned_terms: vec![],
            warning_template: None,
            max_warnings: 3,
            warning_reset_days: 0,
            welcome_enabled: false,
            welcome_template: None,
        })
        .await
        .unwrap();

    let handled = service
        .moderation()
        .handle_inbound(
            &account_id(),
            &InboundMessage {
                destination: dest(),
                sender: ParticipantId::from("bob@host"),
                text: Some("join https://scam.example".into()),
                message: MessageRef {
                    destination: dest(),
                    message_id: MessageId::from("m1"),
                },
            },
        )
        .await
        .unwrap();
    assert!(handled);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(transport.deleted().len(), 1);
    // One credit for the task, one for the moderation incident.
    assert_eq!(service.ledger().balance(&account_id()).await.unwrap(), 8);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn start_rejects_a_config_with_inverted_delay_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("invalid.db");

    // Built by hand rather than through the loader, so the cross-field
    // checks have not run yet.
    let mut config = config_for(db_path.to_str().unwrap());
    config.queue.min_delay_ms = 5_000;
    config.queue.max_delay_ms = 1_000;

    let err = Service::start(config, Arc::new(MockTransport::new()))
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("min_delay_ms"),
        "unexpected error: {err}"
    );
}
