// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The moderation engine.
//!
//! One engine serves every account. Enforcement is all-or-nothing per
//! incident: the credit is debited first, then the deletion and the warning
//! (or removal notice) are queued at high priority. Queued sends are watched
//! from spawned tasks so inbound handling never blocks on delivery pacing;
//! if an enforcement send fails, the incident's credit is refunded exactly
//! once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sendry_config::ModerationConfig;
use sendry_core::{
    AccountId, ChannelId, DestinationId, InboundMessage, MessagePayload, ParticipantId, Priority,
    Roster, SendryError, Transport,
};
use sendry_ledger::{CreditLedger, EntryKind};
use sendry_queue::{DeliveryQueue, EnqueueOptions, SendHandle};
use sendry_storage::queries::{accounts, moderation};
use sendry_storage::{Database, ModerationPolicy};

use crate::classify::{classify, Violation};
use crate::template::{display_name, render};

struct CachedRoster {
    roster: Roster,
    fetched_at: Instant,
}

/// Refunds one incident's credit at most once, no matter how many
/// enforcement sends report failure.
struct RefundGuard {
    ledger: Arc<CreditLedger>,
    account: AccountId,
    context: String,
    done: AtomicBool,
}

impl RefundGuard {
    fn new(ledger: Arc<CreditLedger>, account: AccountId, context: String) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            account,
            context,
            done: AtomicBool::new(false),
        })
    }

    async fn refund(&self, cause: &str) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        match self
            .ledger
            .credit(
                &self.account,
                1,
                EntryKind::Credit,
                &format!("refund: {}", self.context),
            )
            .await
        {
            Ok(_) => debug!(account = %self.account, cause, "moderation credit refunded"),
            Err(err) => error!(account = %self.account, error = %err, "refund failed"),
        }
    }
}

/// Engine enforcing per-destination moderation policies on inbound traffic.
pub struct ModerationEngine {
    db: Arc<Database>,
    ledger: Arc<CreditLedger>,
    queue: DeliveryQueue,
    transport: Arc<dyn Transport>,
    config: ModerationConfig,
    roster_cache: Mutex<HashMap<(ChannelId, DestinationId), CachedRoster>>,
}

impl ModerationEngine {
    pub fn new(
        db: Arc<Database>,
        ledger: Arc<CreditLedger>,
        queue: DeliveryQueue,
        transport: Arc<dyn Transport>,
        config: ModerationConfig,
    ) -> Self {
        Self {
            db,
            ledger,
            queue,
            transport,
            config,
            roster_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Create or replace the policy of one destination.
    pub async fn set_policy(&self, policy: &ModerationPolicy) -> Result<(), SendryError> {
        moderation::upsert_policy(&self.db, policy).await
    }

    pub async fn get_policy(
        &self,
        account: &AccountId,
        destination: &DestinationId,
    ) -> Result<Option<ModerationPolicy>, SendryError> {
        moderation::get_policy(&self.db, account, destination).await
    }

    /// Handle one inbound group message. Returns whether an enforcement
    /// action was taken (and billed).
    ///
    /// Clean traffic and exempt senders never touch the ledger; a refused
    /// debit aborts the incident before any action.
    pub async fn handle_inbound(
        &self,
        account: &AccountId,
        msg: &InboundMessage,
    ) -> Result<bool, SendryError> {
        let Some(policy) = moderation::get_policy(&self.db, account, &msg.destination).await?
        else {
            return Ok(false);
        };
        if !policy.enabled {
            return Ok(false);
        }
        let Some(text) = msg.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(false);
        };

        let Some(acct) = accounts::get_account(&self.db, account).await? else {
            warn!(account = %account, "moderation for unknown account, ignoring");
            return Ok(false);
        };
        let channel = acct.channel_id;

        // Admin senders are exempt before their content is even looked at.
        let roster = self.roster(&channel, &msg.destination).await?;
        if roster.is_admin(&msg.sender) {
            debug!(sender = %msg.sender, "admin sender, exempt from moderation");
            return Ok(false);
        }
        let Some(violation) = classify(text, &policy) else {
            return Ok(false);
        };
        if !roster.self_entry().is_some_and(|p| p.role.is_admin()) {
            warn!(
                destination = %msg.destination,
                "not an admin in this destination, cannot enforce"
            );
            return Ok(false);
        }

        let context = format!(
            "moderation action against {} in {}",
            msg.sender, msg.destination
        );
        if !self.ledger.debit(account, 1, &context).await? {
            warn!(
                account = %account,
                destination = %msg.destination,
                "insufficient credit, violation not enforced"
            );
            return Ok(false);
        }

        let refund = RefundGuard::new(self.ledger.clone(), account.clone(), context);
        if let Err(err) = self
            .enforce(&channel, account, &policy, msg, &violation, &refund)
            .await
        {
            error!(
                destination = %msg.destination,
                sender = %msg.sender,
                error = %err,
                "enforcement failed"
            );
            refund.refund("enforcement error").await;
        }
        Ok(true)
    }

    async fn enforce(
        &self,
        channel: &ChannelId,
        account: &AccountId,
        policy: &ModerationPolicy,
        msg: &InboundMessage,
        violation: &Violation,
        refund: &Arc<RefundGuard>,
    ) -> Result<(), SendryError> {
        let delete = self
            .queue
            .enqueue(
                channel,
                msg.destination.clone(),
                MessagePayload::Delete {
                    target: msg.message.clone(),
                },
                EnqueueOptions {
                    priority: Priority::High,
                    skip_typing: true,
                },
            )
            .await;
        self.watch_send(delete, refund.clone(), "message deletion");

        let count = moderation::record_warning(
            &self.db,
            account,
            &msg.destination,
            &msg.sender,
            policy.warning_reset_days,
            Utc::now(),
        )
        .await?;

        if count >= policy.max_warnings {
            self.transport
                .remove_participant(channel, &msg.destination, &msg.sender)
                .await?;
            info!(
                destination = %msg.destination,
                offender = %msg.sender,
                warnings = count,
                "participant removed"
            );
            let body = format!(
                "@{} was removed after {count} warnings.",
                display_name(&msg.sender)
            );
            let notice = self.send_mention(channel, msg, body).await;
            self.watch_send(notice, refund.clone(), "removal notice");
        } else {
            let template = policy
                .warning_template
                .as_deref()
                .unwrap_or(&self.config.warning_template);
            let body = render(
                template,
                &[
                    ("name", display_name(&msg.sender)),
                    ("count", &count.to_string()),
                    ("max", &policy.max_warnings.to_string()),
                    ("reason", &violation.reason()),
                ],
            );
            info!(
                destination = %msg.destination,
                offender = %msg.sender,
                warnings = count,
                max = policy.max_warnings,
                "warning issued"
            );
            let warning = self.send_mention(channel, msg, body).await;
            self.watch_send(warning, refund.clone(), "warning message");
        }
        Ok(())
    }

    async fn send_mention(
        &self,
        channel: &ChannelId,
        msg: &InboundMessage,
        body: String,
    ) -> SendHandle {
        self.queue
            .enqueue(
                channel,
                msg.destination.clone(),
                MessagePayload::Text {
                    body,
                    mentions: vec![msg.sender.clone()],
                },
                EnqueueOptions {
                    priority: Priority::High,
                    skip_typing: true,
                },
            )
            .await
    }

    /// Watch a queued enforcement send without blocking inbound handling;
    /// refund the incident on failure.
    fn watch_send(&self, handle: SendHandle, refund: Arc<RefundGuard>, what: &'static str) {
        tokio::spawn(async move {
            if let Err(err) = handle.wait().await {
                warn!(error = %err, what, "enforcement send failed");
                refund.refund(what).await;
            }
        });
    }

    /// Greet newly added participants. Each greeting costs one credit;
    /// participants whose greeting cannot be funded are skipped, the rest
    /// still get theirs.
    pub async fn handle_participants_added(
        &self,
        account: &AccountId,
        destination: &DestinationId,
        joined: &[ParticipantId],
    ) -> Result<(), SendryError> {
        let Some(policy) = moderation::get_policy(&self.db, account, destination).await? else {
            return Ok(());
        };
        if !policy.welcome_enabled {
            return Ok(());
        }
        let Some(template) = policy
            .welcome_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        else {
            return Ok(());
        };
        let Some(acct) = accounts::get_account(&self.db, account).await? else {
            warn!(account = %account, "welcome for unknown account, ignoring");
            return Ok(());
        };
        let channel = acct.channel_id;

        let roster = self.roster(&channel, destination).await.ok();
        let group_name = roster
            .as_ref()
            .map(|r| r.subject.clone())
            .unwrap_or_default();
        let rules = roster
            .as_ref()
            .and_then(|r| r.description.clone())
            .unwrap_or_else(|| "No rules set.".to_string());
        let date = Utc::now().format("%Y-%m-%d").to_string();

        for participant in joined {
            let context = format!("welcome message for {participant} in {destination}");
            if !self.ledger.debit(account, 1, &context).await? {
                warn!(
                    account = %account,
                    participant = %participant,
                    "insufficient credit, welcome skipped"
                );
                continue;
            }
            let body = render(
                template,
                &[
                    ("name", display_name(participant)),
                    ("group_name", &group_name),
                    ("date", &date),
                    ("rules", &rules),
                ],
            );
            let handle = self
                .queue
                .enqueue(
                    &channel,
                    destination.clone(),
                    MessagePayload::Text {
                        body,
                        mentions: vec![participant.clone()],
                    },
                    EnqueueOptions::default(),
                )
                .await;
            let refund = RefundGuard::new(self.ledger.clone(), account.clone(), context);
            self.watch_send(handle, refund, "welcome message");
        }
        Ok(())
    }

    /// Roster of a destination, cached per channel for the configured TTL.
    /// A fetch failure falls back to the stale cached copy when one exists.
    async fn roster(
        &self,
        channel: &ChannelId,
        destination: &DestinationId,
    ) -> Result<Roster, SendryError> {
        let key = (channel.clone(), destination.clone());
        let ttl = Duration::from_secs(self.config.roster_cache_ttl_secs);
        {
            let cache = self.roster_cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                if entry.fetched_at.elapsed() < ttl {
                    return Ok(entry.roster.clone());
                }
            }
        }
        match self.transport.fetch_roster(channel, destination).await {
            Ok(roster) => {
                self.roster_cache.lock().await.insert(
                    key,
                    CachedRoster {
                        roster: roster.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(roster)
            }
            Err(err) => {
                if let Some(entry) = self.roster_cache.lock().await.get(&key) {
                    warn!(
                        destination = %destination,
                        error = %err,
                        "roster fetch failed, serving stale copy"
                    );
                    return Ok(entry.roster.clone());
                }
                Err(err)
            }
        }
    }
}
