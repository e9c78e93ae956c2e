//! Top-level event dispatcher.
//!
//! One call per inbound event: classify, serialize per user, route to the
//! right handler, send the reply. No error crosses this boundary; every
//! failure becomes an apologetic reply for the sender and nothing else.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{ChatRecord, FileCategory, RegistrationState, UserId, UserRecord};
use crate::event::{classify, Event, InboundEvent, Sender};
use crate::files;
use crate::limits::RateLimiter;
use crate::ports::{CompletionPort, MessagingPort, SearchPort, StoragePort};
use crate::registration;
use crate::utils::{AuditEvent, AuditLogger};
use crate::{Error, Result};

/// Per-user async locks: same-user events are fully serialized, cross-user
/// events run in parallel.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id.0)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// A reply ready to go back through the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub text: String,
    pub request_contact: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: false,
        }
    }
}

pub struct Dispatcher {
    cfg: Arc<Config>,
    messenger: Arc<dyn MessagingPort>,
    completion: Arc<dyn CompletionPort>,
    search: Arc<dyn SearchPort>,
    store: Arc<dyn StoragePort>,
    locks: UserLocks,
    rate_limiter: Mutex<RateLimiter>,
    audit: AuditLogger,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        completion: Arc<dyn CompletionPort>,
        search: Arc<dyn SearchPort>,
        store: Arc<dyn StoragePort>,
        shutdown: CancellationToken,
    ) -> Self {
        let rate_limiter = Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ));
        let audit = AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json);

        Self {
            cfg,
            messenger,
            completion,
            search,
            store,
            locks: UserLocks::default(),
            rate_limiter,
            audit,
            shutdown,
        }
    }

    /// Handle one inbound event end to end and send the reply.
    ///
    /// The sender's lock is held across the whole classify -> transition ->
    /// reply sequence, so replies for one user go out in arrival order.
    pub async fn dispatch(&self, event: InboundEvent) {
        let chat = event.chat;
        let sender = event.sender.clone();

        let _guard = self.locks.lock_user(sender.id).await;

        let reply = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("shutdown: dropping event from user {}", sender.id.0);
                return;
            }
            reply = self.handle(event) => reply,
        };

        let Some(reply) = reply else {
            return; // nothing to say (e.g. empty text)
        };

        let sent = if reply.request_contact {
            self.messenger.send_contact_prompt(chat, &reply.text).await
        } else {
            self.messenger.send_text(chat, &reply.text).await
        };
        if let Err(e) = sent {
            // A transport failure must not take the worker down.
            warn!("failed to send reply to chat {}: {e}", chat.0);
        }
    }

    async fn handle(&self, event: InboundEvent) -> Option<Reply> {
        let sender = event.sender.clone();

        let out = match classify(event) {
            Event::Command { name, args } => self.handle_command(&sender, &name, &args).await,
            Event::Contact { phone } => self.handle_contact(&sender, &phone).await,
            Event::File {
                name,
                category,
                data,
            } => {
                // The unsupported branch makes no upstream call, so it is
                // not rate limited.
                if category != FileCategory::Unsupported {
                    if let Some(reply) = self.check_rate_limit(&sender).await {
                        return Some(reply);
                    }
                }
                self.handle_file(&sender, &name, category, &data).await
            }
            Event::Text { body } => {
                if body.trim().is_empty() {
                    return None;
                }
                if let Some(reply) = self.check_rate_limit(&sender).await {
                    return Some(reply);
                }
                self.handle_text(&sender, &body).await
            }
        };

        match out {
            Ok(reply) => reply,
            Err(err) => {
                self.audit_error(&sender, &err);
                Some(Reply::text(apology(&err)))
            }
        }
    }

    async fn handle_command(
        &self,
        sender: &Sender,
        name: &str,
        args: &[String],
    ) -> Result<Option<Reply>> {
        if !self.cfg.commands.contains(name) {
            return Ok(Some(Reply::text(format!("Unknown command: /{name}"))));
        }

        match name {
            "start" => self.handle_start(sender).await,
            "websearch" => {
                if let Some(reply) = self.check_rate_limit(sender).await {
                    return Ok(Some(reply));
                }
                self.handle_websearch(sender, args).await
            }
            "referral" => self.handle_referral(sender, args).await,
            _ => Ok(Some(Reply::text(format!("Unknown command: /{name}")))),
        }
    }

    async fn handle_start(&self, sender: &Sender) -> Result<Option<Reply>> {
        let existing = self.store.get_user(sender.id).await?;
        let t = registration::on_start(sender, existing);
        if t.persist {
            self.store.upsert_user(&t.record).await?;
        }
        Ok(Some(Reply {
            text: t.reply,
            request_contact: t.request_contact,
        }))
    }

    async fn handle_contact(&self, sender: &Sender, phone: &str) -> Result<Option<Reply>> {
        let existing = self.store.get_user(sender.id).await?;
        let t = registration::on_contact(sender, existing, phone);
        if t.persist {
            self.store.upsert_user(&t.record).await?;
        }
        Ok(Some(Reply {
            text: t.reply,
            request_contact: t.request_contact,
        }))
    }

    async fn handle_text(&self, sender: &Sender, body: &str) -> Result<Option<Reply>> {
        self.ensure_user(sender).await?;

        let response = self.completion.complete(body).await?;

        let record = ChatRecord::new(sender.id, body, response.clone());
        if let Err(e) = self.store.append_chat(&record).await {
            // The reply still goes out; the missing row is logged only.
            warn!("chat record append failed for user {}: {e}", sender.id.0);
        }

        self.audit_message(sender, "TEXT", body, &response);
        Ok(Some(Reply::text(response)))
    }

    async fn handle_websearch(&self, sender: &Sender, args: &[String]) -> Result<Option<Reply>> {
        let query = args.join(" ");

        let results = match self.search.search(&query).await {
            Ok(results) => results,
            Err(Error::Validation(_)) => {
                return Ok(Some(Reply::text(
                    "Please provide a search query after the /websearch command.",
                )));
            }
            Err(e) => return Err(e),
        };

        let summary = self
            .completion
            .complete(&summarize_prompt(&query, &results.summary))
            .await?;

        let mut text = format!("Search results for '{query}':\n\n{summary}");
        if !results.links.is_empty() {
            text.push_str("\n\nTop links:\n");
            text.push_str(&results.links.join("\n"));
        }

        self.audit_message(sender, "WEBSEARCH", &query, &text);
        Ok(Some(Reply::text(text)))
    }

    async fn handle_referral(&self, sender: &Sender, args: &[String]) -> Result<Option<Reply>> {
        let Some(code) = args.first().filter(|c| !c.trim().is_empty()) else {
            return Ok(Some(Reply::text("Usage: /referral <code>")));
        };

        let mut record = self.ensure_user(sender).await?;
        record.referral_code = Some(code.to_string());
        record.updated_at = Utc::now();
        self.store.upsert_user(&record).await?;

        Ok(Some(Reply::text(format!(
            "Referral code {code} saved. Thank you!"
        ))))
    }

    async fn handle_file(
        &self,
        sender: &Sender,
        name: &str,
        category: FileCategory,
        data: &[u8],
    ) -> Result<Option<Reply>> {
        let reply = files::handle_file(
            self.completion.as_ref(),
            self.store.as_ref(),
            sender.id,
            name,
            category,
            data,
        )
        .await?;

        self.audit_message(sender, "FILE", name, &reply);
        Ok(Some(Reply::text(reply)))
    }

    /// The chat and referral handlers need a user row; senders that never ran
    /// /start get a minimal one.
    async fn ensure_user(&self, sender: &Sender) -> Result<UserRecord> {
        if let Some(record) = self.store.get_user(sender.id).await? {
            return Ok(record);
        }

        let record = UserRecord::new(
            sender.id,
            sender.display_name.clone(),
            sender.handle.clone(),
            RegistrationState::AwaitingPhone,
        );
        self.store.upsert_user(&record).await?;
        Ok(record)
    }

    async fn check_rate_limit(&self, sender: &Sender) -> Option<Reply> {
        let (ok, retry_after) = self.rate_limiter.lock().await.check(sender.id);
        if ok {
            return None;
        }

        let retry = retry_after.unwrap_or_default().as_secs_f64();
        if let Err(e) = self
            .audit
            .write(AuditEvent::rate_limit(sender.id.0, username(sender), retry))
        {
            warn!("audit write failed: {e}");
        }
        Some(Reply::text(format!(
            "⏳ Rate limited. Please wait {retry:.1} seconds."
        )))
    }

    fn audit_message(&self, sender: &Sender, message_type: &str, content: &str, response: &str) {
        let ev = AuditEvent::message(
            sender.id.0,
            username(sender),
            message_type,
            content,
            Some(response),
        );
        if let Err(e) = self.audit.write(ev) {
            warn!("audit write failed: {e}");
        }
    }

    fn audit_error(&self, sender: &Sender, err: &Error) {
        let ev = AuditEvent::error(sender.id.0, username(sender), &err.to_string(), None);
        if let Err(e) = self.audit.write(ev) {
            warn!("audit write failed: {e}");
        }
    }
}

fn username(sender: &Sender) -> &str {
    sender.handle.as_deref().unwrap_or("unknown")
}

fn summarize_prompt(query: &str, summary: &str) -> String {
    if summary.trim().is_empty() {
        return format!("Summarize what is known about \"{query}\" in a couple of sentences.");
    }
    format!("Summarize this search result for \"{query}\": {summary}")
}

/// Map an error to the apologetic reply the sender sees.
fn apology(err: &Error) -> String {
    match err {
        Error::Validation(msg) => format!("⚠️ {msg}"),
        Error::RateLimited => {
            "⏳ The assistant is busy right now. Please try again in a moment.".to_string()
        }
        Error::ServiceUnavailable(_) => {
            "⚠️ I couldn't reach the assistant service. Please try again later.".to_string()
        }
        Error::InvalidResponse(_) => {
            "⚠️ The assistant returned an unusable answer. Please try again.".to_string()
        }
        Error::Persistence(_) => {
            "⚠️ Something went wrong while saving your data. Please try again.".to_string()
        }
        _ => "❌ Something went wrong. Please try again.".to_string(),
    }
}
