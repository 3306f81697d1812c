//! Chat delivery and moderation.
//!
//! [`ChatModule`] builds targeted or broadcast chat messages, keeps the
//! bounded log of delivered lines, and runs the kick flow: leave-reason
//! tagging, the cooperative disconnect payload pair, and the persisted
//! per-UID [`KickHistory`].
//!
//! Targeting rules:
//! - empty target list: every connected session receives the message;
//! - non-empty list: only the listed sessions that still resolve;
//! - non-empty list resolving to zero sessions: the message is
//!   suppressed entirely rather than sent to nobody.

use crate::config::ChatConfig;
use crate::core::wire::Color;
use crate::protocol::data::{DataChat, DataDisconnectReason, DataInternalDisconnect};
use crate::service::server::Server;
use crate::utils::time::unix_millis;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Record kind the kick history is stored under in the user data store.
pub const KICK_HISTORY_KIND: &str = "kickHistory";

/// One chat message about to be delivered. Transient; only the wire
/// form is retained, in the bounded log.
#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    /// Originating player ID; 0 marks a server/system line.
    pub sender: u32,
    pub text: String,
    /// Optional tag rendered ahead of the message.
    pub tag: Option<String>,
    /// Explicit color override; `None` falls back to the configured
    /// broadcast color.
    pub color: Option<Color>,
    /// Target player IDs; empty means broadcast to all.
    pub targets: Vec<u32>,
}

impl ChatMessage {
    /// Server-originated line for every connected session.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Line relayed on behalf of a connected player.
    pub fn from_player(sender: u32, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            color: Some(Color::WHITE),
            ..Self::default()
        }
    }
}

/// Append-only moderation log for one UID. Survives reconnects and
/// process restarts; persisted last-writer-wins through the user data
/// store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickHistory {
    pub entries: Vec<KickEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickEntry {
    pub reason: String,
    pub timestamp_ms: u64,
}

/// Chat delivery and moderation, owned by the server.
pub struct ChatModule {
    config: ChatConfig,
    log: Mutex<VecDeque<DataChat>>,
}

impl ChatModule {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            log: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Deliver a chat message per the targeting rules. Returns the wire
    /// form that was delivered, or `None` when the message was
    /// suppressed (explicit targets, none connected).
    ///
    /// A send failing against one session (concurrent disconnect) is
    /// logged and skipped; it never aborts delivery to the others.
    pub fn broadcast(&self, server: &Server, message: ChatMessage) -> Option<DataChat> {
        let recipients = if message.targets.is_empty() {
            server.sessions()
        } else {
            message
                .targets
                .iter()
                .filter_map(|id| server.session(*id))
                .collect()
        };

        if !message.targets.is_empty() && recipients.is_empty() {
            debug!(
                targets = ?message.targets,
                "No chat target resolved to a connected session, message suppressed"
            );
            return None;
        }

        let data = DataChat {
            player_id: message.sender,
            text: message.text,
            tag: message.tag.unwrap_or_default(),
            color: message.color.unwrap_or_else(|| self.config.broadcast_color()),
        };

        let mut delivered = 0u64;
        for session in &recipients {
            match server.send_to(session, &data) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    debug!(
                        player_id = session.id(),
                        error = %err,
                        "Skipping chat recipient that went away"
                    );
                }
            }
        }
        server.metrics().chat_delivered(delivered);

        self.append_log(data.clone());
        Some(data)
    }

    /// Recent delivered messages, oldest first.
    pub fn history(&self) -> Vec<DataChat> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn append_log(&self, line: DataChat) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if log.len() >= self.config.log_length {
            log.pop_front();
        }
        log.push_back(line);
    }

    /// Kick the session with the given numeric ID.
    ///
    /// Returns `false` when no live session has that ID: an already
    /// disconnected player is a race, not an error, and repeating a kick
    /// against a closed session performs no further action. Otherwise
    /// the disconnect-reason payload and the terminal control payload go
    /// out, the session is disposed, and a non-empty reason is appended
    /// to the UID's persisted history (registered users only).
    pub fn kick(&self, server: &Server, session_id: u32, reason: &str, quiet: bool) -> bool {
        let session = match server.session(session_id) {
            Some(session) if !session.connection().is_disconnecting() => session,
            _ => return false,
        };

        if !quiet {
            // Observers see "got kicked" in the leave announcement
            // instead of the plain leave message.
            session.set_leave_reason(&self.config.message_kick);
        }

        let text = if reason.is_empty() {
            self.config.default_kick_reason.clone()
        } else {
            format!("Kicked: {reason}")
        };

        // Best-effort: the peer may vanish before these arrive.
        let _ = server.send_to(&session, &DataDisconnectReason { text });
        let _ = server.send_to(&session, &DataInternalDisconnect);

        server.dispose_session(session_id);
        server.metrics().kick_recorded();

        if !reason.is_empty() {
            self.record_kick(server, session.uid(), reason);
        }

        info!(
            player_id = session_id,
            uid = session.uid(),
            reason,
            quiet,
            "Kicked session"
        );
        true
    }

    /// Append one entry to the UID's persisted kick history. Only UIDs
    /// with a registered login key keep history; guests leave no rows.
    fn record_kick(&self, server: &Server, uid: &str, reason: &str) {
        let store = server.store();
        if store.get_key(uid).is_none() {
            debug!(uid, "No registered key for UID, skipping kick history");
            return;
        }

        let mut history: KickHistory = store.load_or_default(uid, KICK_HISTORY_KIND);
        history.entries.push(KickEntry {
            reason: reason.to_string(),
            timestamp_ms: unix_millis(),
        });

        match store.save_as(uid, KICK_HISTORY_KIND, &history) {
            Ok(()) => server.notifier().user_info_updated(uid),
            Err(err) => warn!(uid, error = %err, "Failed to persist kick history"),
        }
    }
}

impl std::fmt::Debug for ChatModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModule")
            .field("config", &self.config)
            .finish()
    }
}
