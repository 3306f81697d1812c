//! Built-in administrative commands.
//!
//! Names follow what the frontend sends: `auth`, `chatx`, `kick`,
//! `kickwarn`, `players`. Missing or malformed optional fields degrade
//! gracefully (defaulted, never rejected); the dispatch layer has
//! already dropped target IDs that would truncate.

use crate::control::{Command, CommandInput, ControlCaller, ControlContext};
use crate::core::wire::Color;
use crate::error::{constants, ProtocolError, Result};
use crate::service::chat::ChatMessage;
use serde_json::{json, Value};
use tracing::{info, warn};

/// `auth`: establish the caller's authentication for this control
/// connection. The only command that runs unauthenticated.
pub struct CmdAuth;

impl Command for CmdAuth {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn must_auth(&self) -> bool {
        false
    }

    fn run(
        &self,
        ctx: &ControlContext,
        caller: &mut ControlCaller,
        input: &CommandInput,
    ) -> Result<Option<Value>> {
        let expected = match &ctx.server.config().control.password {
            Some(password) => password,
            None => {
                // No password configured: the control plane is closed.
                warn!(caller = %caller.label, "{}", constants::ERR_CONTROL_DISABLED);
                return Err(ProtocolError::Unauthorized);
            }
        };

        match &input.password {
            Some(given) if given == expected => {
                caller.authenticated = true;
                info!(caller = %caller.label, "Control caller authenticated");
                Ok(Some(json!(true)))
            }
            _ => {
                warn!(caller = %caller.label, "{}", constants::ERR_BAD_PASSWORD);
                Err(ProtocolError::Unauthorized)
            }
        }
    }
}

/// `chatx`: broadcast (or target) a chat line with tag and color
/// metadata. A color that fails hex validation keeps the configured
/// broadcast color silently.
pub struct CmdChatX;

impl Command for CmdChatX {
    fn name(&self) -> &'static str {
        "chatx"
    }

    fn run(
        &self,
        ctx: &ControlContext,
        _caller: &mut ControlCaller,
        input: &CommandInput,
    ) -> Result<Option<Value>> {
        let server = &ctx.server;
        let color = input.color.as_deref().and_then(Color::from_hex);

        let message = ChatMessage {
            sender: 0,
            text: input.text.clone().unwrap_or_default(),
            tag: input.tag.clone(),
            color,
            // Absent or empty Targets means broadcast to all.
            targets: input.targets.clone().unwrap_or_default(),
        };

        match server.chat().broadcast(server, message) {
            Some(delivered) => Ok(Some(json!({
                "PlayerID": delivered.player_id,
                "Text": delivered.text,
                "Tag": delivered.tag,
                "Color": delivered.color.to_hex(),
            }))),
            // Explicit targets, none connected: suppressed, nothing to
            // report.
            None => Ok(None),
        }
    }
}

/// `kick`: simple form, a bare numeric player ID, no recorded reason.
pub struct CmdKick;

impl Command for CmdKick {
    fn name(&self) -> &'static str {
        "kick"
    }

    fn run(
        &self,
        ctx: &ControlContext,
        _caller: &mut ControlCaller,
        input: &CommandInput,
    ) -> Result<Option<Value>> {
        let id = match input.id {
            Some(id) => id,
            None => return Ok(Some(json!(false))),
        };
        let kicked = ctx.server.chat().kick(&ctx.server, id, "", false);
        Ok(Some(json!(kicked)))
    }
}

/// `kickwarn`: full moderation form with reason, quiet flag, and
/// persisted history for registered users.
pub struct CmdKickWarn;

impl Command for CmdKickWarn {
    fn name(&self) -> &'static str {
        "kickwarn"
    }

    fn run(
        &self,
        ctx: &ControlContext,
        _caller: &mut ControlCaller,
        input: &CommandInput,
    ) -> Result<Option<Value>> {
        let id = match input.id {
            Some(id) => id,
            None => return Ok(Some(json!(false))),
        };
        let reason = input.reason.clone().unwrap_or_default();
        let quiet = input.quiet.unwrap_or(false);

        let kicked = ctx.server.chat().kick(&ctx.server, id, &reason, quiet);
        Ok(Some(json!(kicked)))
    }
}

/// `players`: list connected sessions for the frontend's roster view.
pub struct CmdPlayers;

impl Command for CmdPlayers {
    fn name(&self) -> &'static str {
        "players"
    }

    fn run(
        &self,
        ctx: &ControlContext,
        _caller: &mut ControlCaller,
        _input: &CommandInput,
    ) -> Result<Option<Value>> {
        let mut sessions = ctx.server.sessions();
        sessions.sort_unstable_by_key(|s| s.id());

        let players: Vec<Value> = sessions
            .iter()
            .map(|session| {
                json!({
                    "ID": session.id(),
                    "UID": session.uid(),
                    "Name": session.name(),
                    "Channels": session.channels(),
                })
            })
            .collect();
        Ok(Some(json!(players)))
    }
}
