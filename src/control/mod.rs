//! # Administrative Control Plane
//!
//! Named operations an external frontend invokes against live server
//! state: authenticate, broadcast chat, kick, list players. The wire
//! between the frontend and this dispatch surface stays external; the
//! crate exposes the in-process contract.
//!
//! ## Dispatch contract
//! - Commands are resolved by name from an immutable registry built at
//!   startup; an unknown name is rejected with no side effects.
//! - A command with `must_auth` set never runs for an unauthenticated
//!   caller; the rejection happens before `run`.
//! - The loosely-typed JSON input is parsed exactly once, at the
//!   dispatch boundary, into [`CommandInput`]: every field is an
//!   explicit `Option`, type-mismatched fields become `None`, and a
//!   target ID that overflows is dropped individually rather than
//!   failing the whole command.
//! - `Ok(None)` from `run` is a valid success meaning "nothing to
//!   report" (a suppressed broadcast, for example), not a failure.
//!
//! Commands receive the server handle through [`ControlContext`]; there
//! is no global server instance.

pub mod commands;
pub mod input;

pub use input::CommandInput;

use crate::error::{ProtocolError, Result};
use crate::service::server::Server;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Dependencies handed to every command invocation.
#[derive(Clone)]
pub struct ControlContext {
    pub server: Arc<Server>,
}

impl ControlContext {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }
}

/// One control connection's authentication state.
#[derive(Debug, Clone, Default)]
pub struct ControlCaller {
    /// Set by a successful `auth`; checked before `must_auth` commands.
    pub authenticated: bool,
    /// Label for logs (frontend address or test tag).
    pub label: String,
}

impl ControlCaller {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            label: label.into(),
        }
    }

    /// Caller that skips authentication, for in-process embedders.
    pub fn trusted(label: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            label: label.into(),
        }
    }
}

/// A named administrative operation.
pub trait Command: Send + Sync {
    /// Name the frontend invokes this command by.
    fn name(&self) -> &'static str;

    /// Whether the caller must be authenticated. Defaults to required;
    /// only `auth` itself opts out.
    fn must_auth(&self) -> bool {
        true
    }

    /// Execute against live server state. `Ok(None)` is the valid
    /// "no-op, nothing to report" outcome.
    fn run(
        &self,
        ctx: &ControlContext,
        caller: &mut ControlCaller,
        input: &CommandInput,
    ) -> Result<Option<Value>>;
}

/// Startup-time collector for command registrations.
#[derive(Default)]
pub struct CommandRegistryBuilder {
    entries: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Two commands claiming one name is a startup
    /// configuration error.
    pub fn register(mut self, command: Box<dyn Command>) -> Result<Self> {
        let name = command.name();
        if self.entries.contains_key(name) {
            return Err(ProtocolError::ConfigError(format!(
                "Duplicate command name: {name:?}"
            )));
        }
        self.entries.insert(name, command);
        Ok(self)
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable name → command table built once at startup.
pub struct CommandRegistry {
    entries: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    /// Registry with the built-in command set.
    pub fn with_core_commands() -> Result<Self> {
        Ok(CommandRegistryBuilder::new()
            .register(Box::new(commands::CmdAuth))?
            .register(Box::new(commands::CmdChatX))?
            .register(Box::new(commands::CmdKick))?
            .register(Box::new(commands::CmdKickWarn))?
            .register(Box::new(commands::CmdPlayers))?
            .build())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Command names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Resolve and execute one request.
    ///
    /// Rejections (`UnknownCommand`, `Unauthorized`) happen before the
    /// command runs and leave server state untouched.
    pub fn dispatch(
        &self,
        ctx: &ControlContext,
        caller: &mut ControlCaller,
        name: &str,
        raw_input: &Value,
    ) -> Result<Option<Value>> {
        let command = self
            .entries
            .get(name)
            .ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))?;

        if command.must_auth() && !caller.authenticated {
            debug!(command = name, caller = %caller.label, "Rejected unauthenticated caller");
            return Err(ProtocolError::Unauthorized);
        }

        let input = CommandInput::parse(raw_input);
        info!(command = name, caller = %caller.label, "Dispatching command");
        command.run(ctx, caller, &input)
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("commands", &names)
            .finish()
    }
}
