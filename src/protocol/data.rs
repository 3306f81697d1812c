//! # Data Types
//!
//! Typed wire payloads. Every message on the wire is `[DataID][payload]`
//! where the payload layout is owned by the data type itself.
//!
//! A data type implements two traits:
//! - [`DataType`]: object-safe read/write against wire buffers, used through
//!   `Box<dyn DataType>` after registry dispatch;
//! - [`DataTypeId`]: the stable identifier and schema version used at
//!   registration time, plus `Default` as the zero-argument factory producing
//!   an empty instance ready for `read`.
//!
//! Adding a new payload means defining the struct and registering it; the
//! registry and codec never change.

use crate::core::wire::{Color, WireReader, WireWriter};
use crate::error::Result;
use std::any::Any;
use std::fmt;

/// Shared state available while (de)serializing one message. Constructed by
/// the connection per read/write operation.
#[derive(Debug, Clone)]
pub struct DataContext {
    /// Negotiated protocol version for this connection.
    pub protocol_version: u16,
    /// Player ID bound to this connection, 0 before identity binding.
    pub player_id: u32,
}

impl DataContext {
    pub fn new(protocol_version: u16) -> Self {
        Self {
            protocol_version,
            player_id: 0,
        }
    }

    pub fn for_player(protocol_version: u16, player_id: u32) -> Self {
        Self {
            protocol_version,
            player_id,
        }
    }
}

/// Object-safe payload (de)serialization.
///
/// `read` fills an empty instance from the wire; `write` must produce bytes
/// `read` consumes exactly (self-delimiting, verified at the registry level).
pub trait DataType: fmt::Debug + Send + Sync + 'static {
    /// Stable wire identifier of this payload's schema.
    fn data_id(&self) -> &'static str;

    fn read(&mut self, ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()>;

    fn write(&self, ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn DataType {
    /// Downcast a dispatched payload to its concrete type.
    pub fn downcast_ref<T: DataType>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: DataType>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Registration-side identity: the unique DataID, the schema version, and
/// (through the `Default` bound) the factory for empty instances.
pub trait DataTypeId: DataType + Default {
    const DATA_ID: &'static str;
    const VERSION: u16 = 1;
}

/// First message a client sends: protocol version, display name, login key
/// (empty for guests) and the persistent installation token the server
/// derives the UID from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataClientHello {
    pub protocol_version: u16,
    pub name: String,
    pub key: String,
    pub token: u64,
}

impl DataTypeId for DataClientHello {
    const DATA_ID: &'static str = "hello";
}

impl DataType for DataClientHello {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
        self.protocol_version = reader.get_u16()?;
        self.name = reader.get_str()?;
        self.key = reader.get_str()?;
        self.token = reader.get_u64()?;
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
        writer.put_u16(self.protocol_version);
        writer.put_str(&self.name)?;
        writer.put_str(&self.key)?;
        writer.put_u64(self.token);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handshake reply carrying the assigned player ID and the (possibly
/// sanitized) display name the server will use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataServerWelcome {
    pub player_id: u32,
    pub name: String,
}

impl DataTypeId for DataServerWelcome {
    const DATA_ID: &'static str = "welcome";
}

impl DataType for DataServerWelcome {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
        self.player_id = reader.get_u32()?;
        self.name = reader.get_str()?;
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
        writer.put_u32(self.player_id);
        writer.put_str(&self.name)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Chat line. `player_id` 0 marks a server/system message; an empty tag
/// means none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataChat {
    pub player_id: u32,
    pub text: String,
    pub tag: String,
    pub color: Color,
}

impl DataTypeId for DataChat {
    const DATA_ID: &'static str = "chat";
}

impl DataType for DataChat {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
        self.player_id = reader.get_u32()?;
        self.text = reader.get_str()?;
        self.tag = reader.get_str()?;
        self.color = reader.get_color()?;
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
        writer.put_u32(self.player_id);
        writer.put_str(&self.text)?;
        writer.put_str(&self.tag)?;
        writer.put_color(self.color);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Presence announcement: sent to every session when a player joins
/// (`present = true`) or leaves (`present = false`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataPlayerInfo {
    pub player_id: u32,
    pub name: String,
    pub present: bool,
}

impl DataTypeId for DataPlayerInfo {
    const DATA_ID: &'static str = "playerInfo";
}

impl DataType for DataPlayerInfo {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
        self.player_id = reader.get_u32()?;
        self.name = reader.get_str()?;
        self.present = reader.get_bool()?;
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
        writer.put_u32(self.player_id);
        writer.put_str(&self.name)?;
        writer.put_bool(self.present);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Human-readable reason sent ahead of a disconnect so the peer can show it.
/// Informational only; delivery is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataDisconnectReason {
    pub text: String,
}

impl DataTypeId for DataDisconnectReason {
    const DATA_ID: &'static str = "disconnectReason";
}

impl DataType for DataDisconnectReason {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
        self.text = reader.get_str()?;
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
        writer.put_str(&self.text)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Terminal control payload: the sender is closing the connection now.
/// Carries no fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataInternalDisconnect;

impl DataTypeId for DataInternalDisconnect {
    const DATA_ID: &'static str = "internalDisconnect";
}

impl DataType for DataInternalDisconnect {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, _reader: &mut WireReader<'_>) -> Result<()> {
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, _writer: &mut WireWriter<'_>) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Custom emote: a short code plus an image blob other clients render
/// inline. Wire layout: `[Text: null-terminated string][length: i32][bytes]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataNetEmoji {
    pub text: String,
    pub data: Vec<u8>,
}

impl DataTypeId for DataNetEmoji {
    const DATA_ID: &'static str = "netemoji";
}

impl DataType for DataNetEmoji {
    fn data_id(&self) -> &'static str {
        Self::DATA_ID
    }

    fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
        self.text = reader.get_str()?;
        self.data = reader.get_blob()?;
        Ok(())
    }

    fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
        writer.put_str(&self.text)?;
        writer.put_blob(&self.data)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
