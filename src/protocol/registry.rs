//! # Data Type Registry
//!
//! Maps stable string identifiers to payload schemas and their factories.
//!
//! Registration happens once, explicitly, during process startup:
//! [`RegistryBuilder`] collects the types and `build()` freezes them into an
//! immutable [`DataTypeRegistry`] shared behind `Arc`. There is no way to
//! mutate the table afterwards, so lookups need no synchronization.
//!
//! ## Extensibility
//! A new payload only registers itself; the registry and codec stay
//! untouched. Peers built with different type sets interoperate as far as
//! the deployment's unknown-ID policy allows.
//!
//! ## Failure modes
//! - Two types claiming one identifier is a startup error
//!   ([`ProtocolError::DuplicateDataId`]) and must abort before the server
//!   accepts connections.
//! - An inbound identifier with no registration is
//!   [`ProtocolError::UnknownDataId`]; whether that drops the message or the
//!   connection is the caller's policy.

use crate::core::wire::{WireReader, WireWriter};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::data::{
    DataChat, DataClientHello, DataContext, DataDisconnectReason, DataInternalDisconnect,
    DataNetEmoji, DataPlayerInfo, DataServerWelcome, DataType, DataTypeId,
};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

type Factory = fn() -> Box<dyn DataType>;

fn make_instance<T: DataTypeId>() -> Box<dyn DataType> {
    Box::new(T::default())
}

/// One registered payload schema.
#[derive(Debug)]
pub struct RegisteredType {
    pub data_id: &'static str,
    pub version: u16,
    factory: Factory,
}

impl RegisteredType {
    /// Construct an empty instance ready for `read`.
    pub fn instantiate(&self) -> Box<dyn DataType> {
        (self.factory)()
    }
}

/// Startup-time collector for data type registrations.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<&'static str, RegisteredType>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its `DATA_ID`. Duplicate identifiers are a fatal
    /// configuration error surfaced before any connection is accepted.
    pub fn register<T: DataTypeId>(mut self) -> Result<Self> {
        if self.entries.contains_key(T::DATA_ID) {
            return Err(ProtocolError::DuplicateDataId(T::DATA_ID));
        }
        self.entries.insert(
            T::DATA_ID,
            RegisteredType {
                data_id: T::DATA_ID,
                version: T::VERSION,
                factory: make_instance::<T>,
            },
        );
        Ok(self)
    }

    /// Freeze the collected registrations into an immutable lookup table.
    pub fn build(self) -> DataTypeRegistry {
        DataTypeRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable DataID → schema lookup table built once at startup.
pub struct DataTypeRegistry {
    entries: HashMap<&'static str, RegisteredType>,
}

impl DataTypeRegistry {
    /// Registry containing every built-in payload type.
    pub fn with_core_types() -> Result<Self> {
        Ok(RegistryBuilder::new()
            .register::<DataClientHello>()?
            .register::<DataServerWelcome>()?
            .register::<DataChat>()?
            .register::<DataPlayerInfo>()?
            .register::<DataDisconnectReason>()?
            .register::<DataInternalDisconnect>()?
            .register::<DataNetEmoji>()?
            .build())
    }

    pub fn resolve(&self, data_id: &str) -> Option<&RegisteredType> {
        self.entries.get(data_id)
    }

    pub fn contains(&self, data_id: &str) -> bool {
        self.entries.contains_key(data_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers of every registered type, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Decode one message: read the DataID, resolve the factory, construct
    /// an empty instance and let it read its payload. The payload must be
    /// consumed exactly; trailing bytes mean the peer's schema disagrees
    /// with ours and the message cannot be trusted.
    pub fn read(&self, ctx: &mut DataContext, message: &[u8]) -> Result<Box<dyn DataType>> {
        let mut reader = WireReader::new(message);
        let data_id = reader.get_str()?;
        let entry = self
            .resolve(&data_id)
            .ok_or(ProtocolError::UnknownDataId(data_id))?;

        let mut instance = entry.instantiate();
        instance.read(ctx, &mut reader)?;

        if !reader.is_empty() {
            return Err(ProtocolError::MalformedStream(constants::ERR_TRAILING_BYTES));
        }
        Ok(instance)
    }

    /// Encode one message into `buf`: the DataID string, then the payload.
    pub fn write(
        &self,
        ctx: &mut DataContext,
        data: &dyn DataType,
        buf: &mut BytesMut,
    ) -> Result<()> {
        let mut writer = WireWriter::new(buf);
        writer.put_str(data.data_id())?;
        data.write(ctx, &mut writer)
    }

    /// Encode one message into a fresh frozen buffer.
    pub fn encode(&self, ctx: &mut DataContext, data: &dyn DataType) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.write(ctx, data, &mut buf)?;
        Ok(buf.freeze())
    }
}
