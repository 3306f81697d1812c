//! Typed message layer on top of the wire primitives.
//!
//! Every payload that crosses a connection implements [`DataType`] and is
//! identified on the wire by its `DataID` string. The
//! [`DataTypeRegistry`] maps those identifiers back to constructors at
//! read time; it is built once at startup and shared immutably
//! afterwards, so adding a payload type never touches the codec or the
//! session layer.
//!
//! [`DataType`]: data::DataType
//! [`DataTypeRegistry`]: registry::DataTypeRegistry

pub mod data;
pub mod registry;

#[cfg(test)]
mod tests;
