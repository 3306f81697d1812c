// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::PROTOCOL_VERSION;
use crate::core::wire::{Color, WireReader, WireWriter};
use crate::error::{ProtocolError, Result};
use crate::protocol::data::*;
use crate::protocol::registry::{DataTypeRegistry, RegistryBuilder};
use std::any::Any;

fn ctx() -> DataContext {
    DataContext::new(PROTOCOL_VERSION)
}

fn roundtrip<T: DataTypeId + PartialEq + Clone>(registry: &DataTypeRegistry, value: &T) -> T {
    let encoded = registry.encode(&mut ctx(), value).expect("encode");
    let decoded = registry.read(&mut ctx(), &encoded).expect("decode");
    decoded
        .downcast_ref::<T>()
        .expect("decoded payload should downcast to the original type")
        .clone()
}

#[test]
fn test_core_types_roundtrip() {
    let registry = DataTypeRegistry::with_core_types().unwrap();

    let hello = DataClientHello {
        protocol_version: PROTOCOL_VERSION,
        name: "Madeline".to_string(),
        key: "login-key".to_string(),
        token: 0xfeed_beef_dead_cafe,
    };
    assert_eq!(roundtrip(&registry, &hello), hello);

    let welcome = DataServerWelcome {
        player_id: 42,
        name: "Madeline".to_string(),
    };
    assert_eq!(roundtrip(&registry, &welcome), welcome);

    let chat = DataChat {
        player_id: 7,
        text: "hello there".to_string(),
        tag: "admin".to_string(),
        color: Color::new(0x00, 0xad, 0xee),
    };
    assert_eq!(roundtrip(&registry, &chat), chat);

    let info = DataPlayerInfo {
        player_id: 9,
        name: "Theo".to_string(),
        present: true,
    };
    assert_eq!(roundtrip(&registry, &info), info);

    let reason = DataDisconnectReason {
        text: "Kicked: testing".to_string(),
    };
    assert_eq!(roundtrip(&registry, &reason), reason);

    assert_eq!(
        roundtrip(&registry, &DataInternalDisconnect),
        DataInternalDisconnect
    );

    let emoji = DataNetEmoji {
        text: "grin".to_string(),
        data: vec![0x89, 0x50, 0x4e, 0x47],
    };
    assert_eq!(roundtrip(&registry, &emoji), emoji);
}

#[test]
fn test_empty_values_roundtrip() {
    let registry = DataTypeRegistry::with_core_types().unwrap();

    // Empty strings and zero-length blobs must survive the wire unchanged.
    let chat = DataChat::default();
    assert_eq!(roundtrip(&registry, &chat), chat);

    let emoji = DataNetEmoji {
        text: String::new(),
        data: Vec::new(),
    };
    assert_eq!(roundtrip(&registry, &emoji), emoji);

    let reason = DataDisconnectReason::default();
    assert_eq!(roundtrip(&registry, &reason), reason);
}

#[test]
fn test_netemoji_wire_layout() {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    let emoji = DataNetEmoji {
        text: "grin".to_string(),
        data: vec![1, 2, 3],
    };

    let encoded = registry.encode(&mut ctx(), &emoji).unwrap();

    // [DataID][Text][length: i32 LE][bytes]
    let mut expected = Vec::new();
    expected.extend_from_slice(b"netemoji\0");
    expected.extend_from_slice(b"grin\0");
    expected.extend_from_slice(&3i32.to_le_bytes());
    expected.extend_from_slice(&[1, 2, 3]);
    assert_eq!(&encoded[..], &expected[..]);
}

#[test]
fn test_serialization_is_deterministic() {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    let chat = DataChat {
        player_id: 3,
        text: "same bytes".to_string(),
        tag: String::new(),
        color: Color::WHITE,
    };

    let first = registry.encode(&mut ctx(), &chat).unwrap();
    let second = registry.encode(&mut ctx(), &chat).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_duplicate_registration_fails() {
    let err = RegistryBuilder::new()
        .register::<DataChat>()
        .unwrap()
        .register::<DataChat>()
        .unwrap_err();

    match err {
        ProtocolError::DuplicateDataId(id) => assert_eq!(id, "chat"),
        other => panic!("Expected DuplicateDataId, got {other:?}"),
    }
}

#[test]
fn test_unknown_data_id_carries_identifier() {
    let registry = DataTypeRegistry::with_core_types().unwrap();

    let mut message = Vec::new();
    message.extend_from_slice(b"entitySync\0");
    message.extend_from_slice(&[1, 2, 3, 4]);

    match registry.read(&mut ctx(), &message) {
        Err(ProtocolError::UnknownDataId(id)) => assert_eq!(id, "entitySync"),
        other => panic!("Expected UnknownDataId, got {other:?}"),
    }
}

#[test]
fn test_trailing_bytes_rejected() {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    let mut encoded = registry
        .encode(&mut ctx(), &DataDisconnectReason { text: "bye".into() })
        .unwrap()
        .to_vec();
    encoded.push(0xaa);

    match registry.read(&mut ctx(), &encoded) {
        Err(ProtocolError::MalformedStream(_)) => {}
        other => panic!("Expected MalformedStream, got {other:?}"),
    }
}

#[test]
fn test_truncated_payload_fails() {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    let encoded = registry
        .encode(
            &mut ctx(),
            &DataClientHello {
                protocol_version: PROTOCOL_VERSION,
                name: "Badeline".to_string(),
                key: String::new(),
                token: 99,
            },
        )
        .unwrap();

    // Drop the token's trailing bytes: the read must fail, not fill zeroes.
    let truncated = &encoded[..encoded.len() - 4];
    match registry.read(&mut ctx(), truncated) {
        Err(ProtocolError::UnexpectedEof) => {}
        other => panic!("Expected UnexpectedEof, got {other:?}"),
    }
}

#[test]
fn test_new_type_registers_without_core_changes() {
    // A payload defined entirely outside the built-in set goes through the
    // same registry machinery untouched.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct DataPing {
        seq: u32,
    }

    impl DataTypeId for DataPing {
        const DATA_ID: &'static str = "ping";
    }

    impl DataType for DataPing {
        fn data_id(&self) -> &'static str {
            Self::DATA_ID
        }

        fn read(&mut self, _ctx: &mut DataContext, reader: &mut WireReader<'_>) -> Result<()> {
            self.seq = reader.get_u32()?;
            Ok(())
        }

        fn write(&self, _ctx: &mut DataContext, writer: &mut WireWriter<'_>) -> Result<()> {
            writer.put_u32(self.seq);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let registry = RegistryBuilder::new()
        .register::<DataChat>()
        .unwrap()
        .register::<DataPing>()
        .unwrap()
        .build();

    let ping = DataPing { seq: 12345 };
    let encoded = registry.encode(&mut ctx(), &ping).unwrap();
    let decoded = registry.read(&mut ctx(), &encoded).unwrap();
    assert_eq!(decoded.downcast_ref::<DataPing>(), Some(&ping));
    assert!(decoded.is::<DataPing>());
    assert!(!decoded.is::<DataChat>());
}

#[test]
fn test_registry_reports_registered_ids() {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    assert_eq!(registry.len(), 7);
    assert!(registry.contains("chat"));
    assert!(registry.contains("netemoji"));
    assert!(!registry.contains("entitySync"));

    let mut ids: Vec<_> = registry.ids().collect();
    ids.sort_unstable();
    assert!(ids.binary_search(&"hello").is_ok());
    assert_eq!(registry.resolve("chat").map(|e| e.version), Some(1));
}
