//! Binary envelope codec for [`Command`].
//!
//! Envelopes are `MsgPack` maps with named fields (`type`, `item_id`,
//! `item_payload`) produced by `rmp_serde::to_vec_named()`. Missing fields
//! take their zero value on decode, and positional (array) encodings are
//! accepted as well. A body must hold exactly one envelope.

use serde::de::{Deserialize, IgnoredAny};

use super::command::Command;

/// Content type advertised for encoded command envelopes.
pub const CONTENT_TYPE: &str = "application/msgpack";

/// Errors from turning raw message bytes into a [`Command`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed command envelope: {0}")]
    Malformed(#[from] rmp_serde::decode::Error),
    #[error("{remaining} unexpected bytes after command envelope")]
    TrailingBytes { remaining: usize },
}

/// Error from serializing a [`Command`] into an envelope.
#[derive(Debug, thiserror::Error)]
#[error("cannot encode command envelope: {0}")]
pub struct EncodeError(#[from] rmp_serde::encode::Error);

/// Serializes a command into its wire envelope.
///
/// # Errors
///
/// Returns `EncodeError` if the `MsgPack` serializer fails.
pub fn encode_command(command: &Command) -> Result<Vec<u8>, EncodeError> {
    Ok(rmp_serde::to_vec_named(command)?)
}

/// Decodes a wire envelope into a command.
///
/// Decoding borrows from `bytes`, so length prefixes larger than the buffer
/// fail instead of allocating.
///
/// # Errors
///
/// Returns `DecodeError::Malformed` when the bytes are not a well-formed
/// envelope and `DecodeError::TrailingBytes` when anything follows it.
pub fn decode_command(bytes: &[u8]) -> Result<Command, DecodeError> {
    let command = rmp_serde::from_slice(bytes)?;

    // The envelope is known to fit in `bytes`; skip over it again to find
    // where it ends.
    let mut rest = bytes;
    IgnoredAny::deserialize(&mut rmp_serde::Deserializer::new(&mut rest))?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes {
            remaining: rest.len(),
        });
    }
    Ok(command)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde::Serialize;

    use super::*;
    use crate::messages::CommandType;

    #[test]
    fn encodes_named_fields_with_integer_type() {
        let bytes = encode_command(&Command::get_item(5)).unwrap();

        let value: BTreeMap<String, IgnoredAny> = rmp_serde::from_slice(&bytes).unwrap();
        let keys: Vec<&str> = value.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["item_id", "item_payload", "type"]);

        #[derive(serde::Deserialize)]
        struct TypeOnly {
            #[serde(rename = "type")]
            t: i64,
        }
        let t: TypeOnly = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(t.t, 1);
    }

    #[test]
    fn decodes_add_item_envelope() {
        let bytes = encode_command(&Command::add_item(1, "A")).unwrap();
        let cmd = decode_command(&bytes).unwrap();
        assert_eq!(cmd.command_type(), CommandType::AddItem);
        assert_eq!(cmd.item_id(), 1);
        assert_eq!(cmd.item_payload(), "A");
    }

    #[test]
    fn missing_fields_take_zero_values() {
        #[derive(Serialize)]
        struct OnlyType {
            #[serde(rename = "type")]
            t: i32,
        }
        let bytes = rmp_serde::to_vec_named(&OnlyType { t: 3 }).unwrap();
        let cmd = decode_command(&bytes).unwrap();
        assert_eq!(cmd.command_type(), CommandType::GetAllItems);
        assert_eq!(cmd.item_id(), 0);
        assert_eq!(cmd.item_payload(), "");
    }

    #[test]
    fn unknown_type_survives_decoding() {
        let bytes = encode_command(&Command::new(CommandType::Unknown(17), 4, "x")).unwrap();
        let cmd = decode_command(&bytes).unwrap();
        assert_eq!(cmd.command_type(), CommandType::Unknown(17));
        assert_eq!(cmd.item_id(), 4);
    }

    #[test]
    fn rejects_malformed_bytes() {
        assert!(matches!(decode_command(&[1, 2, 3]), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_command(&[]), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn rejects_truncated_envelope() {
        let bytes = encode_command(&Command::add_item(1, "payload")).unwrap();
        assert!(decode_command(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = encode_command(&Command::add_item(1, "A")).unwrap();
        bytes.extend_from_slice(b"\xff\xfe garbage");
        assert!(matches!(
            decode_command(&bytes),
            Err(DecodeError::TrailingBytes { remaining: 10 })
        ));

        // A second complete envelope is trailing data too.
        let mut doubled = encode_command(&Command::get_item(2)).unwrap();
        let second = doubled.clone();
        doubled.extend_from_slice(&second);
        assert!(matches!(
            decode_command(&doubled),
            Err(DecodeError::TrailingBytes { remaining }) if remaining == second.len()
        ));
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        // fixmap(1) { "item_payload": str32 claiming 4 GiB }
        let mut bytes = vec![0x81, 0xac];
        bytes.extend_from_slice(b"item_payload");
        bytes.extend_from_slice(&[0xdb, 0xff, 0xff, 0xff, 0xff, b'A']);
        assert!(decode_command(&bytes).is_err());
    }

    #[test]
    fn rejects_non_utf8_payload() {
        // fixmap(1) { "item_payload": fixstr(2) holding invalid utf-8 }
        let mut bytes = vec![0x81, 0xac];
        bytes.extend_from_slice(b"item_payload");
        bytes.extend_from_slice(&[0xa2, 0xff, 0xfe]);
        assert!(decode_command(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_command(&bytes);
        }

        #[test]
        fn any_wire_type_is_preserved(raw in any::<i32>(), id in any::<i64>()) {
            let bytes = encode_command(&Command::new(CommandType::from(raw), id, "")).unwrap();
            let cmd = decode_command(&bytes).unwrap();
            prop_assert_eq!(cmd.command_type().wire_value(), raw);
            prop_assert_eq!(cmd.item_id(), id);
        }
    }
}
