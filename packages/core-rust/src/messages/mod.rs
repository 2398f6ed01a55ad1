//! Wire-level message schemas exchanged over the broker.
//!
//! A message body is a single [`Command`] envelope encoded as a named
//! `MsgPack` map (see [`codec`]).

pub mod codec;
pub mod command;

pub use codec::{decode_command, encode_command, DecodeError, EncodeError, CONTENT_TYPE};
pub use command::{Command, CommandType, ParseCommandTypeError};
