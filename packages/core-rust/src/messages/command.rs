//! Command types carried inside the broker envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Item, ItemId};

// ---------------------------------------------------------------------------
// CommandType
// ---------------------------------------------------------------------------

/// Kind of operation a command requests.
///
/// Encoded on the wire as a small integer. Values outside the known range are
/// kept as `Unknown` so that decoding succeeds and the dispatcher can reject
/// them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CommandType {
    #[default]
    AddItem,
    GetItem,
    RemoveItem,
    GetAllItems,
    /// Unrecognized wire value, preserved verbatim.
    Unknown(i32),
}

impl CommandType {
    /// Every known command type, in wire order.
    pub const KNOWN: [CommandType; 4] = [
        CommandType::AddItem,
        CommandType::GetItem,
        CommandType::RemoveItem,
        CommandType::GetAllItems,
    ];

    /// Wire value of this command type.
    #[must_use]
    pub fn wire_value(self) -> i32 {
        match self {
            CommandType::AddItem => 0,
            CommandType::GetItem => 1,
            CommandType::RemoveItem => 2,
            CommandType::GetAllItems => 3,
            CommandType::Unknown(raw) => raw,
        }
    }

    /// Canonical name, as used in configuration (`AddItem`, `GetAllItems`, ...).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CommandType::AddItem => "AddItem",
            CommandType::GetItem => "GetItem",
            CommandType::RemoveItem => "RemoveItem",
            CommandType::GetAllItems => "GetAllItems",
            CommandType::Unknown(_) => "Unknown",
        }
    }
}

impl From<i32> for CommandType {
    fn from(raw: i32) -> Self {
        match raw {
            0 => CommandType::AddItem,
            1 => CommandType::GetItem,
            2 => CommandType::RemoveItem,
            3 => CommandType::GetAllItems,
            other => CommandType::Unknown(other),
        }
    }
}

impl From<CommandType> for i32 {
    fn from(command_type: CommandType) -> Self {
        command_type.wire_value()
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::Unknown(raw) => write!(f, "Unknown({raw})"),
            known => f.write_str(known.name()),
        }
    }
}

/// Error returned when a command type name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command type: {0}")]
pub struct ParseCommandTypeError(pub String);

impl FromStr for CommandType {
    type Err = ParseCommandTypeError;

    /// Accepts the canonical name (`GetAllItems`) or its kebab/snake form
    /// (`get-all-items`, `get_all_items`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        CommandType::KNOWN
            .into_iter()
            .find(|t| t.name().to_lowercase() == normalized)
            .ok_or_else(|| ParseCommandTypeError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Immutable command decoded from a broker message.
///
/// Absent `item_id` decodes to `0` and absent `item_payload` to the empty
/// string. Fields are private; construct through the typed constructors or
/// [`Command::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type", default)]
    command_type: CommandType,
    #[serde(default)]
    item_id: ItemId,
    #[serde(default)]
    item_payload: String,
}

impl Command {
    #[must_use]
    pub fn new(command_type: CommandType, item_id: ItemId, item_payload: impl Into<String>) -> Self {
        Self {
            command_type,
            item_id,
            item_payload: item_payload.into(),
        }
    }

    #[must_use]
    pub fn add_item(item_id: ItemId, item_payload: impl Into<String>) -> Self {
        Self::new(CommandType::AddItem, item_id, item_payload)
    }

    #[must_use]
    pub fn remove_item(item_id: ItemId) -> Self {
        Self::new(CommandType::RemoveItem, item_id, String::new())
    }

    #[must_use]
    pub fn get_item(item_id: ItemId) -> Self {
        Self::new(CommandType::GetItem, item_id, String::new())
    }

    #[must_use]
    pub fn get_all_items() -> Self {
        Self::new(CommandType::GetAllItems, 0, String::new())
    }

    #[must_use]
    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    #[must_use]
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    #[must_use]
    pub fn item_payload(&self) -> &str {
        &self.item_payload
    }

    /// The item an `AddItem` command stores.
    #[must_use]
    pub fn to_item(&self) -> Item {
        Item::new(self.item_id, self.item_payload.clone())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type:{} item_id:{} item_payload:{:?}",
            self.command_type, self.item_id, self.item_payload
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_match_envelope_numbering() {
        assert_eq!(CommandType::AddItem.wire_value(), 0);
        assert_eq!(CommandType::GetItem.wire_value(), 1);
        assert_eq!(CommandType::RemoveItem.wire_value(), 2);
        assert_eq!(CommandType::GetAllItems.wire_value(), 3);
    }

    #[test]
    fn unknown_wire_value_is_preserved() {
        let t = CommandType::from(42);
        assert_eq!(t, CommandType::Unknown(42));
        assert_eq!(i32::from(t), 42);
        assert_eq!(t.to_string(), "Unknown(42)");
    }

    #[test]
    fn parses_names_in_several_spellings() {
        assert_eq!("AddItem".parse::<CommandType>(), Ok(CommandType::AddItem));
        assert_eq!("get-all-items".parse::<CommandType>(), Ok(CommandType::GetAllItems));
        assert_eq!("REMOVE_ITEM".parse::<CommandType>(), Ok(CommandType::RemoveItem));
        assert_eq!("getitem".parse::<CommandType>(), Ok(CommandType::GetItem));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "Unknown".parse::<CommandType>().unwrap_err();
        assert_eq!(err, ParseCommandTypeError("Unknown".to_string()));
        assert!("frobnicate".parse::<CommandType>().is_err());
    }

    #[test]
    fn constructors_fill_defaults() {
        let cmd = Command::remove_item(9);
        assert_eq!(cmd.command_type(), CommandType::RemoveItem);
        assert_eq!(cmd.item_id(), 9);
        assert_eq!(cmd.item_payload(), "");

        let cmd = Command::get_all_items();
        assert_eq!(cmd.item_id(), 0);
    }

    #[test]
    fn add_item_command_builds_item() {
        let cmd = Command::add_item(3, "C");
        assert_eq!(cmd.to_item(), Item::new(3, "C"));
    }
}
