//! Command vocabulary shared by change and control envelopes.

use std::fmt;

use crate::error::ProtocolError;

/// Commands carried by every envelope.
///
/// Data commands (`New`, `Update`, `Delete`, `Retran`) travel in a
/// [`DataMsg`](crate::DataMsg); control commands (`Retran`, `Ack`, `Nack`)
/// travel in a retransmission request or reply. Each has a one-character
/// wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// First appearance of a key; payload is the full document.
    New,
    /// Change to an existing key; payload is a patch.
    Update,
    /// Removal of a key; no payload.
    Delete,
    /// Full re-send of a key, or a request for one.
    Retran,
    /// Retransmission request accepted.
    Ack,
    /// Retransmission request rejected.
    Nack,
}

impl Command {
    /// All commands, in wire-code order.
    pub const ALL: [Command; 6] = [
        Command::Update,
        Command::New,
        Command::Delete,
        Command::Retran,
        Command::Ack,
        Command::Nack,
    ];

    /// One-character wire code.
    pub const fn code(&self) -> &'static str {
        match self {
            Command::Update => "u",
            Command::New => "n",
            Command::Delete => "d",
            Command::Retran => "r",
            Command::Ack => "a",
            Command::Nack => "k",
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: &str) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.code() == code)
            .ok_or_else(|| ProtocolError::InvalidCommand(code.to_string()))
    }

    /// Upper-case display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Update => "UPDATE",
            Command::New => "NEW",
            Command::Delete => "DELETE",
            Command::Retran => "RETRAN",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
        }
    }

    /// Whether this command may appear in a change envelope.
    pub const fn is_data(&self) -> bool {
        matches!(
            self,
            Command::New | Command::Update | Command::Delete | Command::Retran
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
