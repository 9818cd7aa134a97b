use serde::{Deserialize, Serialize};

/// One requested operation as the agent emits it. `arguments` stays a raw
/// JSON-encoded object string until the matching handler deserializes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub function_name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Agent-facing envelope: `{"commands":[...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CommandList {
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Success,
    /// Non-fatal outcome class, distinguishable from a hard error. Used
    /// when the payload was well-formed but carried nothing to execute.
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Recursive snapshot of a directory. Mirrors a real filesystem, so it is
/// always a tree; each node owns its own subdirectory listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub path: String,
    pub contents: Vec<DirectoryEntry>,
    pub subdirectories: Vec<DirectoryListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command_name: String,
    pub status: CommandStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_listing: Option<DirectoryListing>,
}

impl CommandResult {
    pub fn success(command_name: &str, message: impl Into<String>) -> Self {
        Self::plain(command_name, CommandStatus::Success, message)
    }

    pub fn warning(command_name: &str, message: impl Into<String>) -> Self {
        Self::plain(command_name, CommandStatus::Warning, message)
    }

    pub fn error(command_name: &str, message: impl Into<String>) -> Self {
        Self::plain(command_name, CommandStatus::Error, message)
    }

    fn plain(command_name: &str, status: CommandStatus, message: impl Into<String>) -> Self {
        Self {
            command_name: command_name.to_string(),
            status,
            message: message.into(),
            file_content: None,
            directory_listing: None,
        }
    }
}

/// Caller-facing envelope: `{"results":[...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResultList {
    pub results: Vec<CommandResult>,
}

// Per-operation argument payloads, decoded from `Command::arguments`.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectoryArgs {
    pub directory_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListContentsArgs {
    pub directory_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletePathArgs {
    pub path_to_delete: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileArgs {
    pub file_path: String,
    #[serde(default)]
    pub file_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetPromptArgs {
    pub prompt_content: String,
}
