pub mod handlers;
pub mod model;
pub mod paths;

pub use handlers::{HandlerContext, SIDECAR_SUFFIX};
pub use model::{
    Command, CommandList, CommandResult, CommandStatus, DirectoryEntry, DirectoryListing,
    EntryKind, ResultList,
};
pub use paths::{normalize, WorkspaceRoot};

use crate::prompt::PromptStore;
use model::{
    CreateDirectoryArgs, CreateFileArgs, DeletePathArgs, ListContentsArgs, ReadFileArgs,
    SetPromptArgs,
};

/// Turns one raw agent reply into an executed, serialized result envelope.
/// Every failure mode becomes data in the envelope; `parse_and_execute`
/// itself always returns a string.
#[derive(Debug)]
pub struct Dispatcher {
    workspace: WorkspaceRoot,
    prompts: std::sync::Arc<PromptStore>,
}

impl Dispatcher {
    pub fn new(workspace: WorkspaceRoot, prompts: std::sync::Arc<PromptStore>) -> Self {
        Self { workspace, prompts }
    }

    pub fn parse_and_execute(&self, raw_text: &str, structured_mode: bool) -> String {
        if raw_text.is_empty() {
            return serialize_results(vec![CommandResult::error("Parse", "Empty reply received.")]);
        }

        // Pure conversation: the reply is the result.
        if !structured_mode {
            return raw_text.to_string();
        }

        let Some(json_slice) = extract_json(raw_text) else {
            // The agent spoke without invoking a tool. Valid, not an error.
            return raw_text.to_string();
        };

        let command_list: CommandList = match serde_json::from_str(json_slice) {
            Ok(list) => list,
            Err(err) => {
                return serialize_results(vec![CommandResult::error(
                    "Parse",
                    format!(
                        "Malformed command JSON (expected {{\"commands\":[...]}}): {err}"
                    ),
                )])
            }
        };

        if command_list.commands.is_empty() {
            return serialize_results(vec![CommandResult::warning(
                "Parse",
                "The JSON was valid but the `commands` array is empty.",
            )]);
        }

        // Strictly in array order, no short-circuiting: a failed command
        // must not block the ones after it.
        let ctx = HandlerContext {
            workspace: &self.workspace,
            prompts: &self.prompts,
        };
        let results = command_list
            .commands
            .iter()
            .map(|command| execute_command(ctx, command))
            .collect();
        serialize_results(results)
    }
}

/// Best-effort extraction of a JSON object from prose: the slice from the
/// first `{` to the last `}` inclusive. An opening brace with no closing
/// brace after it still yields a candidate (to the end of the text), so a
/// truncated payload surfaces as a parse error instead of silently passing
/// through; only brace-free replies count as pure prose. Prose containing
/// stray braces can mis-extract; kept as-is for compatibility with the
/// existing agents.
pub fn extract_json(raw_text: &str) -> Option<&str> {
    let start = raw_text.find('{')?;
    match raw_text.rfind('}') {
        Some(end) if end > start => Some(&raw_text[start..=end]),
        _ => Some(&raw_text[start..]),
    }
}

fn execute_command(ctx: HandlerContext<'_>, command: &Command) -> CommandResult {
    let name = command.function_name.as_str();
    match name {
        "CreateDirectory" => match decode_args::<CreateDirectoryArgs>(name, &command.arguments) {
            Ok(args) => handlers::create_directory(ctx, &args.directory_path),
            Err(result) => result,
        },
        "ListContents" => match decode_args::<ListContentsArgs>(name, &command.arguments) {
            Ok(args) => handlers::list_contents(ctx, &args.directory_path),
            Err(result) => result,
        },
        "DeletePath" => match decode_args::<DeletePathArgs>(name, &command.arguments) {
            Ok(args) => handlers::delete_path(ctx, &args.path_to_delete),
            Err(result) => result,
        },
        "CreateFile" => match decode_args::<CreateFileArgs>(name, &command.arguments) {
            Ok(args) => handlers::create_file(ctx, &args.file_path, &args.file_content),
            Err(result) => result,
        },
        "ReadFile" => match decode_args::<ReadFileArgs>(name, &command.arguments) {
            Ok(args) => handlers::read_file(ctx, &args.file_path),
            Err(result) => result,
        },
        "SetPrompt" => match decode_args::<SetPromptArgs>(name, &command.arguments) {
            Ok(args) => handlers::set_prompt(ctx, &args.prompt_content),
            Err(result) => result,
        },
        unknown => CommandResult::error(unknown, format!("Unknown function `{unknown}`.")),
    }
}

fn decode_args<T: serde::de::DeserializeOwned>(
    name: &str,
    blob: &str,
) -> Result<T, CommandResult> {
    serde_json::from_str(blob).map_err(|err| {
        CommandResult::error(name, format!("Could not decode arguments: {err}"))
    })
}

fn serialize_results(results: Vec<CommandResult>) -> String {
    let envelope = ResultList { results };
    serde_json::to_string_pretty(&envelope)
        .unwrap_or_else(|err| fallback_envelope(&err.to_string()))
}

fn fallback_envelope(message: &str) -> String {
    serde_json::json!({
        "results": [{
            "commandName": "Serialize",
            "status": "ERROR",
            "message": message,
        }]
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn dispatcher() -> (tempfile::TempDir, Dispatcher) {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path().join("project");
        fs::create_dir_all(&root).expect("project root");
        let rules_path = tmp.path().join("rules.txt");
        let prompt_path = tmp.path().join("system.txt");
        fs::write(&rules_path, "rules").expect("write rules");
        fs::write(&prompt_path, "persona").expect("write prompt");
        let prompts = std::sync::Arc::new(
            PromptStore::open(&rules_path, &prompt_path).expect("open prompts"),
        );
        (tmp, Dispatcher::new(WorkspaceRoot::new(root), prompts))
    }

    fn parse_envelope(body: &str) -> ResultList {
        serde_json::from_str(body).expect("result envelope")
    }

    #[test]
    fn empty_reply_yields_exactly_one_error_result() {
        let (_tmp, dispatcher) = dispatcher();
        let envelope = parse_envelope(&dispatcher.parse_and_execute("", true));
        assert_eq!(envelope.results.len(), 1);
        assert_eq!(envelope.results[0].status, CommandStatus::Error);
        assert!(!envelope.results[0].message.is_empty());
    }

    #[test]
    fn unstructured_mode_passes_text_through_byte_for_byte() {
        let (_tmp, dispatcher) = dispatcher();
        let text = "just chatting {not a command} bye";
        assert_eq!(dispatcher.parse_and_execute(text, false), text);
    }

    #[test]
    fn reply_without_braces_passes_through_in_structured_mode() {
        let (_tmp, dispatcher) = dispatcher();
        let text = "I could not find a suitable tool for that.";
        assert_eq!(dispatcher.parse_and_execute(text, true), text);
    }

    #[test]
    fn extraction_tolerates_prose_around_the_command_block() {
        let (_tmp, dispatcher) = dispatcher();
        let text = "Sure! Here you go:\n{\"commands\":[{\"functionName\":\"CreateDirectory\",\"arguments\":\"{\\\"directoryPath\\\":\\\"Test/Demo\\\"}\"}]}\nDone.";
        let envelope = parse_envelope(&dispatcher.parse_and_execute(text, true));
        assert_eq!(envelope.results.len(), 1);
        assert_eq!(envelope.results[0].status, CommandStatus::Success);
        assert_eq!(envelope.results[0].command_name, "CreateDirectory");
    }

    #[test]
    fn malformed_json_becomes_a_single_error_result_with_parser_text() {
        let (_tmp, dispatcher) = dispatcher();
        let envelope =
            parse_envelope(&dispatcher.parse_and_execute("{\"commands\":[{\"functionName\":", true));
        assert_eq!(envelope.results.len(), 1);
        assert_eq!(envelope.results[0].status, CommandStatus::Error);
        assert!(envelope.results[0].message.contains("Malformed command JSON"));
    }

    #[test]
    fn empty_command_array_is_a_warning_not_an_error() {
        let (_tmp, dispatcher) = dispatcher();
        let envelope = parse_envelope(&dispatcher.parse_and_execute("{\"commands\":[]}", true));
        assert_eq!(envelope.results.len(), 1);
        assert_eq!(envelope.results[0].status, CommandStatus::Warning);
        assert!(envelope.results[0].message.contains("empty"));
    }

    #[test]
    fn results_match_commands_in_count_and_order_without_short_circuiting() {
        let (_tmp, dispatcher) = dispatcher();
        let text = r#"{"commands":[
            {"functionName":"CreateDirectory","arguments":"{\"directoryPath\":\"a\"}"},
            {"functionName":"ReadFile","arguments":"{\"filePath\":\"missing.txt\"}"},
            {"functionName":"CreateFile","arguments":"{\"filePath\":\"a/x.txt\",\"fileContent\":\"x\"}"}
        ]}"#;
        let envelope = parse_envelope(&dispatcher.parse_and_execute(text, true));
        assert_eq!(envelope.results.len(), 3);
        assert_eq!(envelope.results[0].command_name, "CreateDirectory");
        assert_eq!(envelope.results[0].status, CommandStatus::Success);
        assert_eq!(envelope.results[1].command_name, "ReadFile");
        assert_eq!(envelope.results[1].status, CommandStatus::Error);
        assert_eq!(envelope.results[2].command_name, "CreateFile");
        assert_eq!(envelope.results[2].status, CommandStatus::Success);
    }

    #[test]
    fn unknown_function_and_bad_arguments_become_error_results() {
        let (_tmp, dispatcher) = dispatcher();
        let text = r#"{"commands":[
            {"functionName":"FormatDisk","arguments":"{}"},
            {"functionName":"ReadFile","arguments":"not json"}
        ]}"#;
        let envelope = parse_envelope(&dispatcher.parse_and_execute(text, true));
        assert_eq!(envelope.results.len(), 2);
        assert!(envelope.results[0].message.contains("FormatDisk"));
        assert!(envelope.results[1].message.contains("Could not decode arguments"));
    }

    #[test]
    fn extract_json_takes_the_outermost_brace_window_or_runs_to_the_end() {
        assert_eq!(extract_json("px {a} sx"), Some("{a}"));
        assert_eq!(extract_json("no braces"), None);
        assert_eq!(extract_json("payload cut {\"commands\":["), Some("{\"commands\":["));
        assert_eq!(extract_json("} reversed {"), Some("{"));
    }

    #[test]
    fn fallback_envelope_stays_valid_json_for_messages_with_quotes() {
        let body = fallback_envelope("unexpected \"quote\" in \\path\\");
        let parsed: ResultList = serde_json::from_str(&body).expect("fallback parses");
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].status, CommandStatus::Error);
        assert!(parsed.results[0].message.contains("\"quote\""));
    }
}
