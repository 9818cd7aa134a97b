use super::model::{CommandResult, DirectoryEntry, DirectoryListing, EntryKind};
use super::paths::{normalize, WorkspaceRoot};
use crate::prompt::{PromptError, PromptStore};
use std::fs;
use std::path::Path;

/// Editor sidecar files carrying metadata for their neighbor. Invisible to
/// the agent: listing results skip them entirely.
pub const SIDECAR_SUFFIX: &str = ".meta";

/// Everything a handler may touch. Borrowed per dispatch, owned elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub workspace: &'a WorkspaceRoot,
    pub prompts: &'a PromptStore,
}

pub fn create_directory(ctx: HandlerContext<'_>, raw_path: &str) -> CommandResult {
    const NAME: &str = "CreateDirectory";
    let relative = match normalize(raw_path) {
        Ok(relative) => relative,
        Err(reason) => return CommandResult::error(NAME, reason),
    };
    let full = ctx.workspace.resolve(&relative);

    if full.is_dir() {
        return CommandResult::success(NAME, format!("Directory already exists at: {relative}"));
    }
    match fs::create_dir_all(&full) {
        Ok(()) => CommandResult::success(NAME, format!("Directory created at: {relative}")),
        Err(err) => CommandResult::error(
            NAME,
            format!("Could not create directory `{relative}`: {err}"),
        ),
    }
}

pub fn delete_path(ctx: HandlerContext<'_>, raw_path: &str) -> CommandResult {
    const NAME: &str = "DeletePath";
    let relative = match normalize(raw_path) {
        Ok(relative) => relative,
        Err(reason) => return CommandResult::error(NAME, reason),
    };
    let full = ctx.workspace.resolve(&relative);

    let outcome = if full.is_dir() {
        fs::remove_dir_all(&full)
    } else if full.is_file() {
        fs::remove_file(&full)
    } else {
        return CommandResult::error(NAME, format!("Path does not exist: {relative}"));
    };

    match outcome {
        Ok(()) => CommandResult::success(NAME, format!("Path deleted: {relative}")),
        Err(err) => CommandResult::error(
            NAME,
            format!("Could not delete `{relative}` (still in use?): {err}"),
        ),
    }
}

pub fn create_file(ctx: HandlerContext<'_>, raw_path: &str, content: &str) -> CommandResult {
    const NAME: &str = "CreateFile";
    let relative = match normalize(raw_path) {
        Ok(relative) => relative,
        Err(reason) => return CommandResult::error(NAME, reason),
    };
    let full = ctx.workspace.resolve(&relative);
    let existed = full.is_file();

    if let Some(parent) = full.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            return CommandResult::error(
                NAME,
                format!("Could not create parent directory for `{relative}`: {err}"),
            );
        }
    }

    match fs::write(&full, content) {
        Ok(()) => {
            let action = if existed { "updated" } else { "created" };
            CommandResult::success(
                NAME,
                format!("File {action} at: {relative} ({} characters)", content.len()),
            )
        }
        Err(err) => {
            CommandResult::error(NAME, format!("Could not write file `{relative}`: {err}"))
        }
    }
}

pub fn read_file(ctx: HandlerContext<'_>, raw_path: &str) -> CommandResult {
    const NAME: &str = "ReadFile";
    let relative = match normalize(raw_path) {
        Ok(relative) => relative,
        Err(reason) => return CommandResult::error(NAME, reason),
    };
    let full = ctx.workspace.resolve(&relative);

    if full.is_dir() {
        return CommandResult::error(
            NAME,
            format!("Path is a directory, use ListContents instead: {relative}"),
        );
    }
    if !full.is_file() {
        return CommandResult::error(NAME, format!("File does not exist at: {relative}"));
    }

    match fs::read_to_string(&full) {
        Ok(content) => {
            let mut result = CommandResult::success(NAME, format!("File read: {relative}"));
            result.file_content = Some(content);
            result
        }
        Err(err) => CommandResult::error(NAME, format!("Could not read file `{relative}`: {err}")),
    }
}

pub fn list_contents(ctx: HandlerContext<'_>, raw_path: &str) -> CommandResult {
    const NAME: &str = "ListContents";
    let relative = match normalize(raw_path) {
        Ok(relative) => relative,
        Err(reason) => return CommandResult::error(NAME, reason),
    };
    let full = ctx.workspace.resolve(&relative);

    if !full.is_dir() {
        return CommandResult::error(NAME, format!("Directory does not exist at: {relative}"));
    }

    match listing_recursive(&full, &relative) {
        Ok(listing) => {
            let mut result =
                CommandResult::success(NAME, format!("Directory tree listed: {relative}"));
            result.directory_listing = Some(listing);
            result
        }
        Err(err) => CommandResult::error(
            NAME,
            format!("Could not list contents of `{relative}`: {err}"),
        ),
    }
}

pub fn set_prompt(ctx: HandlerContext<'_>, content: &str) -> CommandResult {
    const NAME: &str = "SetPrompt";
    if content.is_empty() {
        return CommandResult::error(NAME, "Prompt content is missing or empty.");
    }

    match ctx.prompts.set_prompt(content) {
        Ok(()) => CommandResult::success(
            NAME,
            "System prompt updated. The agent will be reconfigured for the next exchange.",
        ),
        Err(PromptError::EmptyContent) => {
            CommandResult::error(NAME, "Prompt content is missing or empty.")
        }
        Err(err) => CommandResult::error(NAME, format!("Could not write the new prompt: {err}")),
    }
}

/// Depth-first snapshot. Directory entries come before file entries, each
/// group sorted by name, so listings are deterministic across platforms.
fn listing_recursive(full: &Path, relative: &str) -> std::io::Result<DirectoryListing> {
    let mut dir_names = Vec::new();
    let mut file_names = Vec::new();

    for entry in fs::read_dir(full)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            dir_names.push(name);
        } else if !name.to_ascii_lowercase().ends_with(SIDECAR_SUFFIX) {
            file_names.push(name);
        }
    }
    dir_names.sort();
    file_names.sort();

    let mut contents = Vec::new();
    let mut subdirectories = Vec::new();
    for name in &dir_names {
        contents.push(DirectoryEntry {
            name: name.clone(),
            kind: EntryKind::Directory,
        });
        let child_relative = format!("{relative}/{name}");
        subdirectories.push(listing_recursive(&full.join(name), &child_relative)?);
    }
    for name in file_names {
        contents.push(DirectoryEntry {
            name,
            kind: EntryKind::File,
        });
    }

    Ok(DirectoryListing {
        path: relative.to_string(),
        contents,
        subdirectories,
    })
}
