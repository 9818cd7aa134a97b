use crate::shared::retry_io;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const REQUEST_FILE_PREFIX: &str = "message_";
pub const RESPONSE_FILE_PREFIX: &str = "reponse_";
pub const TRANSPORT_FILE_EXT: &str = ".txt";

/// Body prefix the external process uses to report its own failure inside
/// an otherwise normal response file.
pub const PROCESS_ERROR_PREFIX: &str = "AGENT_PROCESS_ERROR:";

pub fn request_file_name(id: u64) -> String {
    format!("{REQUEST_FILE_PREFIX}{id}{TRANSPORT_FILE_EXT}")
}

pub fn response_file_name(id: u64) -> String {
    format!("{RESPONSE_FILE_PREFIX}{id}{TRANSPORT_FILE_EXT}")
}

/// Extracts the correlation id from a `reponse_<id>.txt` file name.
/// Anything else in the drop directory is not ours to touch.
pub fn parse_response_id(file_name: &str) -> Option<u64> {
    let stem = file_name
        .strip_prefix(RESPONSE_FILE_PREFIX)?
        .strip_suffix(TRANSPORT_FILE_EXT)?;
    stem.parse().ok()
}

pub fn is_transport_file(file_name: &str) -> bool {
    parse_response_id(file_name).is_some()
        || file_name
            .strip_prefix(REQUEST_FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(TRANSPORT_FILE_EXT))
            .is_some_and(|stem| stem.parse::<u64>().is_ok())
}

pub fn is_process_error(body: &str) -> bool {
    body.starts_with(PROCESS_ERROR_PREFIX)
}

/// One-time startup sweep: request/response files surviving a previous run
/// carry ids no live pending entry will ever match, so they are deleted
/// before the first send. Returns how many files were removed.
pub fn sweep_stale_files(directory: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_transport_file(name) {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Response files currently visible in the drop directory, with their ids.
pub fn scan_response_files(directory: &Path) -> std::io::Result<Vec<(u64, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(id) = name.to_str().and_then(parse_response_id) {
            found.push((id, entry.path()));
        }
    }
    Ok(found)
}

/// The external process may still be writing when the file first appears;
/// reads go through the bounded retry loop.
pub fn read_with_retry(path: &Path, attempts: u32, delay: Duration) -> std::io::Result<String> {
    retry_io(attempts, delay, || fs::read_to_string(path))
}

pub fn delete_with_retry(path: &Path, attempts: u32, delay: Duration) -> std::io::Result<()> {
    retry_io(attempts, delay, || fs::remove_file(path))
}
