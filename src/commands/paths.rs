use std::path::{Path, PathBuf};

/// Absolute directory every agent-supplied path is anchored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins an already normalized relative path to the absolute root.
    pub fn resolve(&self, normalized: &str) -> PathBuf {
        self.root.join(normalized)
    }
}

/// Canonicalizes an agent-supplied path into the project-root-relative form:
/// forward slashes, no repeated separators, no `.` segments. `..` is refused
/// outright so the result can never climb out of the root.
pub fn normalize(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("path must be non-empty".to_string());
    }

    let unified = trimmed.replace('\\', "/");
    let mut components = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(format!(
                    "path `{raw}` must stay inside the project root (`..` is not allowed)"
                ))
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return Err(format!("path `{raw}` does not name anything inside the project root"));
    }

    Ok(components.join("/"))
}
