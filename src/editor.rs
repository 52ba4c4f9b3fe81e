//! Editor Bridge (§4.4): spawns the external editor on the listing file and
//! blocks until it exits. Contract only — the reconciler runs against
//! whatever ends up on disk regardless of the exit status.

use crate::error::EditorError;
use std::io::{Read, Write};
use std::process::Command;
use tempfile::NamedTempFile;

#[cfg(target_os = "windows")]
const VS_CODE: &str = "code.cmd";

#[cfg(not(target_os = "windows"))]
const VS_CODE: &str = "code";

/// Picks the editor the same way the teacher's `main` does: explicit
/// `--use-vscode` wins, then `$EDITOR`, then VS Code as a last resort.
pub fn resolve_editor_name(use_vscode: bool, editor_env: Option<String>) -> String {
    match (use_vscode, editor_env) {
        (true, _) => VS_CODE.to_string(),
        (false, Some(editor)) => editor,
        (false, None) => VS_CODE.to_string(),
    }
}

pub struct EditorBridge {
    editor_name: String,
}

impl EditorBridge {
    pub fn new(editor_name: String) -> Self {
        Self { editor_name }
    }

    /// Writes `content` to a scoped temp file, launches the editor on it,
    /// and returns whatever is on disk afterward. The temp file is removed
    /// on every exit path, including early returns via `?`, because
    /// `NamedTempFile` removes itself on drop.
    pub fn edit(&self, content: &str) -> Result<String, EditorError> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{content}")?;
        temp_file.flush()?;

        let temp_path = temp_file.path().to_path_buf();
        let mut command = Command::new(&self.editor_name);
        // VS Code needs --wait or it returns immediately, defeating the
        // "blocks until it exits" contract.
        if self.editor_name == VS_CODE {
            command.arg("--wait");
        }
        let status = command
            .arg(&temp_path)
            .status()
            .map_err(|source| EditorError::Spawn {
                editor: self.editor_name.clone(),
                source,
            })?;
        if !status.success() {
            // Not fatal: the editor may have legitimately saved-and-failed,
            // or been interrupted after partial edits. The reconciler still
            // runs against whatever is on disk (§4.4).
            log::warn!(
                "editor `{}` exited with a non-zero status; proceeding with the file as saved",
                self.editor_name
            );
        }

        let mut edited = String::new();
        std::fs::File::open(&temp_path)?.read_to_string(&mut edited)?;
        Ok(edited)
    }
}
