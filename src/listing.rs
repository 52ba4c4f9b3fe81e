//! The id-prefixed textual listing handed to the editor, and parsing it back.
//!
//! Format (§6): `<id><TAB><path><LF>`, UTF-8, `\n` on write, `\r\n` tolerated
//! on read. The `id` is the only stable correlator between the pre-edit and
//! post-edit state; paths are compared literally once the `./` display
//! prefix is stripped.

use crate::error::ParseWarning;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One path assigned a stable id by the Enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: u32,
    pub path: PathBuf,
}

/// An ordered sequence of entries sharing the enumerator's id space.
#[derive(Debug, Clone, Default)]
pub struct Listing(pub Vec<Entry>);

impl Listing {
    pub fn pre_map(&self) -> HashMap<u32, PathBuf> {
        self.0.iter().map(|e| (e.id, e.path.clone())).collect()
    }
}

/// Adds the `./` display prefix for relative paths that don't already carry
/// one, so the editor's view reads as a clean relative listing (§6).
pub fn display_path(path: &Path) -> String {
    let rendered = path.to_string_lossy().into_owned();
    if path.is_absolute() || rendered.starts_with("./") || rendered.starts_with("../") {
        rendered
    } else {
        format!("./{rendered}")
    }
}

/// Strips the `./` display prefix for literal comparison against the
/// originally enumerated path.
pub fn strip_display_prefix(rendered: &str) -> PathBuf {
    PathBuf::from(rendered.strip_prefix("./").unwrap_or(rendered))
}

/// Serializes a listing into the editable buffer (§4.1, the Listing Writer).
///
/// Paths are never quoted or escaped; a path containing `\n` cannot
/// round-trip through this line-oriented format and is rejected earlier, at
/// enumeration time.
pub fn serialize(listing: &Listing) -> String {
    let mut buf = String::new();
    for entry in &listing.0 {
        buf.push_str(&entry.id.to_string());
        buf.push('\t');
        buf.push_str(&display_path(&entry.path));
        buf.push('\n');
    }
    buf
}

/// Parses the edited buffer into `id -> path`, per §4.2.
///
/// Unknown ids and empty paths are collected as warnings, not errors: the
/// caller logs and discards them. An id absent from the returned map (but
/// present in `known_ids`) denotes deletion, per the pre/post invariant.
pub fn parse(content: &str, known_ids: &std::collections::HashSet<u32>) -> (HashMap<u32, PathBuf>, Vec<ParseWarning>) {
    let mut post_map = HashMap::new();
    let mut warnings = Vec::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.trim().is_empty() {
            continue;
        }

        let digits_end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
        if digits_end == 0 {
            warnings.push(ParseWarning::Malformed {
                line_no,
                reason: "line does not start with an id".to_string(),
            });
            continue;
        }
        let id: u32 = match line[..digits_end].parse() {
            Ok(id) => id,
            Err(_) => {
                warnings.push(ParseWarning::Malformed {
                    line_no,
                    reason: "id is not a valid positive integer".to_string(),
                });
                continue;
            }
        };

        // Accept any run of horizontal whitespace as the separator, to be
        // forgiving of editors that retab (§9 Design Notes).
        let rest = &line[digits_end..];
        let sep_end = rest.find(|c: char| c != ' ' && c != '\t').unwrap_or(rest.len());
        let path_str = &rest[sep_end..];

        if path_str.is_empty() {
            warnings.push(ParseWarning::EmptyPath { line_no });
            continue;
        }
        if !known_ids.contains(&id) {
            warnings.push(ParseWarning::UnknownId { line_no, id });
            continue;
        }

        post_map.insert(id, strip_display_prefix(path_str));
    }

    (post_map, warnings)
}
