//! Walks CLI arguments into the initial, id-assigned [`Listing`] (§4.5).
//!
//! Non-recursive by default: an explicit directory argument contributes its
//! *immediate* entries (files and subdirectories alike) as single listing
//! lines, the same way the classic `vidir` shows an unexpanded directory as
//! one line the user can rename wholesale. `--recursive` instead walks the
//! full tree and lists only files, matching the teacher's `file_list`.

use crate::error::EnumerationError;
use crate::listing::{Entry, Listing};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

pub fn enumerate(
    arguments: &[PathBuf],
    recursive: bool,
    no_ignore: bool,
) -> Result<Listing, EnumerationError> {
    let targets: Vec<PathBuf> = if arguments.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        arguments.to_vec()
    };

    let mut paths = Vec::new();
    for target in &targets {
        if !target.exists() {
            return Err(EnumerationError::NotFound(target.clone()));
        }
        if target.is_file() {
            paths.push(target.clone());
            continue;
        }
        paths.extend(walk_directory(target, recursive, no_ignore)?);
    }

    // Deterministic order regardless of filesystem iteration order.
    paths.sort_by_key(|p| p.to_string_lossy().into_owned());
    paths.dedup();

    for path in &paths {
        if path.to_string_lossy().contains('\n') {
            return Err(EnumerationError::EmbeddedNewline(path.clone()));
        }
    }

    let entries = paths
        .into_iter()
        .enumerate()
        .map(|(idx, path)| Entry {
            id: (idx + 1) as u32,
            path,
        })
        .collect();
    Ok(Listing(entries))
}

fn walk_directory(
    base: &Path,
    recursive: bool,
    no_ignore: bool,
) -> Result<Vec<PathBuf>, EnumerationError> {
    let mut builder = WalkBuilder::new(base);
    builder.standard_filters(!no_ignore);
    if !recursive {
        builder.max_depth(Some(1));
    }
    let walker = builder.build();

    let mut out = Vec::new();
    for result in walker {
        let entry = result.map_err(|source| EnumerationError::Walk {
            path: base.to_path_buf(),
            source,
        })?;
        let path = entry.into_path();
        if path == base {
            continue;
        }
        if recursive {
            if path.is_file() {
                out.push(path);
            }
        } else if path.parent() == Some(base) {
            out.push(path);
        }
    }
    Ok(out)
}
