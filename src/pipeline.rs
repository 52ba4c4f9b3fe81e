//! Wires the five pipeline stages together (§2): enumerate, serialize, hand
//! to the editor, parse the result, reconcile, execute. Takes the editor and
//! confirmation steps as injected closures, the same way the teacher's
//! `bulk_rename` takes `edit_function`/`prompt_function`, so tests can run
//! the whole pipeline without a real editor or terminal.

use crate::cli::Config;
use crate::error::{BumvError, EditorError, ParseWarning};
use crate::listing::{self};
use crate::reconciler::{self, PostMap, PreMap, ReconcilePlan};
use anyhow::Result;
use chrono::Local;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn run(
    config: &Config,
    edit_fn: impl Fn(&str) -> Result<String, EditorError>,
    confirm_fn: impl FnOnce(&str) -> bool,
) -> Result<()> {
    let listing = enumerate(config)?;
    if listing.0.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    let buffer = listing::serialize(&listing);
    let edited_buffer = edit_fn(&buffer).map_err(BumvError::from)?;

    let known_ids: HashSet<u32> = listing.0.iter().map(|e| e.id).collect();
    let (post_map, warnings): (PostMap, Vec<ParseWarning>) = listing::parse(&edited_buffer, &known_ids);
    for warning in &warnings {
        log::warn!("{warning}");
    }
    ensure_listing_was_usable(&edited_buffer, &warnings)?;

    let pre_map: PreMap = listing.pre_map();
    let plan = reconciler::plan(&pre_map, &post_map);

    if plan.is_empty() {
        println!("No changes to apply.");
        return Ok(());
    }

    if !confirm_fn(&plan.human_readable()) {
        println!("Aborted.");
        return Ok(());
    }

    ensure_files_did_not_change(config, &listing)?;

    let errors = reconciler::execute(&plan);
    for error in &errors {
        log::error!("{error}");
    }

    if !config.no_log {
        if let Err(err) = write_log_file(config, &plan) {
            log::warn!("failed to write renaming log file: {err}");
        }
    }

    if errors.is_empty() {
        println!("Files renamed successfully.");
        Ok(())
    } else {
        anyhow::bail!("{} operation(s) failed; see log output above", errors.len());
    }
}

fn enumerate(config: &Config) -> Result<listing::Listing> {
    crate::enumerator::enumerate(&config.paths, config.recursive, config.no_ignore)
        .map_err(|e| BumvError::from(e).into())
}

/// Guards against the directory changing out from under us while the user
/// was in the editor or at the confirmation prompt, the same check the
/// teacher's `RenamingRequest::ensure_files_did_not_change` performs by
/// re-running enumeration and comparing against the snapshot taken at the
/// start of the run. Comparison is by path set, not order, since the
/// enumerator already sorts deterministically.
fn ensure_files_did_not_change(config: &Config, original: &listing::Listing) -> Result<()> {
    let current = enumerate(config)?;
    let original_paths: HashSet<&Path> = original.0.iter().map(|e| e.path.as_path()).collect();
    let current_paths: HashSet<&Path> = current.0.iter().map(|e| e.path.as_path()).collect();
    anyhow::ensure!(
        original_paths == current_paths,
        "the directory changed while you were editing the listing; re-run to see the current state"
    );
    Ok(())
}

/// §7: a malformed line is a per-line warning, not fatal — unless every
/// single non-blank line in the edited buffer failed to parse, which means
/// the editor produced content the parser could not make any sense of at
/// all (as opposed to a legitimate "delete everything" edit, which simply
/// has fewer, blank-separated, well-formed lines).
fn ensure_listing_was_usable(edited_buffer: &str, warnings: &[ParseWarning]) -> Result<()> {
    let non_blank_lines = edited_buffer.lines().filter(|l| !l.trim().is_empty()).count();
    let malformed = warnings
        .iter()
        .filter(|w| matches!(w, ParseWarning::Malformed { .. }))
        .count();
    if non_blank_lines > 0 && malformed == non_blank_lines {
        return Err(BumvError::EmptyListing.into());
    }
    Ok(())
}

/// Writes `vidir_<timestamp>.log` in the first listed base path, a
/// tab-aligned `old<TAB>new` audit trail. Carried over from the teacher's
/// `write_renaming_log_file`; suppressed with `--no-log`.
fn write_log_file(config: &Config, plan: &ReconcilePlan) -> Result<()> {
    if plan.display_renames().is_empty() {
        return Ok(());
    }
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_file_name = format!("vidir_{timestamp}.log");
    let base = config
        .paths
        .first()
        .cloned()
        .unwrap_or_else(|| Path::new(".").to_path_buf());
    let log_dir = if base.is_dir() {
        base
    } else {
        base.parent().unwrap_or_else(|| Path::new(".")).to_path_buf()
    };
    let log_path = log_dir.join(log_file_name);

    let max_len = plan
        .display_renames()
        .iter()
        .map(|(_, from, _)| from.to_string_lossy().len())
        .max()
        .unwrap_or(0);
    let mut content = String::new();
    for (_, from, to) in plan.display_renames() {
        content.push_str(&format!(
            "{:width$}\t{}\n",
            from.to_string_lossy(),
            to.to_string_lossy(),
            width = max_len
        ));
    }
    File::create(&log_path)?.write_all(content.as_bytes())?;
    Ok(())
}
