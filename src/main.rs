//! vidir: a bulk filesystem editor that uses your editor as its UI.
//!
//! List files, edit the listing, save and close the editor; the reconciler
//! then performs the minimal set of renames and deletes implied by your
//! edits, breaking rename cycles and diverting duplicate targets as needed.

mod cli;
mod editor;
mod enumerator;
mod error;
mod listing;
mod pipeline;
mod reconciler;

use anyhow::Result;
use cli::Config;
use editor::EditorBridge;
use structopt::StructOpt;

fn prompt_for_confirmation(summary: &str) -> bool {
    println!("{summary}");
    let input = rprompt::prompt_reply("\nApply these changes? [Y/n] ").unwrap_or_default();
    matches!(input.to_lowercase().as_str(), "y" | "")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::from_args();
    let editor_name = editor::resolve_editor_name(
        config.use_vscode,
        config.editor.clone().or_else(|| std::env::var("EDITOR").ok()),
    );
    let bridge = EditorBridge::new(editor_name);

    let yes = config.yes;
    let confirm: Box<dyn FnOnce(&str) -> bool> = if yes {
        Box::new(|_summary: &str| true)
    } else {
        Box::new(prompt_for_confirmation)
    };

    pipeline::run(&config, |content| bridge.edit(content), confirm)
}
