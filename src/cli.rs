//! CLI surface. Out of scope for the core reconciler per spec §1, but a
//! shippable binary still needs one; this mirrors the teacher's
//! `BumvConfiguration` flag set, extended with `--editor` and `-y`.

use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "vidir",
    about = "Bulk rename and delete files by editing a text listing in your editor."
)]
pub struct Config {
    /// Recursively enumerate files in subdirectories
    #[structopt(short, long)]
    pub recursive: bool,

    /// Do not observe ignore files (.gitignore, .ignore, ...)
    #[structopt(short, long)]
    pub no_ignore: bool,

    /// Do not write a log file of the renames performed
    #[structopt(long)]
    pub no_log: bool,

    /// Use VS Code as the editor (passes --wait)
    #[structopt(short = "c", long)]
    pub use_vscode: bool,

    /// Override $EDITOR
    #[structopt(long)]
    pub editor: Option<String>,

    /// Skip the confirmation prompt
    #[structopt(short = "y", long)]
    pub yes: bool,

    /// Files or directories to list; defaults to the current directory
    #[structopt(parse(from_os_str))]
    pub paths: Vec<PathBuf>,
}
