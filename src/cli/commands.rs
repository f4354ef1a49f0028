use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::Category;

#[derive(Parser)]
#[command(name = "pl", about = concat!("pinlist v", env!("CARGO_PKG_VERSION"), " - a pinned task list that stays in sync"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter pinlist.toml into the data directory
    Init(InitArgs),
    /// Show the task list (default)
    List(ListArgs),
    /// Add a task
    Add(AddArgs),
    /// Toggle a task done / not done
    Done(IdArgs),
    /// Cycle a task's priority (low → medium → high → low)
    Prio(IdArgs),
    /// Replace a task's text (empty text deletes it)
    Edit(EditArgs),
    /// Delete a task
    Rm(IdArgs),
    /// Delete every completed task
    Clear,
    /// Show or change the theme
    Theme(ThemeArgs),
    /// Show or change the minimized flag
    Min(MinArgs),
    /// Keep an instance open and re-print the list on every change
    Watch(WatchArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Path of a synchronized store file shared with other machines
    #[arg(long)]
    pub sync: Option<PathBuf>,
    /// Overwrite an existing pinlist.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Only tasks whose text matches this pattern (case-insensitive regex)
    #[arg(long)]
    pub search: Option<String>,
    /// Fold a category group shut (repeatable)
    #[arg(long, value_parser = parse_category)]
    pub collapse: Vec<Category>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text; prefix with "bug:", "feature:" or "design:" to categorize
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct IdArgs {
    /// Task id, or any unique prefix of it
    pub id: String,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task id, or any unique prefix of it
    pub id: String,
    /// New text
    #[arg(num_args = 0..)]
    pub text: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ThemeChoice {
    Light,
    Dark,
    Toggle,
}

#[derive(Args)]
pub struct ThemeArgs {
    pub value: Option<ThemeChoice>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
    Toggle,
}

#[derive(Args)]
pub struct MinArgs {
    pub value: Option<Switch>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 250)]
    pub interval: u64,
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse_category(&s.to_lowercase())
        .ok_or_else(|| format!("unknown category '{}' (bug, feature, design, other)", s))
}
