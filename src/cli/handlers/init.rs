use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::commands::InitArgs;
use crate::io::config_io::CONFIG_FILE;

const CONFIG_TEMPLATE: &str = r##"[storage]
# keep a local cache in this directory
local = true
{sync}

[view]
group_by = "category"             # "category" or "none"
sort_by_priority = false           # rank high > medium > low before age

[ui]
# Overrides the terminal's light/dark detection when nothing is stored yet.
# theme = "dark"                  # "light" or "dark"
"##;

const SYNC_COMMENT: &str = "# shared store file, e.g. on a synced drive\n# sync = \"/path/to/pinlist-sync.json\"";

/// Render pinlist.toml, with a live `sync` line when a path is given
fn render_config(sync: Option<&Path>) -> String {
    let sync_line = match sync {
        Some(path) => {
            let quoted = toml::Value::String(path.to_string_lossy().into_owned()).to_string();
            format!("# shared store file, e.g. on a synced drive\nsync = {}", quoted)
        }
        None => SYNC_COMMENT.to_string(),
    };
    CONFIG_TEMPLATE.replace("{sync}", &sync_line)
}

pub fn cmd_init(dir: &Path, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path: PathBuf = dir.join(CONFIG_FILE);
    if path.exists() && !args.force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }

    fs::create_dir_all(dir)?;
    fs::write(&path, render_config(args.sync.as_deref()))?;

    println!("Wrote {}", path.display());
    if let Some(sync) = &args.sync {
        println!("  sync: {}", sync.display());
    }
    Ok(())
}
