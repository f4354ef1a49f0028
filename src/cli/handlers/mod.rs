mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::backend::{Backend, StorageArea};
use crate::io::config_io;
use crate::io::file_store::FileStore;
use crate::model::{AppState, Config, Theme};
use crate::store::Store;
use crate::view::ViewModel;

/// File name of the local cache inside the data directory
pub const LOCAL_STORE_FILE: &str = "local.json";

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// One mounted list instance: canonical state plus its view model
pub struct Instance {
    pub store: Store,
    pub view: ViewModel,
}

impl Instance {
    /// Write back pending changes before the instance goes away
    fn unmount(mut self) {
        self.store.flush();
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let dir = data_dir(cli.dir.as_deref())?;

    match cli.command.unwrap_or(Commands::List(ListArgs::default())) {
        Commands::Init(args) => cmd_init(&dir, args),
        Commands::List(args) => cmd_list(&dir, args, json),
        Commands::Add(args) => cmd_add(&dir, args),
        Commands::Done(args) => cmd_done(&dir, args),
        Commands::Prio(args) => cmd_prio(&dir, args),
        Commands::Edit(args) => cmd_edit(&dir, args),
        Commands::Rm(args) => cmd_rm(&dir, args),
        Commands::Clear => cmd_clear(&dir),
        Commands::Theme(args) => cmd_theme(&dir, args),
        Commands::Min(args) => cmd_min(&dir, args),
        Commands::Watch(args) => cmd_watch(&dir, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The data directory: `-C` if given, else the platform data dir
pub fn data_dir(override_dir: Option<&Path>) -> Result<PathBuf, String> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => dirs::data_dir()
            .map(|d| d.join("pinlist"))
            .ok_or_else(|| "could not determine a data directory; pass -C <dir>".to_string()),
    }
}

/// Build backends from config, create the store and hydrate it
pub fn mount(dir: &Path) -> Result<Instance, Box<dyn std::error::Error>> {
    let config = config_io::read_config(dir)?;

    let local = if config.storage.local {
        Backend::available(FileStore::new(dir.join(LOCAL_STORE_FILE), StorageArea::Local))
    } else {
        Backend::Unavailable
    };
    let sync: Backend = config_io::sync_path(&config, dir)
        .map(|path| FileStore::new(path, StorageArea::Sync))
        .into();

    let mut store = Store::new(local, sync, system_theme(&config));
    store.hydrate();
    Ok(Instance {
        store,
        view: ViewModel::new(config.view),
    })
}

/// The host's light/dark preference: config override, then `COLORFGBG`
fn system_theme(config: &Config) -> Option<Theme> {
    config.ui.theme.or_else(|| {
        std::env::var("COLORFGBG")
            .ok()
            .and_then(|v| theme_from_colorfgbg(&v))
    })
}

/// `COLORFGBG` is "fg;bg" (sometimes "fg;default;bg"); dark backgrounds are
/// the ANSI colors 0–6 and 8.
pub fn theme_from_colorfgbg(value: &str) -> Option<Theme> {
    let bg: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    Some(if bg <= 6 || bg == 8 {
        Theme::Dark
    } else {
        Theme::Light
    })
}

/// Resolve an exact id or a unique id prefix
pub fn resolve_id(state: &AppState, given: &str) -> Result<String, String> {
    if state.find_task(given).is_some() {
        return Ok(given.to_string());
    }
    let matches: Vec<&str> = state
        .tasks
        .iter()
        .filter(|t| t.id.starts_with(given))
        .map(|t| t.id.as_str())
        .collect();
    match matches.as_slice() {
        [] => Err(format!("no task matches '{}'", given)),
        [id] => Ok(id.to_string()),
        _ => Err(format!("ambiguous id '{}' matches {} tasks", given, matches.len())),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(dir: &Path, args: ListArgs, json: bool) -> CmdResult {
    let mut instance = mount(dir)?;
    let collapse: HashSet<_> = args.collapse.into_iter().collect();
    for category in collapse {
        instance.view.toggle_collapsed(category);
    }

    let state = instance.store.state();
    match args.search {
        Some(query) => {
            let tasks = instance.view.filter(state, &query);
            if json {
                let out = SearchJson {
                    query: &query,
                    tasks,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", render_matches(&query, &tasks));
            }
        }
        None => {
            if json {
                println!("{}", serde_json::to_string_pretty(&list_json(state, &instance.view))?);
            } else {
                print!("{}", render_list(state, &instance.view));
            }
        }
    }
    instance.unmount();
    Ok(())
}

fn cmd_watch(dir: &Path, args: WatchArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    instance.store.flush();
    print!("{}", render_list(instance.store.state(), &instance.view));

    let interval = Duration::from_millis(args.interval.max(10));
    loop {
        thread::sleep(interval);
        if instance.store.poll_changes() {
            println!();
            print!("{}", render_list(instance.store.state(), &instance.view));
        }
        instance.store.flush();
    }
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(dir: &Path, args: AddArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let text = args.text.join(" ");
    let id = instance
        .view
        .add_task(&mut instance.store, &text)
        .ok_or("task text is empty")?;
    println!("{}", short_id(&id));
    instance.unmount();
    Ok(())
}

fn cmd_done(dir: &Path, args: IdArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let id = resolve_id(instance.store.state(), &args.id)?;
    instance.view.toggle_done(&mut instance.store, &id);
    let done = instance
        .store
        .state()
        .find_task(&id)
        .is_some_and(|t| t.done);
    println!("{} {}", if done { "done" } else { "open" }, short_id(&id));
    instance.unmount();
    Ok(())
}

fn cmd_prio(dir: &Path, args: IdArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let id = resolve_id(instance.store.state(), &args.id)?;
    instance.view.cycle_priority(&mut instance.store, &id);
    if let Some(task) = instance.store.state().find_task(&id) {
        println!("{} {}", task.priority, short_id(&id));
    }
    instance.unmount();
    Ok(())
}

fn cmd_edit(dir: &Path, args: EditArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let id = resolve_id(instance.store.state(), &args.id)?;
    let view = &instance.view;
    let store = &mut instance.store;

    if !view.begin_edit(store, &id) {
        return Err(format!("cannot edit '{}'", args.id).into());
    }
    view.update_draft(store, &args.text.join(" "));
    view.commit_edit(store);

    match store.state().find_task(&id) {
        Some(task) => println!("{} {}", short_id(&id), task.text),
        None => println!("deleted {}", short_id(&id)),
    }
    instance.unmount();
    Ok(())
}

fn cmd_rm(dir: &Path, args: IdArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let id = resolve_id(instance.store.state(), &args.id)?;
    instance.view.remove_task(&mut instance.store, &id);
    println!("deleted {}", short_id(&id));
    instance.unmount();
    Ok(())
}

fn cmd_clear(dir: &Path) -> CmdResult {
    let mut instance = mount(dir)?;
    let before = instance.store.state().tasks.len();
    instance.view.clear_completed(&mut instance.store);
    let removed = before - instance.store.state().tasks.len();
    println!("removed {} completed task(s)", removed);
    instance.unmount();
    Ok(())
}

fn cmd_theme(dir: &Path, args: ThemeArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let view = &instance.view;
    let store = &mut instance.store;
    match args.value {
        Some(ThemeChoice::Light) => {
            view.set_theme(store, Theme::Light);
        }
        Some(ThemeChoice::Dark) => {
            view.set_theme(store, Theme::Dark);
        }
        Some(ThemeChoice::Toggle) => {
            view.toggle_theme(store);
        }
        None => {}
    }
    println!("{}", store.state().theme);
    instance.unmount();
    Ok(())
}

fn cmd_min(dir: &Path, args: MinArgs) -> CmdResult {
    let mut instance = mount(dir)?;
    let view = &instance.view;
    let store = &mut instance.store;
    match args.value {
        Some(Switch::On) => {
            view.set_minimized(store, true);
        }
        Some(Switch::Off) => {
            view.set_minimized(store, false);
        }
        Some(Switch::Toggle) => {
            view.toggle_minimized(store);
        }
        None => {}
    }
    let label = if store.state().minimized {
        "minimized"
    } else {
        "expanded"
    };
    println!("{}", label);
    instance.unmount();
    Ok(())
}
