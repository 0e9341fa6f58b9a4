use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rift_dock::common::config::Config;
use rift_dock::common::log::init_logging;
use rift_dock::layout_engine::Screen;
use rift_dock::{DockEngine, DockId};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "rift-dock", version, about = "Inspect and edit saved dock sessions")]
struct Cli {
    /// Configuration file. Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the default configuration as TOML.
    InitConfig,

    /// Write an empty session: the main dock plus one clip per workspace.
    NewSession {
        path: PathBuf,
        #[arg(long, default_value_t = 1)]
        workspaces: usize,
        #[arg(long, default_value_t = 1920)]
        width: i32,
        #[arg(long, default_value_t = 1080)]
        height: i32,
    },

    /// Dock a new launcher wherever the target dock has room.
    Place {
        path: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        command: Option<String>,
        /// `dock`, `clip` or `drawer:<row>`.
        #[arg(long, default_value = "clip")]
        target: Target,
        /// Workspace whose clip receives the icon. Defaults to the current one.
        #[arg(long)]
        workspace: Option<usize>,
    },

    /// Print every dock and its icons.
    Show { path: PathBuf },

    /// Verify a saved session loads as written and its tables hold.
    Check { path: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Dock,
    Clip,
    Drawer(i32),
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dock" => Ok(Target::Dock),
            "clip" => Ok(Target::Clip),
            _ => s
                .strip_prefix("drawer:")
                .and_then(|row| row.parse().ok())
                .map(Target::Drawer)
                .ok_or_else(|| format!("expected `dock`, `clip` or `drawer:<row>`, got `{s}`")),
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let explicit = path.is_some();
    let Some(path) = path.or_else(Config::default_path) else {
        return Ok(Config::default());
    };
    if !explicit && !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    Config::read(&path).with_context(|| format!("loading {}", path.display()))
}

fn target_dock(
    engine: &DockEngine,
    target: Target,
    workspace: Option<usize>,
) -> anyhow::Result<DockId> {
    match (target, workspace) {
        (Target::Dock, _) => Ok(engine.main_dock()),
        (Target::Clip, None) => Ok(engine.current_clip()),
        (Target::Clip, Some(n)) => match engine.clips().get(n) {
            Some(&clip) => Ok(clip),
            None => bail!("no workspace {n}; the session has {}", engine.clips().len()),
        },
        (Target::Drawer(row), _) => match engine.drawers().iter().find(|(_, r)| *r == row) {
            Some(&(drawer, _)) => Ok(drawer),
            None => bail!("no drawer on row {row}"),
        },
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let settings = load_config(cli.config)?.settings;

    match cli.command {
        Command::InitConfig => print!("{}", Config::default().to_toml()),
        Command::NewSession { path, workspaces, width, height } => {
            if workspaces == 0 {
                bail!("a session needs at least one workspace");
            }
            let mut engine = DockEngine::new(settings, Screen { width, height });
            for _ in 1..workspaces {
                engine.add_workspace();
            }
            engine.save(path.clone())?;
            info!(path = %path.display(), workspaces, "wrote new session");
        }
        Command::Place { path, name, command, target, workspace } => {
            let mut engine = DockEngine::load(path.clone(), settings)?;
            let dock = target_dock(&engine, target, workspace)?;
            let icon = engine.new_icon(name, command);
            let pos = engine.place_icon(dock, icon)?;
            engine.save(path)?;
            println!("{pos}");
        }
        Command::Show { path } => {
            let engine = DockEngine::load(path, settings)?;
            print!("{}", engine.draw_tree());
        }
        Command::Check { path } => {
            let engine = DockEngine::load_strict(path, settings)?;
            engine.check_invariants()?;
            println!("ok");
        }
    }
    Ok(())
}
