use clap::{Parser, Subcommand};
use smartscript_cli::commands::{self, SignalArgs, SignalKind};
use smartscript_cli::logging;
use smartscript_cli::readline;
use smartscript_cli::CliContext;
use smartscript_core::Position;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), String> {
    logging::init();
    let ctx = CliContext::new();

    // Load the configured rules directory if there is one
    if let Err(e) = commands::load_rules(None, &ctx).await {
        println!("{e}");
    }

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    ctx.tasks.lock().await.stop_watcher();
    Ok(())
}

#[derive(Parser)]
#[command(version, about = "smartscript rule sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load rule tables (file or directory) into the simulation
    Load {
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Print every diagnostic for a file or directory
    Validate {
        #[arg(short, long)]
        path: Option<String>,
    },
    /// List the rules of an entity link
    Rules {
        entry: i64,
        #[arg(short, long, default_value_t = 0)]
        source_type: u32,
    },
    Spawn {
        entry: u32,
        #[arg(default_value_t = 0.0)]
        x: f32,
        #[arg(default_value_t = 0.0)]
        y: f32,
        #[arg(default_value_t = 0.0)]
        z: f32,
    },
    SpawnPlayer {
        #[arg(default_value_t = 0.0)]
        x: f32,
        #[arg(default_value_t = 0.0)]
        y: f32,
        #[arg(default_value_t = 0.0)]
        z: f32,
    },
    /// Deliver a signal to an entity's script
    Signal {
        handle: u64,
        #[arg(value_enum)]
        kind: SignalKind,
        #[arg(short, long)]
        invoker: Option<u64>,
        #[arg(short, long, default_value_t = 0)]
        value: u32,
        #[arg(short, long, default_value_t = 0)]
        field: u32,
    },
    /// Advance the simulation
    Tick {
        #[arg(short, long)]
        ms: Option<u32>,
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    Health {
        handle: u64,
        pct: u32,
    },
    Threat {
        owner: u64,
        target: u64,
        #[arg(default_value_t = 1.0)]
        amount: f32,
    },
    /// Fire a rule now, ignoring its trigger and chance
    Fire {
        handle: u64,
        rule: u32,
    },
    Despawn {
        handle: u64,
    },
    Show {
        handle: u64,
    },
    /// Print and clear the commands performed so far
    Commands,
    /// Remove every spawned entity
    Clear,
    Watch,
    Unwatch,
    Config,
    SetDirectory {
        #[arg(short, long)]
        path: String,
    },
    SetTick {
        ms: u32,
    },
    SetSeed {
        seed: Option<u64>,
    },
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "smartscript".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match cli.command {
        Some(Commands::Load { path }) => commands::load_rules(path.as_deref(), ctx).await?,
        Some(Commands::Validate { path }) => commands::validate(path.as_deref(), ctx).await?,
        Some(Commands::Rules { entry, source_type }) => {
            commands::list_rules(entry, source_type, ctx).await?
        }
        Some(Commands::Spawn { entry, x, y, z }) => {
            commands::spawn(entry, Position::new(x, y, z, 0.0), ctx).await?
        }
        Some(Commands::SpawnPlayer { x, y, z }) => {
            commands::spawn_player(Position::new(x, y, z, 0.0), ctx).await?
        }
        Some(Commands::Signal { handle, kind, invoker, value, field }) => {
            let args = SignalArgs { invoker, value, field };
            commands::signal(handle, kind, args, ctx).await?
        }
        Some(Commands::Tick { ms, count }) => commands::tick(ms, count, ctx).await?,
        Some(Commands::Health { handle, pct }) => commands::set_health(handle, pct, ctx).await?,
        Some(Commands::Threat { owner, target, amount }) => {
            commands::add_threat(owner, target, amount, ctx).await?
        }
        Some(Commands::Fire { handle, rule }) => commands::force_fire(handle, rule, ctx).await?,
        Some(Commands::Despawn { handle }) => commands::despawn(handle, ctx).await?,
        Some(Commands::Show { handle }) => commands::show_entity(handle, ctx).await?,
        Some(Commands::Commands) => commands::show_commands(ctx).await?,
        Some(Commands::Clear) => commands::reset_simulation(ctx).await?,
        Some(Commands::Watch) => commands::watch(ctx).await?,
        Some(Commands::Unwatch) => commands::unwatch(ctx).await?,
        Some(Commands::Config) => commands::show_settings(ctx).await?,
        Some(Commands::SetDirectory { path }) => commands::set_directory(&path, ctx).await?,
        Some(Commands::SetTick { ms }) => commands::set_tick(ms, ctx).await?,
        Some(Commands::SetSeed { seed }) => commands::set_seed(seed, ctx).await?,
        Some(Commands::Exit) => {
            commands::exit()?;
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
