use clap::ValueEnum;
use smartscript_core::{
    AppConfigExt, EntityHandle, EntityLink, FiredRule, LoadReport, PhaseGate, Position, SourceType,
    WorldSignal, load_rules_from_dir, load_rules_from_file,
};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::CliContext;
use crate::dir_watcher;

/// Signals that can be delivered from the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignalKind {
    Aggro,
    Death,
    Kill,
    Evade,
    ReachedHome,
    Respawn,
    Reset,
    Despawn,
    Charmed,
    Uncharmed,
    Damaged,
    SpellHit,
    Emote,
    GossipHello,
    DataSet,
}

/// Parameters shared by the `signal` command
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalArgs {
    pub invoker: Option<u64>,
    pub value: u32,
    pub field: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule tables
// ─────────────────────────────────────────────────────────────────────────────

fn load_path(path: &Path) -> Result<LoadReport, String> {
    let report = if path.is_file() {
        load_rules_from_file(path)
    } else {
        load_rules_from_dir(path)
    };
    report.map_err(|e| e.to_string())
}

fn print_report(report: &LoadReport, verbose: bool) {
    for failed in &report.failed_files {
        println!("failed: {}", failed);
    }
    for diag in &report.diagnostics {
        if verbose || diag.is_error() {
            println!("{}", diag);
        }
    }
    println!(
        "{} files, {} rule sets, {} rules ({} errors, {} warnings)",
        report.files,
        report.store.len(),
        report.store.rule_count(),
        report.error_count(),
        report.warning_count()
    );
}

async fn resolve_path(path: Option<&str>, ctx: &CliContext) -> Result<PathBuf, String> {
    let path = match path {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(&ctx.config.read().await.rules_directory),
    };
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()));
    }
    Ok(path)
}

/// Load rule tables and install them into the simulation.
pub async fn load_rules(path: Option<&str>, ctx: &CliContext) -> Result<(), String> {
    let path = resolve_path(path, ctx).await?;
    let report = load_path(&path)?;
    print_report(&report, false);
    ctx.install_store(report.store).await;
    Ok(())
}

/// Load rule tables and print every diagnostic without installing them.
pub async fn validate(path: Option<&str>, ctx: &CliContext) -> Result<(), String> {
    let path = resolve_path(path, ctx).await?;
    let report = load_path(&path)?;
    print_report(&report, true);
    Ok(())
}

pub async fn list_rules(entry: i64, source_type: u32, ctx: &CliContext) -> Result<(), String> {
    let source_type =
        SourceType::from_id(source_type).ok_or(format!("unknown source type {source_type}"))?;
    let link = EntityLink::new(entry, source_type);

    let sim = ctx.simulation.lock().await;
    let set = sim
        .store()
        .for_link(&link)
        .ok_or(format!("no rules for {link}"))?;

    println!("{:<5} {:<22} {:<10} {:<24} Comment", "Id", "Event", "Phase", "Actions");
    println!("{}", "-".repeat(80));
    for rule in set.rules() {
        let phase = match rule.event.phase {
            PhaseGate::Always => "always".to_string(),
            PhaseGate::Phases(mask) => mask.to_string(),
        };
        let actions: Vec<&str> = rule.actions.iter().map(|s| s.action.name()).collect();
        let link_to = rule.link_to.map(|l| format!(" -> {l}")).unwrap_or_default();
        println!(
            "{:<5} {:<22} {:<10} {:<24} {}{}",
            rule.id,
            rule.event.event.name(),
            phase,
            actions.join(","),
            rule.comment,
            link_to
        );
    }
    println!("\nTotal: {} rules", set.len());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulation
// ─────────────────────────────────────────────────────────────────────────────

fn print_fired(handle: EntityHandle, fired: &[FiredRule]) {
    for f in fired {
        println!(
            "{handle} fired {}#{} (depth {}, {} commands)",
            f.link, f.rule_id, f.depth, f.commands
        );
    }
}

pub async fn spawn(entry: u32, position: Position, ctx: &CliContext) -> Result<(), String> {
    let mut sim = ctx.simulation.lock().await;
    let (handle, fired) = sim.spawn_creature(entry, position);
    let scripted = if sim.script(handle).is_some() { "" } else { " (no rules)" };
    println!("spawned creature {entry} as {handle}{scripted}");
    print_fired(handle, &fired);
    Ok(())
}

pub async fn spawn_player(position: Position, ctx: &CliContext) -> Result<(), String> {
    let handle = ctx.simulation.lock().await.spawn_player(position);
    println!("spawned player as {handle}");
    Ok(())
}

fn build_signal(kind: SignalKind, args: SignalArgs) -> Result<WorldSignal, String> {
    let invoker = args.invoker.map(EntityHandle);
    let required = || invoker.ok_or_else(|| format!("signal {kind:?} needs --invoker"));

    Ok(match kind {
        SignalKind::Aggro => WorldSignal::Aggro { invoker: required()? },
        SignalKind::Death => WorldSignal::Death { killer: invoker },
        SignalKind::Kill => WorldSignal::Kill {
            victim: required()?,
            victim_entry: args.value,
            victim_is_player: args.value == 0,
        },
        SignalKind::Evade => WorldSignal::Evade,
        SignalKind::ReachedHome => WorldSignal::ReachedHome,
        SignalKind::Respawn => WorldSignal::Respawn,
        SignalKind::Reset => WorldSignal::Reset,
        SignalKind::Despawn => WorldSignal::Despawn,
        SignalKind::Charmed => WorldSignal::Charmed { charmer: invoker, applied: true },
        SignalKind::Uncharmed => WorldSignal::Charmed { charmer: invoker, applied: false },
        SignalKind::Damaged => WorldSignal::Damaged { attacker: required()?, amount: args.value },
        SignalKind::SpellHit => WorldSignal::SpellHit {
            caster: required()?,
            spell: args.value,
            school_mask: 0,
        },
        SignalKind::Emote => WorldSignal::ReceiveEmote { invoker: required()?, emote: args.value },
        SignalKind::GossipHello => WorldSignal::GossipHello { invoker: required()? },
        SignalKind::DataSet => WorldSignal::DataSet {
            field: args.field,
            value: args.value,
            invoker,
        },
    })
}

pub async fn signal(handle: u64, kind: SignalKind, args: SignalArgs, ctx: &CliContext) -> Result<(), String> {
    let handle = EntityHandle(handle);
    let signal = build_signal(kind, args)?;
    let mut sim = ctx.simulation.lock().await;

    // Keep the sandbox's combat flag in line with combat lifecycle signals
    match &signal {
        WorldSignal::Aggro { invoker } => sim.world.add_threat(handle, *invoker, 1.0),
        s if s.ends_combat() => sim.world.set_in_combat(handle, false),
        WorldSignal::Charmed { applied, .. } => sim.world.set_charmed(handle, *applied),
        _ => {}
    }

    let fired = sim
        .signal(handle, &signal)
        .ok_or(format!("{handle} has no script"))?;
    print_fired(handle, &fired);
    Ok(())
}

pub async fn tick(ms: Option<u32>, count: u32, ctx: &CliContext) -> Result<(), String> {
    let step = match ms {
        Some(ms) => ms,
        None => ctx.config.read().await.tick_ms,
    };
    let mut sim = ctx.simulation.lock().await;
    for _ in 0..count {
        for (handle, fired) in sim.tick(step) {
            print_fired(handle, std::slice::from_ref(&fired));
        }
    }
    println!("clock: {}ms", sim.clock_ms());
    Ok(())
}

pub async fn set_health(handle: u64, pct: u32, ctx: &CliContext) -> Result<(), String> {
    if pct > 100 {
        return Err("health must be 0..=100".to_string());
    }
    let handle = EntityHandle(handle);
    let mut sim = ctx.simulation.lock().await;
    sim.world.get(handle).ok_or(format!("unknown entity {handle}"))?;
    sim.world.set_health_pct(handle, pct);
    Ok(())
}

pub async fn add_threat(owner: u64, target: u64, amount: f32, ctx: &CliContext) -> Result<(), String> {
    let (owner, target) = (EntityHandle(owner), EntityHandle(target));
    let mut sim = ctx.simulation.lock().await;
    sim.world.get(owner).ok_or(format!("unknown entity {owner}"))?;
    sim.world.get(target).ok_or(format!("unknown entity {target}"))?;
    sim.world.add_threat(owner, target, amount);
    Ok(())
}

pub async fn force_fire(handle: u64, rule_id: u32, ctx: &CliContext) -> Result<(), String> {
    let handle = EntityHandle(handle);
    let mut sim = ctx.simulation.lock().await;
    let fired = sim
        .force_fire(handle, rule_id)
        .ok_or(format!("{handle} has no rule {rule_id}"))?;
    print_fired(handle, &fired);
    Ok(())
}

pub async fn despawn(handle: u64, ctx: &CliContext) -> Result<(), String> {
    let handle = EntityHandle(handle);
    let mut sim = ctx.simulation.lock().await;
    sim.world.get(handle).ok_or(format!("unknown entity {handle}"))?;
    let fired = sim.despawn(handle);
    print_fired(handle, &fired);
    println!("despawned {handle}");
    Ok(())
}

pub async fn show_entity(handle: u64, ctx: &CliContext) -> Result<(), String> {
    let handle = EntityHandle(handle);
    let sim = ctx.simulation.lock().await;
    let entity = sim.world.get(handle).ok_or(format!("unknown entity {handle}"))?;

    println!(
        "{handle} {:?} entry {} at ({:.1}, {:.1}, {:.1}) hp {}% {}{}",
        entity.info.kind,
        entity.info.entry,
        entity.info.position.x,
        entity.info.position.y,
        entity.info.position.z,
        entity.info.health_pct(),
        if entity.in_combat { "in combat" } else { "idle" },
        if entity.info.alive { "" } else { " (dead)" },
    );

    let Some(script) = sim.script(handle) else {
        println!("no script");
        return Ok(());
    };
    let state = script.state();
    println!("phase: {}", script.phase());

    let mut counters: Vec<_> = state.counters.iter().collect();
    counters.sort();
    for (id, value) in counters {
        println!("counter {id} = {value}");
    }

    let mut timers: Vec<_> = state.rule_timers.iter().collect();
    timers.sort_by_key(|(id, _)| **id);
    for (id, timer) in timers {
        let status = if timer.exhausted { " (done)" } else { "" };
        println!("timer rule {id}: {}/{}ms{status}", timer.elapsed, timer.next_fire_at);
    }

    for event in state.timed_events.values() {
        println!("timed event {}: {}/{}ms", event.id, event.elapsed, event.next_fire_at);
    }
    for list in script.timed_lists() {
        println!(
            "timed list {}: step {}/{} ({:?})",
            list.list_id(),
            list.cursor(),
            list.rules().len(),
            list.mode()
        );
    }
    Ok(())
}

pub async fn show_commands(ctx: &CliContext) -> Result<(), String> {
    let commands = ctx.simulation.lock().await.take_commands();
    if commands.is_empty() {
        println!("No commands recorded");
        return Ok(());
    }
    for command in &commands {
        println!("{command:?}");
    }
    println!("\nTotal: {} commands", commands.len());
    Ok(())
}

pub async fn reset_simulation(ctx: &CliContext) -> Result<(), String> {
    ctx.reset_simulation().await;
    println!("simulation cleared");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

pub async fn show_settings(ctx: &CliContext) -> Result<(), String> {
    let config = ctx.config.read().await;
    if let Some(path) = smartscript_core::AppConfig::config_path() {
        println!("config file: {}", path.display());
    }
    println!("rules directory: {}", config.rules_directory);
    println!("tick: {}ms", config.tick_ms);
    println!("max link depth: {}", config.engine.max_link_depth);
    println!("max timed lists: {}", config.engine.max_timed_lists);
    println!("debug rules: {}", config.engine.debug_rules);
    match config.engine.rng_seed {
        Some(seed) => println!("rng seed: {seed}"),
        None => println!("rng seed: random"),
    }
    Ok(())
}

pub async fn set_directory(new_directory: &str, ctx: &CliContext) -> Result<(), String> {
    {
        let mut config = ctx.config.write().await;
        if new_directory == config.rules_directory {
            println!("Rules directory already configured to {}", new_directory);
            return Ok(());
        }
        config
            .set_rules_directory(PathBuf::from(new_directory))
            .map_err(|e| e.to_string())?;
        config.save().map_err(|e| e.to_string())?;
    }

    ctx.tasks.lock().await.stop_watcher();
    load_rules(None, ctx).await?;
    watch(ctx).await
}

pub async fn set_tick(tick_ms: u32, ctx: &CliContext) -> Result<(), String> {
    let mut config = ctx.config.write().await;
    config.set_tick_ms(tick_ms).map_err(|e| e.to_string())?;
    config.save().map_err(|e| e.to_string())
}

pub async fn set_seed(seed: Option<u64>, ctx: &CliContext) -> Result<(), String> {
    {
        let mut config = ctx.config.write().await;
        config.engine.rng_seed = seed;
        config.save().map_err(|e| e.to_string())?;
    }
    // Seeds are read when scripts are created
    ctx.reset_simulation().await;
    println!("simulation cleared");
    Ok(())
}

pub async fn watch(ctx: &CliContext) -> Result<(), String> {
    let mut tasks = ctx.tasks.lock().await;
    if tasks.watcher.is_some() {
        println!("Already watching");
        return Ok(());
    }
    tasks.watcher = dir_watcher::init_watcher(ctx).await;
    Ok(())
}

pub async fn unwatch(ctx: &CliContext) -> Result<(), String> {
    ctx.tasks.lock().await.stop_watcher();
    println!("Stopped watching");
    Ok(())
}

pub fn exit() -> Result<(), String> {
    write!(std::io::stdout(), "quitting...").map_err(|e| e.to_string())?;
    std::io::stdout().flush().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_needing_an_invoker_say_so() {
        let err = build_signal(SignalKind::Aggro, SignalArgs::default()).unwrap_err();
        assert!(err.contains("--invoker"));

        let signal = build_signal(
            SignalKind::Aggro,
            SignalArgs { invoker: Some(4), ..SignalArgs::default() },
        )
        .unwrap();
        assert_eq!(signal, WorldSignal::Aggro { invoker: EntityHandle(4) });
    }

    #[test]
    fn optional_invoker_signals() {
        assert_eq!(
            build_signal(SignalKind::Death, SignalArgs::default()).unwrap(),
            WorldSignal::Death { killer: None }
        );
        let data = build_signal(SignalKind::DataSet, SignalArgs { invoker: None, value: 3, field: 1 }).unwrap();
        assert_eq!(data, WorldSignal::DataSet { field: 1, value: 3, invoker: None });
    }
}
