use crate::CliContext;
use smartscript_core::watcher::{RuleDirectoryWatcher, RuleFileEvent};
use smartscript_core::load_rules_from_dir;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

/// Start watching the configured rules directory; every change reloads the
/// whole directory into the running simulation.
pub async fn init_watcher(ctx: &CliContext) -> Option<JoinHandle<()>> {
    let dir = {
        let config = ctx.config.read().await;
        PathBuf::from(&config.rules_directory)
    };

    if !dir.is_dir() {
        println!("Warning: Rules directory {} does not exist", dir.display());
        return None;
    }

    let mut watcher = match RuleDirectoryWatcher::new(&dir) {
        Ok(w) => w,
        Err(e) => {
            println!("Failed to start rules watcher: {}", e);
            return None;
        }
    };

    println!("Watching directory: {}", dir.display());

    // Clone context for the spawned task
    let watcher_ctx = ctx.clone();
    let handle = tokio::spawn(async move {
        while let Some(event) = watcher.next_event().await {
            handle_watcher_event(event, watcher.root(), &watcher_ctx).await;
        }
    });

    Some(handle)
}

async fn handle_watcher_event(event: RuleFileEvent, root: &Path, ctx: &CliContext) {
    match event {
        RuleFileEvent::Changed(path) => {
            println!("Rule table changed: {}", path.display());
            reload(root, ctx).await;
        }

        RuleFileEvent::Removed(path) => {
            println!("Rule table removed: {}", path.display());
            reload(root, ctx).await;
        }

        RuleFileEvent::Error(err) => {
            println!("Error: {}", err);
        }
    }
}

async fn reload(root: &Path, ctx: &CliContext) {
    let root = root.to_path_buf();
    // Parsing is blocking work; keep it off the runtime threads
    let report = match tokio::task::spawn_blocking(move || load_rules_from_dir(&root)).await {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            println!("Reload failed: {}", e);
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "reload task failed");
            return;
        }
    };

    if report.error_count() > 0 {
        for diag in report.diagnostics.iter().filter(|d| d.is_error()) {
            println!("{}", diag);
        }
    }
    println!(
        "Reloaded {} rules ({} errors)",
        report.store.rule_count(),
        report.error_count()
    );
    ctx.install_store(report.store).await;
}
