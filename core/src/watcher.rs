//! Rule directory watching
//!
//! Forwards `notify` events for `*.toml` rule tables through a tokio channel
//! so a host can reload its [`RuleStore`](crate::dsl::RuleStore) on change.

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to initialize file watcher")]
    Init(#[source] notify::Error),

    #[error("failed to watch path {path}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleFileEvent {
    /// Created or modified
    Changed(PathBuf),
    Removed(PathBuf),
    Error(String),
}

pub struct RuleDirectoryWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    rx: Receiver<notify::Result<Event>>,
}

impl RuleDirectoryWatcher {
    pub fn new(path: &Path) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::channel(100);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            Config::default(),
        )
        .map_err(WatcherError::Init)?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::WatchPath {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            _watcher: watcher,
            root: path.to_path_buf(),
            rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for the next event touching a rule table. `None` once the
    /// underlying watcher has shut down.
    pub async fn next_event(&mut self) -> Option<RuleFileEvent> {
        while let Some(event_result) = self.rx.recv().await {
            match event_result {
                Ok(event) => {
                    if let Some(rule_event) = classify(event) {
                        return Some(rule_event);
                    }
                }
                Err(e) => {
                    return Some(RuleFileEvent::Error(format!("Rule watcher error: {}", e)));
                }
            }
        }
        None
    }
}

fn classify(event: Event) -> Option<RuleFileEvent> {
    let path = event.paths.into_iter().find(|p| is_rule_table(p))?;
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            tracing::debug!(path = %path.display(), "rule table changed");
            Some(RuleFileEvent::Changed(path))
        }
        EventKind::Remove(_) => Some(RuleFileEvent::Removed(path)),
        _ => None,
    }
}

pub fn is_rule_table(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

#[cfg(test)]
mod tests {
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    use super::*;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_toml_files_are_reported() {
        assert_eq!(
            classify(event(EventKind::Create(CreateKind::File), "rules/boss.toml")),
            Some(RuleFileEvent::Changed(PathBuf::from("rules/boss.toml")))
        );
        assert_eq!(classify(event(EventKind::Create(CreateKind::File), "rules/notes.txt")), None);
    }

    #[test]
    fn event_kinds_map_to_rule_events() {
        assert_eq!(
            classify(event(EventKind::Modify(ModifyKind::Any), "a.toml")),
            Some(RuleFileEvent::Changed(PathBuf::from("a.toml")))
        );
        assert_eq!(
            classify(event(EventKind::Remove(RemoveKind::File), "a.toml")),
            Some(RuleFileEvent::Removed(PathBuf::from("a.toml")))
        );
        assert_eq!(classify(event(EventKind::Access(notify::event::AccessKind::Any), "a.toml")), None);
    }
}
