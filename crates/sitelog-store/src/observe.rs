//! Subscription registry for push-based query results.
//!
//! One `tokio::sync::watch` channel per query shape. A subscriber always
//! holds the latest full result set; the store republishes after every
//! commit that can change membership or ordering of a live query.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::logs::LogWithImages;
use crate::projects::Project;

/// Shape of an observable query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// All projects, most recently updated first.
    Projects,
    /// Active logs of a project, newest date first.
    ActiveLogs(i64),
    /// Trashed logs of a project, most recently trashed first.
    Trash(i64),
}

impl QueryKey {
    /// Project a log query is scoped to.
    #[must_use]
    pub const fn project_id(self) -> Option<i64> {
        match self {
            Self::Projects => None,
            Self::ActiveLogs(p) | Self::Trash(p) => Some(p),
        }
    }
}

/// What a committed mutation may have changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Project rows only.
    Projects,
    /// Logs of the listed projects.
    Logs(Vec<i64>),
    /// Anything; every live query is recomputed.
    Everything,
}

impl Change {
    /// Whether `key` must be recomputed after this change.
    #[must_use]
    pub fn affects(&self, key: QueryKey) -> bool {
        match (self, key) {
            (Self::Everything, _) | (Self::Projects, QueryKey::Projects) => true,
            (Self::Logs(projects), key) => key
                .project_id()
                .is_some_and(|p| projects.contains(&p)),
            (Self::Projects, _) => false,
        }
    }
}

/// Live channels, keyed by query shape.
#[derive(Debug, Default)]
pub struct Observers {
    projects: Option<watch::Sender<Vec<Project>>>,
    logs: HashMap<QueryKey, watch::Sender<Vec<LogWithImages>>>,
}

impl Observers {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the project list. The receiver starts at `current`.
    pub fn subscribe_projects(&mut self, current: Vec<Project>) -> watch::Receiver<Vec<Project>> {
        match &self.projects {
            Some(sender) if !sender.is_closed() => {
                replace_if_changed(sender, current);
                sender.subscribe()
            }
            _ => {
                let (sender, receiver) = watch::channel(current);
                self.projects = Some(sender);
                receiver
            }
        }
    }

    /// Subscribe to a log query. The receiver starts at `current`.
    ///
    /// `key` must not be [`QueryKey::Projects`]; such a call gets a receiver
    /// that never changes.
    pub fn subscribe_logs(
        &mut self,
        key: QueryKey,
        current: Vec<LogWithImages>,
    ) -> watch::Receiver<Vec<LogWithImages>> {
        if key == QueryKey::Projects {
            return watch::channel(current).1;
        }
        if let Some(sender) = self.logs.get(&key).filter(|s| !s.is_closed()) {
            replace_if_changed(sender, current);
            return sender.subscribe();
        }
        let (sender, receiver) = watch::channel(current);
        self.logs.insert(key, sender);
        receiver
    }

    /// Drop channels nobody listens to any more.
    pub fn prune(&mut self) {
        if self.projects.as_ref().is_some_and(watch::Sender::is_closed) {
            self.projects = None;
        }
        self.logs.retain(|_, sender| !sender.is_closed());
    }

    /// Live keys touched by `change`, after pruning.
    pub fn affected(&mut self, change: &Change) -> Vec<QueryKey> {
        self.prune();
        let mut keys = Vec::new();
        if self.projects.is_some() && change.affects(QueryKey::Projects) {
            keys.push(QueryKey::Projects);
        }
        keys.extend(self.logs.keys().copied().filter(|k| change.affects(*k)));
        keys
    }

    /// Publish a fresh project list.
    pub fn publish_projects(&self, value: Vec<Project>) {
        if let Some(sender) = &self.projects {
            replace_if_changed(sender, value);
        }
    }

    /// Publish a fresh result set for a log query.
    pub fn publish_logs(&self, key: QueryKey, value: Vec<LogWithImages>) {
        if let Some(sender) = self.logs.get(&key) {
            replace_if_changed(sender, value);
        }
    }

    /// Number of live channels, projects included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs
            .len()
            .saturating_add(usize::from(self.projects.is_some()))
    }

    /// `true` when no channel is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store `value` and wake receivers only when it differs from the current one.
fn replace_if_changed<T: PartialEq>(sender: &watch::Sender<T>, value: T) {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
