//! Workload snapshots and watch events.
//!
//! [`WorkloadEvent`] is what the discovery controller consumes. Orchestrator
//! watch streams report every modification of a pod, while the controller only
//! cares about the first sighting and the final removal. [`InformerState`]
//! reduces a raw list/watch stream to those add/remove notifications, and
//! synthesizes removals for pods that disappeared while the watch was relisting.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Container metadata taken from a workload's container statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerMeta {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Image digest.
    pub image_id: String,
}

/// Point-in-time view of a workload (pod).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadInfo {
    /// Namespace.
    pub namespace: String,
    /// Workload name.
    pub name: String,
    /// Instance UID.
    pub uid: String,
    /// Labels.
    pub labels: BTreeMap<String, String>,
    /// Containers from the status block.
    pub containers: Vec<ContainerMeta>,
}

impl WorkloadInfo {
    /// Finds a container by name.
    pub fn container(&self, name: &str) -> Option<&ContainerMeta> {
        self.containers.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for WorkloadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Workload lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEvent {
    /// A workload seen for the first time.
    Added(WorkloadInfo),
    /// A workload that was deleted.
    Removed(WorkloadInfo),
    /// The initial list has been delivered.
    Synced,
}

impl WorkloadEvent {
    /// Metric label for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Removed(_) => "removed",
            Self::Synced => "synced",
        }
    }
}

/// Reduces a list/watch stream to informer-style add/remove events.
///
/// Pods are tracked by UID. Only the first sighting of a UID produces
/// [`WorkloadEvent::Added`]; later updates of the same pod are dropped.
#[derive(Debug, Default)]
pub struct InformerState {
    known: HashMap<String, WorkloadInfo>,
    relisting: Option<HashSet<String>>,
}

impl InformerState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a (re)list.
    pub fn begin_relist(&mut self) {
        self.relisting = Some(HashSet::new());
    }

    /// Records an observed pod and returns `Added` for an unseen UID.
    pub fn observe(&mut self, workload: WorkloadInfo) -> Option<WorkloadEvent> {
        if let Some(seen) = self.relisting.as_mut() {
            seen.insert(workload.uid.clone());
        }
        if self.known.contains_key(&workload.uid) {
            return None;
        }
        self.known.insert(workload.uid.clone(), workload.clone());
        Some(WorkloadEvent::Added(workload))
    }

    /// Records a deletion and returns `Removed` when the UID was tracked.
    pub fn forget(&mut self, workload: WorkloadInfo) -> Option<WorkloadEvent> {
        self.known
            .remove(&workload.uid)
            .map(|_| WorkloadEvent::Removed(workload))
    }

    /// Completes a (re)list.
    ///
    /// Returns removals for tracked pods that the relist did not report,
    /// followed by `Synced`.
    pub fn finish_relist(&mut self) -> Vec<WorkloadEvent> {
        let seen = self.relisting.take().unwrap_or_default();
        let vanished: Vec<String> = self
            .known
            .keys()
            .filter(|uid| !seen.contains(*uid))
            .cloned()
            .collect();

        let mut events: Vec<WorkloadEvent> = vanished
            .into_iter()
            .filter_map(|uid| self.known.remove(&uid))
            .map(WorkloadEvent::Removed)
            .collect();
        events.push(WorkloadEvent::Synced);
        events
    }

    /// Number of tracked pods.
    pub fn tracked(&self) -> usize {
        self.known.len()
    }
}
