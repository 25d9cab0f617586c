use std::collections::BTreeSet;

/// The set of aircraft currently considered spawned
///
/// Mutated once per tick by committing the state `advance` computed; a tick
/// that fails mid-way leaves the previous state untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleState {
    spawned: BTreeSet<String>,
}

/// Spawn/despawn changes between two consecutive ticks
#[derive(Debug, Clone, Default)]
pub struct LifecycleDelta {
    pub spawned: Vec<String>,
    pub despawned: Vec<String>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> &BTreeSet<String> {
        &self.spawned
    }

    pub fn contains(&self, callsign: &str) -> bool {
        self.spawned.contains(callsign)
    }

    pub fn len(&self) -> usize {
        self.spawned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty()
    }

    pub fn clear(&mut self) {
        self.spawned.clear();
    }

    /// Compute the next state from this tick's matched callsigns
    ///
    /// A first-time match is active the same tick; a dropped match is
    /// inactive the same tick. No lag, no linger: the next spawned set is
    /// exactly the matched set, and the delta records what changed.
    pub fn advance<'a>(
        &self,
        matched: impl Iterator<Item = &'a str>,
    ) -> (LifecycleState, LifecycleDelta) {
        let next: BTreeSet<String> = matched.map(str::to_string).collect();

        let delta = LifecycleDelta {
            spawned: next.difference(&self.spawned).cloned().collect(),
            despawned: self.spawned.difference(&next).cloned().collect(),
        };

        (LifecycleState { spawned: next }, delta)
    }
}
