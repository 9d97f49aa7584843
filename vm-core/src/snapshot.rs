//! Single-slot snapshot/rollback store.

use crate::operand::Stack;
use crate::tier::Tier;

/// A captured copy of everything `rollback` restores. Does not capture
/// `Code` (immutable) or hook state (externally owned).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub stack: Stack,
    pub tier: Tier,
    pub depth: u32,
    pub ip: usize,
}

/// One snapshot slot per VM; taking a new snapshot overwrites the prior
/// one.
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    slot: Option<Snapshot>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn store(&mut self, snapshot: Snapshot) {
        self.slot = Some(snapshot);
    }

    pub fn get(&self) -> Option<&Snapshot> {
        self.slot.as_ref()
    }

    pub fn take(&mut self) -> Option<Snapshot> {
        self.slot.take()
    }

    pub fn has_snapshot(&self) -> bool {
        self.slot.is_some()
    }
}
