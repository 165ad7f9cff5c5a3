// SPDX-License-Identifier: GPL-3.0-only

//! Per-operation loading flags with scoped release

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use storage_contracts::OperationKind;

use crate::lock;

#[derive(Debug, Default)]
pub struct LoadingFlags {
    active: Mutex<HashSet<OperationKind>>,
}

impl LoadingFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Marks `kind` as loading until the guard drops; None if it already is
    pub fn begin(self: &Arc<Self>, kind: OperationKind) -> Option<LoadingGuard> {
        if !lock(&self.active).insert(kind) {
            return None;
        }
        Some(LoadingGuard {
            flags: Arc::clone(self),
            kind,
        })
    }

    pub fn is_loading(&self, kind: OperationKind) -> bool {
        lock(&self.active).contains(&kind)
    }

    pub fn active(&self) -> Vec<OperationKind> {
        let active = lock(&self.active);
        OperationKind::ALL
            .iter()
            .copied()
            .filter(|kind| active.contains(kind))
            .collect()
    }
}

/// Clears its flag on drop, whichever way the operation ends
#[derive(Debug)]
pub struct LoadingGuard {
    flags: Arc<LoadingFlags>,
    kind: OperationKind,
}

impl LoadingGuard {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        lock(&self.flags.active).remove(&self.kind);
    }
}
