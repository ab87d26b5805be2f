//! Blocking registry.
//!
//! Tracks which constraints are parked on which keys. The forward map
//! (`blocked_on`) gives each constraint its outstanding keys; the reverse
//! map (`waiting`) lists the constraints parked on each key. Both maps are
//! insertion-ordered so wake order is reproducible.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use cairn_types::{Handle, TypeId, TypePackId};

use crate::constraint::ConstraintId;
use crate::error::InternalError;

/// Something a constraint can wait on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockedOn {
    Type(TypeId),
    Pack(TypePackId),
    /// Another constraint being solved.
    Constraint(ConstraintId),
}

impl From<Handle> for BlockedOn {
    fn from(handle: Handle) -> Self {
        match handle {
            Handle::Type(ty) => BlockedOn::Type(ty),
            Handle::Pack(pack) => BlockedOn::Pack(pack),
        }
    }
}

impl From<TypeId> for BlockedOn {
    fn from(ty: TypeId) -> Self {
        BlockedOn::Type(ty)
    }
}

impl From<TypePackId> for BlockedOn {
    fn from(pack: TypePackId) -> Self {
        BlockedOn::Pack(pack)
    }
}

impl From<ConstraintId> for BlockedOn {
    fn from(constraint: ConstraintId) -> Self {
        BlockedOn::Constraint(constraint)
    }
}

impl fmt::Display for BlockedOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockedOn::Type(ty) => write!(f, "{ty}"),
            BlockedOn::Pack(pack) => write!(f, "{pack}"),
            BlockedOn::Constraint(constraint) => write!(f, "{constraint}"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlockingRegistry {
    waiting: IndexMap<BlockedOn, IndexSet<ConstraintId>>,
    blocked_on: IndexMap<ConstraintId, IndexSet<BlockedOn>>,
}

impl BlockingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `constraint` until `key` progresses.
    ///
    /// Returns `false` if the same registration is already outstanding, in
    /// which case the block count is unchanged.
    pub fn block(&mut self, key: BlockedOn, constraint: ConstraintId) -> bool {
        if !self.blocked_on.entry(constraint).or_default().insert(key) {
            return false;
        }
        self.waiting.entry(key).or_default().insert(constraint);
        true
    }

    /// Signal progress at `key`.
    ///
    /// Every constraint parked on `key` loses that registration. The ones
    /// left with no outstanding keys are returned in registration order and
    /// are ready to be retried.
    pub fn unblock(&mut self, key: BlockedOn) -> Result<Vec<ConstraintId>, InternalError> {
        let Some(waiters) = self.waiting.shift_remove(&key) else {
            return Ok(Vec::new());
        };
        let mut ready = Vec::new();
        for constraint in waiters {
            let keys = self
                .blocked_on
                .get_mut(&constraint)
                .ok_or(InternalError::RegistryDesync { key, constraint })?;
            if !keys.shift_remove(&key) {
                return Err(InternalError::RegistryDesync { key, constraint });
            }
            if keys.is_empty() {
                self.blocked_on.shift_remove(&constraint);
                ready.push(constraint);
            }
        }
        Ok(ready)
    }

    pub fn is_blocked(&self, constraint: ConstraintId) -> bool {
        self.block_count(constraint) > 0
    }

    pub fn block_count(&self, constraint: ConstraintId) -> usize {
        self.blocked_on.get(&constraint).map_or(0, IndexSet::len)
    }

    /// Keys `constraint` is currently parked on, in registration order.
    pub fn waiting_on(&self, constraint: ConstraintId) -> impl Iterator<Item = BlockedOn> + '_ {
        self.blocked_on
            .get(&constraint)
            .into_iter()
            .flat_map(|keys| keys.iter().copied())
    }

    /// Verify that the forward and reverse maps mirror each other.
    pub fn check_consistency(&self) -> Result<(), InternalError> {
        for (&key, constraints) in &self.waiting {
            for &constraint in constraints {
                let mirrored = self
                    .blocked_on
                    .get(&constraint)
                    .is_some_and(|keys| keys.contains(&key));
                if !mirrored {
                    return Err(InternalError::RegistryDesync { key, constraint });
                }
            }
        }
        for (&constraint, keys) in &self.blocked_on {
            for &key in keys {
                let mirrored = self
                    .waiting
                    .get(&key)
                    .is_some_and(|constraints| constraints.contains(&constraint));
                if !mirrored {
                    return Err(InternalError::RegistryDesync { key, constraint });
                }
            }
        }
        Ok(())
    }
}
