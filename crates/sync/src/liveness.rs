//! Liveness tokens
//!
//! A command can resolve after the session that issued it is gone. Callers
//! capture a token when they start and check it before acting on the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Incrementing session generation
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate every token captured so far
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug, Clone)]
pub struct LivenessToken {
    generation: Arc<Generation>,
    captured: u64,
}

impl LivenessToken {
    pub fn capture(generation: &Arc<Generation>) -> Self {
        Self {
            generation: Arc::clone(generation),
            captured: generation.current(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.generation.current() == self.captured
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }
}
