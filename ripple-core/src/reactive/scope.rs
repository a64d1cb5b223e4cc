//! Effect Scopes
//!
//! A scope owns a group of effects and disposes them together, the way a UI
//! component tears down everything it started when it unmounts.

use std::sync::Arc;

use parking_lot::Mutex;

use super::effect::{Effect, IntoCleanup};

#[derive(Default)]
struct ScopeEffects(Mutex<Vec<Effect>>);

impl Drop for ScopeEffects {
    fn drop(&mut self) {
        for effect in self.0.get_mut().drain(..) {
            effect.dispose();
        }
    }
}

/// A collection of effects disposed as a unit.
///
/// Clones share the same collection. Dropping the last clone disposes every
/// effect the scope still holds, including ones the caller kept handles to.
#[derive(Clone, Default)]
pub struct Scope {
    effects: Arc<ScopeEffects>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an effect owned by this scope.
    pub fn effect<F, R>(&self, run: F) -> Effect
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoCleanup,
    {
        let effect = Effect::new(run);
        self.adopt(effect.clone());
        effect
    }

    /// Take ownership of an existing effect.
    pub fn adopt(&self, effect: Effect) {
        self.effects.0.lock().push(effect);
    }

    /// Number of effects held.
    pub fn len(&self) -> usize {
        self.effects.0.lock().len()
    }

    /// Check if the scope holds no effects.
    pub fn is_empty(&self) -> bool {
        self.effects.0.lock().is_empty()
    }

    /// Dispose every effect in the scope, in creation order.
    pub fn dispose(&self) {
        let effects = std::mem::take(&mut *self.effects.0.lock());
        tracing::debug!(count = effects.len(), "disposing scope");
        for effect in &effects {
            effect.dispose();
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("effects", &self.len()).finish()
    }
}
