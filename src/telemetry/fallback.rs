use log::warn;

use super::error::ProbeFailure;

/// One way of obtaining a reading.
pub trait Strategy<T>: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` means the strategy structurally failed: the query errored or
    /// matched nothing. A legitimate zero reading must be returned as `Ok`.
    fn attempt(&self) -> Result<T, ProbeFailure>;
}

/// Ordered list of strategies, tried front to back until one succeeds.
pub struct FallbackChain<T> {
    strategies: Vec<Box<dyn Strategy<T>>>,
}

impl<T> FallbackChain<T> {
    pub fn new() -> Self {
        FallbackChain {
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl Strategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs the chain and returns the value with the name of the strategy
    /// that produced it.
    pub fn run(&self) -> Result<(&'static str, T), ProbeFailure> {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for (position, strategy) in self.strategies.iter().enumerate() {
            match strategy.attempt() {
                Ok(value) => return Ok((strategy.name(), value)),
                Err(failure) => {
                    if position + 1 < self.strategies.len() {
                        warn!("{} failed ({}), falling back", strategy.name(), failure);
                    }
                    attempts.push(format!("{}: {}", strategy.name(), failure));
                }
            }
        }
        Err(ProbeFailure::Exhausted(attempts))
    }
}

impl<T> Default for FallbackChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
