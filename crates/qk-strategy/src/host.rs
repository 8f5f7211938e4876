use qk_schemas::Resolution;

use crate::types::{Strategy, StrategyHostError, StrategySpec};

/// Owns exactly one strategy for the lifetime of a run.
#[derive(Default)]
pub struct StrategyHost {
    strategy: Option<Box<dyn Strategy>>,
    spec: Option<StrategySpec>,
}

impl StrategyHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the strategy. A second registration is rejected.
    pub fn register(&mut self, s: Box<dyn Strategy>) -> Result<(), StrategyHostError> {
        if self.strategy.is_some() {
            return Err(StrategyHostError::MultiStrategyNotAllowed);
        }
        self.spec = Some(s.spec());
        self.strategy = Some(s);
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.strategy.is_some()
    }

    pub fn spec(&self) -> Result<StrategySpec, StrategyHostError> {
        self.spec.clone().ok_or(StrategyHostError::NoStrategyRegistered)
    }

    /// Check the registered strategy can run on a clock of `resolution`.
    pub fn check_resolution(&self, resolution: Resolution) -> Result<(), StrategyHostError> {
        match self.spec()?.resolution {
            Some(expected) if expected != resolution => Err(StrategyHostError::ResolutionMismatch {
                expected,
                got: resolution,
            }),
            _ => Ok(()),
        }
    }

    pub fn strategy_mut(&mut self) -> Result<&mut dyn Strategy, StrategyHostError> {
        match self.strategy.as_mut() {
            Some(s) => Ok(s.as_mut()),
            None => Err(StrategyHostError::NoStrategyRegistered),
        }
    }
}
