/// Runtime knobs of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Currency of accounts created lazily from order earnings.
    pub currency: String,
    /// How many times a mutation re-reads state after losing an optimistic claim.
    pub max_conflict_retries: u32,
    /// Buffer size of the post-commit event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "TZS".to_string(),
            max_conflict_retries: 3,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}
