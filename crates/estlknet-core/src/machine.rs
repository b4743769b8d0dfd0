//! Machine state: known cores and the active one

use std::collections::HashMap;

use crate::core_config::CoreConfig;

/// Set of configured cores plus the currently active core.
#[derive(Debug, Clone, Default)]
pub struct MachineState {
    configs: HashMap<String, CoreConfig>,
    active_core: Option<String>,
}

impl MachineState {
    /// Create an empty machine state
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a core config, replacing any previous config with the same id.
    ///
    /// The first canonical-axis core becomes the active core if none is set.
    /// Returns true when this config was elected as the default active core.
    pub fn insert_config(&mut self, config: CoreConfig) -> bool {
        let elect = self.active_core.is_none() && config.is_canonical();
        if elect {
            self.active_core = Some(config.id.clone());
        }
        self.configs.insert(config.id.clone(), config);
        elect
    }

    /// Look up a core config by id
    pub fn config(&self, id: &str) -> Option<&CoreConfig> {
        self.configs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.configs.contains_key(id)
    }

    /// Id of the active core, if any
    pub fn active_core(&self) -> Option<&str> {
        self.active_core.as_deref()
    }

    /// Config of the active core, if the active id is known
    pub fn active_config(&self) -> Option<&CoreConfig> {
        self.active_core.as_deref().and_then(|id| self.configs.get(id))
    }

    pub fn set_active_core(&mut self, id: impl Into<String>) {
        self.active_core = Some(id.into());
    }

    pub fn core_count(&self) -> usize {
        self.configs.len()
    }
}
