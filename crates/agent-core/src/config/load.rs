use anyhow::Result;

use super::types::AgentConfig;

impl AgentConfig {
    /// Defaults, then the TOML file, then `POSTURE_*` environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_file_config()?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }
}
