/// runtime configuration for a simulator session, loaded from an optional TOML
/// file. Every field has a sensible default so a bare `SimulatorConfig::default()`
/// reproduces the core's unconfigured behaviour (load at offset 0, run to halt).
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SimulatorConfig {
    /// byte offset within the 64 KiB memory array where a loaded program's first
    /// byte lands. The core always decodes from the start of the given slice;
    /// this only affects where `Machine::memory` is eventually populated by a
    /// caller that also wants the raw image visible in memory.
    #[serde(default)]
    pub load_offset: u32,

    /// upper bound on the number of steps `Machine::run` will execute before
    /// giving up, guarding against runaway loops in malformed or adversarial
    /// programs. `None` (the TOML default) means run until halted.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl SimulatorConfig {
    pub fn from_toml_str(text: &str) -> Result<SimulatorConfig, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;
