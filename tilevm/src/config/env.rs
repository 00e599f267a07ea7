//! Environment overrides understood by the benchmark scripts.
//!
//! | Variable      | Effect                                      |
//! |---------------|---------------------------------------------|
//! | `SHARED_DIR`  | module/input/output under this directory     |
//! | `TILE_SIZE`   | tile edge length                            |
//! | `MAX_WORKERS` | worker count                                |
//!
//! Unparseable values are ignored, matching the scripts' behaviour.

use super::PipelineConfig;

/// Apply overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(mut config: PipelineConfig, lookup: F) -> PipelineConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("SHARED_DIR").filter(|v| !v.is_empty()) {
        config = config.with_shared_dir(dir);
    }
    if let Some(size) = lookup("TILE_SIZE").and_then(|v| v.trim().parse::<u32>().ok()) {
        config = config.with_tile_size(size);
    }
    if let Some(workers) = lookup("MAX_WORKERS").and_then(|v| v.trim().parse::<usize>().ok()) {
        config = config.with_workers(workers);
    }
    config
}

/// Apply overrides from the process environment.
pub fn apply_process_env(config: PipelineConfig) -> PipelineConfig {
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply() {
        let config = apply_env_overrides(
            PipelineConfig::default(),
            env(&[("SHARED_DIR", "/srv"), ("TILE_SIZE", "512"), ("MAX_WORKERS", "3")]),
        );
        assert_eq!(config.module_path(), Path::new("/srv/filter.wasm"));
        assert_eq!(config.tile_size(), 512);
        assert_eq!(config.workers(), 3);
    }

    #[test]
    fn test_unparseable_values_ignored() {
        let config = apply_env_overrides(
            PipelineConfig::default(),
            env(&[("TILE_SIZE", "big"), ("MAX_WORKERS", "-2")]),
        );
        assert_eq!(config, PipelineConfig::default());
    }
}
