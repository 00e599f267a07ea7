//! INI → [`ConfigFile`]. The only place key names are mapped to fields.

use super::file::ConfigFile;
use super::ConfigError;
use crate::exchange::ProcessCommand;
use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigError> {
    let mut file = ConfigFile::default();
    let mut config = file.pipeline.clone();

    if let Some(section) = ini.section(Some("pipeline")) {
        if let Some(v) = parse_value::<u32>(section, "pipeline", "tile_size")? {
            config = config.with_tile_size(v);
        }
        if let Some(v) = parse_value::<usize>(section, "pipeline", "workers")? {
            config = config.with_workers(v);
        }
        if let Some(v) = parse_value(section, "pipeline", "exchange")? {
            config = config.with_exchange(v);
        }
        if let Some(v) = parse_value(section, "pipeline", "codec")? {
            config = config.with_codec(v);
        }
        if let Some(v) = parse_value(section, "pipeline", "failure_policy")? {
            config = config.with_failure_policy(v);
        }
    }

    if let Some(section) = ini.section(Some("guest")) {
        if let Some(v) = non_empty(section, "module") {
            config = config.with_module_path(v);
        }
        if let Some(v) = non_empty(section, "entry_point") {
            config = config.with_entry_point(v);
        }
        if let Some(v) = parse_value::<u32>(section, "guest", "max_input_len")? {
            config = config.with_max_input_len(v);
        }
    }

    if let Some(section) = ini.section(Some("paths")) {
        if let Some(v) = non_empty(section, "input") {
            config = config.with_input_dir(v);
        }
        if let Some(v) = non_empty(section, "output") {
            config = config.with_output_dir(v);
        }
        if let Some(v) = non_empty(section, "staging") {
            config = config.with_staging_dir(v);
        }
        if let Some(v) = parse_value::<bool>(section, "paths", "keep_staged_files")? {
            config = config.with_keep_staged_files(v);
        }
    }

    if let Some(section) = ini.section(Some("process")) {
        let current = config.process().clone();
        let program = non_empty(section, "program").unwrap_or_else(|| current.program().to_string());
        let args = match section.get("args") {
            Some(v) => v.split_whitespace().map(str::to_string).collect(),
            None => current.args().to_vec(),
        };
        config = config.with_process(ProcessCommand::new(program, args));
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            file.log_file = PathBuf::from(v);
        }
    }

    file.pipeline = config;
    Ok(file)
}

fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_value<T>(section: &Properties, name: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty(section, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::invalid(&format!("{}.{}", name, key), &raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::codec::CodecKind;
    use crate::config::ConfigFile;
    use crate::dispatch::FailurePolicy;
    use crate::exchange::ExchangeKind;
    use std::path::Path;

    #[test]
    fn test_parses_every_section() {
        let text = r#"
[pipeline]
tile_size = 300
workers = 2
exchange = streamed-pipe
codec = raw
failure_policy = continue

[guest]
module = /opt/filter/filter.wasm
entry_point = blur
max_input_len = 1024

[paths]
input = in
output = out
staging = stage
keep_staged_files = true

[process]
program = wasmtime
args = run --invoke process_stdin {module}

[logging]
file = /tmp/t.log
"#;
        let file = ConfigFile::from_ini_str(text).unwrap();
        let config = &file.pipeline;

        assert_eq!(config.tile_size(), 300);
        assert_eq!(config.workers(), 2);
        assert_eq!(config.exchange(), ExchangeKind::StreamedPipe);
        assert_eq!(config.codec(), CodecKind::Raw);
        assert_eq!(config.failure_policy(), FailurePolicy::Continue);
        assert_eq!(config.module_path(), Path::new("/opt/filter/filter.wasm"));
        assert_eq!(config.entry_point(), "blur");
        assert_eq!(config.max_input_len(), 1024);
        assert_eq!(config.input_dir(), Path::new("in"));
        assert_eq!(config.output_dir(), Path::new("out"));
        assert_eq!(config.staging_dir(), Path::new("stage"));
        assert!(config.keep_staged_files());
        assert_eq!(config.process().program(), "wasmtime");
        assert_eq!(
            config.process().args(),
            &["run", "--invoke", "process_stdin", "{module}"]
        );
        assert_eq!(file.log_file, Path::new("/tmp/t.log"));
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let file = ConfigFile::from_ini_str("[pipeline]\ntile_size =\n").unwrap();
        assert_eq!(file.pipeline.tile_size(), 256);
    }

    #[test]
    fn test_bad_number_names_the_key() {
        let err = ConfigFile::from_ini_str("[pipeline]\nworkers = many\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pipeline.workers"), "{msg}");
        assert!(msg.contains("many"));
    }

    #[test]
    fn test_unknown_exchange_rejected() {
        let err = ConfigFile::from_ini_str("[pipeline]\nexchange = carrier-pigeon\n").unwrap_err();
        assert!(err.to_string().contains("pipeline.exchange"));
    }
}
