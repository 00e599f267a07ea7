//! [`ConfigFile`] → INI text.

use super::file::ConfigFile;

pub(super) fn to_config_string(file: &ConfigFile) -> String {
    let config = &file.pipeline;
    format!(
        "\
; tilevm configuration

[pipeline]
tile_size = {tile_size}
workers = {workers}
; zero-copy | streamed-pipe | staged-disk
exchange = {exchange}
; png | raw
codec = {codec}
; fail-fast | continue
failure_policy = {policy}

[guest]
module = {module}
entry_point = {entry}
max_input_len = {max_input}

[paths]
input = {input}
output = {output}
staging = {staging}
keep_staged_files = {keep}

[process]
program = {program}
args = {args}

[logging]
file = {log_file}
",
        tile_size = config.tile_size(),
        workers = config.workers(),
        exchange = config.exchange().as_str(),
        codec = config.codec().as_str(),
        policy = config.failure_policy().as_str(),
        module = config.module_path().display(),
        entry = config.entry_point(),
        max_input = config.max_input_len(),
        input = config.input_dir().display(),
        output = config.output_dir().display(),
        staging = config.staging_dir().display(),
        keep = config.keep_staged_files(),
        program = config.process().program(),
        args = config.process().args().join(" "),
        log_file = file.log_file.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mentions_every_section() {
        let text = to_config_string(&ConfigFile::default());
        for section in ["[pipeline]", "[guest]", "[paths]", "[process]", "[logging]"] {
            assert!(text.contains(section), "missing {section}");
        }
        assert!(text.contains("exchange = zero-copy"));
        assert!(text.contains("args = {module} process_stdin"));
    }
}
