//! External runtime command line shared by the process-based exchanges.

use crate::config::{DEFAULT_RUNNER_ARGS, DEFAULT_RUNNER_PROGRAM};
use std::path::Path;
use std::process::Command;

/// Replaced with the guest module path.
pub const MODULE_PLACEHOLDER: &str = "{module}";
/// Replaced with the staged input file (staged-disk only).
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Replaced with the staged output file (staged-disk only).
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Program and argument template for a runtime process.
///
/// The default runs the guest's stdin-to-stdout export under wasmedge:
/// `wasmedge {module} process_stdin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
}

impl Default for ProcessCommand {
    fn default() -> Self {
        Self::new(DEFAULT_RUNNER_PROGRAM, DEFAULT_RUNNER_ARGS.iter().copied())
    }
}

impl ProcessCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// True if the runtime writes the output file itself.
    pub fn references_output(&self) -> bool {
        self.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER))
    }

    /// Arguments with placeholders substituted. Unset paths become empty.
    pub fn render_args(
        &self,
        module: &Path,
        input: Option<&Path>,
        output: Option<&Path>,
    ) -> Vec<String> {
        let module = module.display().to_string();
        let input = input.map(|p| p.display().to_string()).unwrap_or_default();
        let output = output.map(|p| p.display().to_string()).unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(MODULE_PLACEHOLDER, &module)
                    .replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    pub(crate) fn command(
        &self,
        module: &Path,
        input: Option<&Path>,
        output: Option<&Path>,
    ) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.render_args(module, input, output));
        command
    }
}

impl std::fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
