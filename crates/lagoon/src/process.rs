//! [`DiagramCompiler`] backed by an external command line compiler (`mmdc` by default).
//!
//! Source and options are written to a scratch directory, the program is invoked with
//! `-i <input> -o <output> -c <config> -I <render id>`, and the produced SVG is read back. The
//! call blocks the current thread; hosts with an async runtime should run it on a blocking pool.

use lagoon_core::{CompileFailure, CompilerOptions, DiagramCompiler};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

pub const DEFAULT_PROGRAM: &str = "mmdc";

#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: PathBuf,
    extra_args: Vec<OsString>,
}

impl Default for ProcessCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ProcessCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments appended after the generated ones (e.g. `--puppeteerConfigFile`).
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    pub fn compile_sync(
        &self,
        render_id: &str,
        source: &str,
        options: &CompilerOptions,
    ) -> Result<String, CompileFailure> {
        let scratch = tempfile::tempdir().map_err(|e| CompileFailure::new(e.to_string()))?;
        let input = scratch.path().join("input.mmd");
        let output = scratch.path().join("output.svg");
        let config = scratch.path().join("config.json");

        std::fs::write(&input, source).map_err(|e| CompileFailure::new(e.to_string()))?;
        let config_json =
            serde_json::to_vec(options.as_value()).map_err(|e| CompileFailure::new(e.to_string()))?;
        std::fs::write(&config, config_json).map_err(|e| CompileFailure::new(e.to_string()))?;

        tracing::debug!(program = %self.program.display(), %render_id, "invoking diagram compiler");
        let result = Command::new(&self.program)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .arg("-c")
            .arg(&config)
            .arg("-I")
            .arg(render_id)
            .arg("-q")
            .args(&self.extra_args)
            .output()
            .map_err(|e| {
                CompileFailure::new(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let message = stderr.trim();
            return Err(CompileFailure::new(if message.is_empty() {
                format!("{} exited with {}", self.program.display(), result.status)
            } else {
                message.to_string()
            }));
        }

        std::fs::read_to_string(&output).map_err(|e| CompileFailure::new(e.to_string()))
    }
}

impl DiagramCompiler for ProcessCompiler {
    async fn compile(
        &self,
        render_id: &str,
        source: &str,
        options: &CompilerOptions,
    ) -> Result<String, CompileFailure> {
        self.compile_sync(render_id, source, options)
    }
}
