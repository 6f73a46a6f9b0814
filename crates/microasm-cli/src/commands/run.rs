//! Run command - drive one interpreter through its full lifecycle.

use anyhow::Result;
use clap::Args;
use microasm_host::{Bindings, Interpreter, MasmError};
use microasm_vm::DEFAULT_RAM_SIZE;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;

/// RAM address used for the host write/read check
const CHECK_ADDRESS: i32 = 100;
const CHECK_VALUE: i32 = 12345;

#[derive(Args)]
pub struct RunCommand {
    /// Bytecode artifact to execute
    pub bytecode: PathBuf,

    /// Arguments to pass to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// RAM image size in bytes
    #[arg(long, value_name = "BYTES")]
    pub ram_size: Option<usize>,

    /// Trace every executed instruction
    #[arg(long)]
    pub debug: bool,

    /// Bind the runtime from this shared library instead of the linked one
    #[arg(long, value_name = "PATH")]
    pub library: Option<PathBuf>,
}

/// Effective settings after merging flags over the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub ram_size: usize,
    pub debug: bool,
    pub library: Option<PathBuf>,
    pub args: Vec<String>,
}

/// How a run ended, as far as the exit status is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Inspection completed; the script itself may still have faulted
    Completed,
    /// Setup failed before inspection (missing artifact, binding, create, load)
    SetupFailed,
}

impl RunCommand {
    /// Flags win over the config file, which wins over defaults
    pub fn settings(&self, config: &Config) -> RunSettings {
        RunSettings {
            ram_size: self
                .ram_size
                .or(config.interpreter.ram_size)
                .unwrap_or(DEFAULT_RAM_SIZE),
            debug: self.debug || config.interpreter.debug,
            library: self.library.clone().or_else(|| config.runtime.library.clone()),
            args: if self.args.is_empty() {
                config.script.args.clone()
            } else {
                self.args.clone()
            },
        }
    }

    pub fn run(&self, config: &Config) -> Result<Outcome> {
        let settings = self.settings(config);
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        run_scenario(
            &self.bytecode,
            &settings,
            &mut stdout.lock(),
            &mut stderr.lock(),
        )
    }
}

/// Resolve the entry points, reporting binding errors with an actionable hint
fn bind(settings: &RunSettings) -> Result<Bindings, MasmError> {
    match &settings.library {
        Some(path) => Bindings::load(path),
        None => Ok(Bindings::linked()),
    }
}

fn report_binding_error(err: &MasmError, errout: &mut impl Write) -> Result<()> {
    match err {
        MasmError::LibraryNotFound { .. } => {
            writeln!(errout, "Error: could not load the MicroASM runtime library.")?;
            writeln!(errout, "{err}")?;
            writeln!(
                errout,
                "Build microasm-capi and pass its path with --library, or omit --library to use the linked runtime."
            )?;
        }
        MasmError::MissingEntryPoint { .. } => {
            writeln!(errout, "Error: the runtime library does not export the expected API.")?;
            writeln!(errout, "{err}")?;
            writeln!(errout, "Check that the library matches this version of masm-host.")?;
        }
        MasmError::Call { .. } => writeln!(errout, "Error: {err}")?,
    }
    Ok(())
}

/// create → load → execute → inspect → destroy
///
/// The interpreter is destroyed on every path out of this function.
pub fn run_scenario(
    bytecode: &Path,
    settings: &RunSettings,
    out: &mut impl Write,
    errout: &mut impl Write,
) -> Result<Outcome> {
    if !bytecode.exists() {
        writeln!(
            errout,
            "Error: bytecode file not found: {}",
            bytecode.display()
        )?;
        return Ok(Outcome::SetupFailed);
    }

    let bindings = match bind(settings) {
        Ok(bindings) => bindings,
        Err(e) => {
            report_binding_error(&e, errout)?;
            return Ok(Outcome::SetupFailed);
        }
    };
    debug!(?bindings, "Runtime bound");

    let mut interp = match Interpreter::new(&bindings, settings.ram_size, settings.debug) {
        Ok(interp) => interp,
        Err(e) => {
            writeln!(errout, "Failed to create interpreter: {e}")?;
            return Ok(Outcome::SetupFailed);
        }
    };
    writeln!(
        out,
        "Interpreter created (RAM: {} bytes, debug: {}).",
        settings.ram_size, settings.debug
    )?;

    if let Err(e) = interp.load(bytecode) {
        writeln!(errout, "Failed to load bytecode: {e}")?;
        return Ok(Outcome::SetupFailed);
    }
    writeln!(out, "Bytecode loaded from {}.", bytecode.display())?;

    writeln!(out, "Executing with arguments: {:?}", settings.args)?;
    out.flush()?;
    match interp.execute(&settings.args) {
        Ok(()) => writeln!(out, "Execution finished.")?,
        Err(e) => writeln!(errout, "Execution failed: {e}")?,
    }

    match interp.register(0) {
        Ok(value) => writeln!(out, "Value of R0 after execution: {value}")?,
        Err(e) => writeln!(errout, "Failed to read R0: {e}")?,
    }

    check_ram(&mut interp, out, errout)?;

    drop(interp);
    writeln!(out, "Interpreter destroyed.")?;
    Ok(Outcome::Completed)
}

fn check_ram(
    interp: &mut Interpreter<'_>,
    out: &mut impl Write,
    errout: &mut impl Write,
) -> Result<()> {
    if let Err(e) = interp.write_ram_int(CHECK_ADDRESS, CHECK_VALUE) {
        writeln!(errout, "Failed to write RAM at {CHECK_ADDRESS}: {e}")?;
        return Ok(());
    }
    writeln!(out, "Wrote {CHECK_VALUE} to RAM address {CHECK_ADDRESS}.")?;

    match interp.read_ram_int(CHECK_ADDRESS) {
        Ok(value) if value == CHECK_VALUE => {
            writeln!(out, "Read back {value} from RAM address {CHECK_ADDRESS}: OK")?
        }
        Ok(value) => writeln!(
            errout,
            "RAM check mismatch at {CHECK_ADDRESS}: wrote {CHECK_VALUE}, read {value}"
        )?,
        Err(e) => writeln!(errout, "Failed to read RAM at {CHECK_ADDRESS}: {e}")?,
    }
    Ok(())
}
