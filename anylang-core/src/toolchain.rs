//! External toolchain: `llc`, the system C compiler, and the produced binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn executable_name(self, stem: &str) -> String {
        match self {
            Platform::Windows => format!("{stem}.exe"),
            Platform::Unix => stem.to_string(),
        }
    }

    /// Command that launches `exe`.
    ///
    /// A bare file name is prefixed with the current directory so the shell
    /// search path is never consulted.
    pub fn run_invocation(self, exe: &Path) -> Invocation {
        let program = if exe.components().count() == 1 {
            match self {
                Platform::Windows => PathBuf::from(format!(".\\{}", exe.display())),
                Platform::Unix => PathBuf::from(format!("./{}", exe.display())),
            }
        } else {
            exe.to_path_buf()
        };
        Invocation::new(program)
    }
}

/// Paths of the generated IR, the assembly, and the linked executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub ir: PathBuf,
    pub asm: PathBuf,
    pub exe: PathBuf,
}

impl Artifacts {
    pub fn new(dir: impl AsRef<Path>, stem: &str, platform: Platform) -> Self {
        let dir = dir.as_ref();
        Self {
            ir: dir.join(format!("{stem}.ll")),
            asm: dir.join(format!("{stem}.s")),
            exe: dir.join(platform.executable_name(stem)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Name used in diagnostics.
    pub fn tool(&self) -> String {
        self.program.display().to_string()
    }

    pub fn command_line(&self) -> String {
        let mut line = self.tool();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait ToolRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<ToolOutcome, CoreError>;
}

/// Runs invocations as child processes sharing this process' stdio.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<ToolOutcome, CoreError> {
        debug!(command = %invocation.command_line(), "spawning");
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .status()
            .map_err(|source| CoreError::ToolSpawn {
                tool: invocation.tool(),
                source,
            })?;
        Ok(ToolOutcome {
            code: status.code(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub llc: PathBuf,
    pub cc: PathBuf,
    pub opt_level: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            llc: "llc".into(),
            cc: "clang".into(),
            opt_level: "3".into(),
        }
    }
}

impl Toolchain {
    pub fn assemble(&self, artifacts: &Artifacts) -> Invocation {
        Invocation::new(&self.llc)
            .arg(&artifacts.ir)
            .arg("-o")
            .arg(&artifacts.asm)
    }

    pub fn link(&self, artifacts: &Artifacts) -> Invocation {
        Invocation::new(&self.cc)
            .arg(&artifacts.asm)
            .arg("-o")
            .arg(&artifacts.exe)
            .arg(format!("-O{}", self.opt_level))
    }
}

/// Runs a build step and turns a non-zero exit into [`CoreError::ToolFailed`].
pub fn run_checked(
    runner: &mut impl ToolRunner,
    invocation: &Invocation,
) -> Result<(), CoreError> {
    info!(command = %invocation.command_line(), "running build step");
    let outcome = runner.run(invocation)?;
    if !outcome.success() {
        return Err(CoreError::ToolFailed {
            tool: invocation.tool(),
            code: outcome.code,
        });
    }
    Ok(())
}
