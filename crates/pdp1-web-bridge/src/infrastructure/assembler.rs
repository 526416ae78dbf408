//! External MACRO assembler.
//!
//! Each request runs the assembler in its own scratch directory:
//!
//! ```text
//! <tmp>/macro1_XXXX/source.mac   written from the request
//! <tmp>/macro1_XXXX/source.err   error report (read only if the run fails)
//! <tmp>/macro1_XXXX/source.lst   listing
//! <tmp>/macro1_XXXX/source.rim   RIM tape image
//! ```
//!
//! The directory is removed when the run finishes, whatever the outcome.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::application::{Assembler, AssemblyOutput};

const SOURCE_STEM: &str = "source";

/// Reasons an assembler run produced no artifacts.
///
/// Only the `Display` text reaches the browser, as the `err` field.
#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("couldn't create scratch directory: {0}")]
    ScratchDir(#[source] io::Error),

    #[error("couldn't write source file: {0}")]
    WriteSource(#[source] io::Error),

    #[error("couldn't run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The assembler failed and left an error report.
    #[error("{0}")]
    Rejected(String),

    /// The assembler failed without an error report.
    #[error("{program}: {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("couldn't open listing: {0}")]
    MissingListing(#[source] io::Error),

    #[error("couldn't open RIM file: {0}")]
    MissingRim(#[source] io::Error),
}

/// Runs the `macro1` assembler binary.
#[derive(Debug, Clone)]
pub struct MacroAssembler {
    program: PathBuf,
}

impl MacroAssembler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Assembles `source` and returns the listing and RIM image.
    ///
    /// # Errors
    ///
    /// See [`AssemblerError`].
    pub async fn run(&self, source: &str) -> Result<(String, Vec<u8>), AssemblerError> {
        let scratch = TempDir::with_prefix("macro1_").map_err(AssemblerError::ScratchDir)?;
        let dir = scratch.path();
        let source_path = artifact(dir, "mac");

        fs::write(&source_path, source)
            .await
            .map_err(AssemblerError::WriteSource)?;

        let status = Command::new(&self.program)
            .arg(&source_path)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| AssemblerError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        debug!("assembler exited with {status}");

        if !status.success() {
            return Err(match fs::read_to_string(artifact(dir, "err")).await {
                Ok(report) => AssemblerError::Rejected(report),
                Err(_) => AssemblerError::Failed {
                    program: self.program.display().to_string(),
                    status,
                },
            });
        }

        let listing = fs::read(artifact(dir, "lst"))
            .await
            .map_err(AssemblerError::MissingListing)?;
        let rim = fs::read(artifact(dir, "rim"))
            .await
            .map_err(AssemblerError::MissingRim)?;

        Ok((String::from_utf8_lossy(&listing).into_owned(), rim))
    }
}

#[async_trait]
impl Assembler for MacroAssembler {
    async fn assemble(&self, source: &str) -> AssemblyOutput {
        match self.run(source).await {
            Ok((listing, rim)) => AssemblyOutput {
                listing,
                rim,
                err: String::new(),
            },
            Err(e) => AssemblyOutput::failed(e.to_string()),
        }
    }
}

fn artifact(dir: &Path, extension: &str) -> PathBuf {
    dir.join(SOURCE_STEM).with_extension(extension)
}
