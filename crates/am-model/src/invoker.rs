//! Child-process execution of the model.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{AmError, AmResult};

/// Wall-clock limit for a single model run.
pub const DEFAULT_AM_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured streams of a run that exited with a usable status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Something that evaluates a complete model configuration.
#[async_trait]
pub trait ModelEngine: Send + Sync {
    /// Run the model on `input` (header plus layers).
    ///
    /// Exit status 1 is a warning (for example ice found where only liquid
    /// was expected) and still yields output; other statuses are errors.
    async fn run(&self, input: &str) -> AmResult<EngineOutput>;
}

/// Runs the `am` executable as `am -`, feeding the configuration on stdin.
#[derive(Debug, Clone)]
pub struct AmInvoker {
    program: String,
    timeout: Duration,
}

impl AmInvoker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_AM_TIMEOUT,
        }
    }

    /// Executable from the `AM` environment variable, falling back to `am`
    /// on the search path.
    pub fn from_env() -> Self {
        Self::new(std::env::var("AM").unwrap_or_else(|_| "am".to_string()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ModelEngine for AmInvoker {
    async fn run(&self, input: &str) -> AmResult<EngineOutput> {
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AmError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            AmError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child stdin was not captured",
            ))
        })?;

        // stdin is fed while the output pipes drain, so a chatty child
        // cannot block on a full pipe before it has read all of its input.
        let feed = async move {
            let mut stdin = stdin;
            let written = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            written
        };
        let run = async { tokio::join!(feed, child.wait_with_output()) };

        // Dropping `run` on timeout drops the child, which kills it.
        let (fed, output) = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                warn!(program = %self.program, timeout = ?self.timeout, "am timed out, killed");
                AmError::Timeout(self.timeout)
            })?;

        let output = output?;
        if let Err(e) = fed {
            // The exit status decides; a child that quits early closes its stdin.
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(AmError::Io(e));
            }
            debug!("am closed stdin before reading all input");
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            status = %output.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "am finished"
        );

        match output.status.code() {
            Some(exit_code @ (0 | 1)) => Ok(EngineOutput {
                exit_code,
                stdout,
                stderr,
            }),
            code => Err(AmError::BadExit {
                code,
                stdout,
                stderr,
            }),
        }
    }
}
