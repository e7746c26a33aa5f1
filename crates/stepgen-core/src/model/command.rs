//! A [`Model`] backed by a model CLI that reads a prompt on stdin and prints
//! its answer on stdout.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use super::presets::DEFAULT_TIMEOUT_SECS;
use super::trait_def::Model;

/// Runs one subprocess per completion.
#[derive(Debug, Clone)]
pub struct CommandModel {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandModel {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[async_trait]
impl Model for CommandModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn model command `{}`", self.command_line()))?;

        // All pipes are driven concurrently so a chatty child cannot block on
        // a full stdout buffer while we are still writing the prompt.
        let mut stdin_pipe = child.stdin.take();
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let write_prompt = async {
            if let Some(mut pipe) = stdin_pipe.take() {
                match pipe.write_all(prompt.as_bytes()).await {
                    Ok(()) => {}
                    // The child may exit without reading everything.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
                    Err(e) => return Err(e),
                }
                pipe.shutdown().await.or_else(|e| {
                    if e.kind() == ErrorKind::BrokenPipe { Ok(()) } else { Err(e) }
                })?;
            }
            Ok::<(), std::io::Error>(())
        };

        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stdout_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };

        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stderr_pipe {
                pipe.read_to_end(&mut buf).await.ok();
            }
            String::from_utf8_lossy(&buf).into_owned()
        };

        let outcome = tokio::time::timeout(self.timeout, async {
            let (write_result, stdout, stderr) = tokio::join!(write_prompt, read_stdout, read_stderr);
            let wait_result = child.wait().await;
            (write_result, wait_result, stdout, stderr)
        })
        .await;

        match outcome {
            Ok((write_result, Ok(status), stdout, stderr)) => {
                debug!(
                    model = %self.name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    exit_code = ?status.code(),
                    "model command finished"
                );
                write_result.with_context(|| format!("failed to send prompt to `{}`", self.command_line()))?;
                if !status.success() {
                    let detail = stderr.trim();
                    match status.code() {
                        Some(code) => bail!(
                            "model command `{}` exited with code {code}: {detail}",
                            self.command_line()
                        ),
                        None => bail!(
                            "model command `{}` was terminated by a signal: {detail}",
                            self.command_line()
                        ),
                    }
                }
                Ok(stdout)
            }
            Ok((_, Err(e), _, _)) => {
                Err(e).with_context(|| format!("failed to wait on model command `{}`", self.command_line()))
            }
            Err(_) => {
                let _ = child.kill().await;
                bail!(
                    "model command `{}` timed out after {:?}",
                    self.command_line(),
                    self.timeout
                )
            }
        }
    }
}
