//! One-shot external processes with a hard deadline.
//!
//! The script is written to stdin from a helper thread and stdout/stderr
//! are drained by two more, so a chatty child can never block on a full
//! pipe while we wait on it.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};
use wait_timeout::ChildExt;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A program plus its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a shell-like command line on whitespace: `"z3 -smt2"`.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: program.to_string(),
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion, feeding `input` on stdin.
    ///
    /// `timeout = None` waits indefinitely. On timeout the child is killed
    /// and reaped before [`ProcessError::Timeout`] is returned.
    pub fn run(&self, input: &str, timeout: Option<Duration>) -> Result<ProcessOutput, ProcessError> {
        let started = Instant::now();
        debug!(program = %self.program, args = ?self.args, ?timeout, "spawning external process");
        trace!(input, "external process input");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.to_string();
            thread::spawn(move || {
                // A child that exits early closes the pipe; that is not our error.
                let _ = stdin.write_all(input.as_bytes());
            })
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match timeout {
            Some(limit) => match child.wait_timeout(limit).map_err(|e| self.io(e))? {
                Some(status) => status,
                None => {
                    kill(&mut child);
                    return Err(ProcessError::Timeout {
                        program: self.program.clone(),
                        timeout: limit,
                    });
                }
            },
            None => child.wait().map_err(|e| self.io(e))?,
        };

        if let Some(handle) = writer {
            let _ = handle.join();
        }
        let output = ProcessOutput {
            status,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
            elapsed: started.elapsed(),
        };
        trace!(stdout = %output.stdout, stderr = %output.stderr, "external process output");
        debug!(program = %self.program, elapsed_ms = output.elapsed.as_millis() as u64, "external process finished");
        Ok(output)
    }

    fn io(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Io {
            program: self.program.clone(),
            source,
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_drain(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_program_and_arguments() {
        let cmd = ExternalCommand::parse("  z3 -in  -smt2 ").unwrap();
        assert_eq!(cmd.program(), "z3");
        assert_eq!(cmd, ExternalCommand::new("z3").args(["-in", "-smt2"]));
        assert!(ExternalCommand::parse("   ").is_none());
    }

    #[test]
    fn echoes_stdin_through_cat() {
        let out = ExternalCommand::new("cat")
            .run("hello\nworld\n", Some(Duration::from_secs(10)))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hello\nworld\n");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = ExternalCommand::new("definitely-not-a-real-binary-expinv")
            .run("", None)
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn slow_program_times_out() {
        let err = ExternalCommand::new("sleep")
            .arg("5")
            .run("", Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }
}
