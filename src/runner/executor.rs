//! Child-process execution for agent runs.
//!
//! Two modes share one result shape: buffered (capture both streams
//! wholesale) and streaming (per-line handler, used for the agent's
//! stream-json output). In streaming mode the child gets its own process
//! group so that a timeout or interrupt kills the agent's descendants too,
//! not just the direct child.

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::runner::shutdown::ShutdownToken;

/// Command the real agent is invoked as. The prompt is appended as a final
/// argument only for this command, which is how test doubles like `echo`,
/// `false`, and `sleep` are plugged in without seeing the prompt.
pub const AGENT_COMMAND: &str = "claude";

/// Default agent arguments: print mode with stream-json on stdout.
pub fn default_agent_args() -> Vec<String> {
    [
        "--print",
        "--output-format",
        "stream-json",
        "--verbose",
        "--dangerously-skip-permissions",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Outcome of one agent run. `timed_out` is set only when the run was cut
/// short by deadline expiry; user interrupts leave it false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// One line of child output, CR/LF stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

pub type OutputHandler = Box<dyn FnMut(OutputLine) + Send>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The governing deadline or shutdown fired. Carries whatever output was
    /// captured before the kill; `result.timed_out` distinguishes the cause.
    #[error("{}", interrupted_reason(.result))]
    Interrupted { result: ExecuteResult },

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o failure while running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn interrupted_reason(result: &ExecuteResult) -> &'static str {
    if result.timed_out {
        "execution timed out"
    } else {
        "execution interrupted"
    }
}

/// Launches a single external command and surfaces its output.
pub struct Executor {
    command: String,
    args: Vec<String>,
    handler: Option<Mutex<OutputHandler>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            command: AGENT_COMMAND.to_string(),
            args: default_agent_args(),
            handler: None,
        }
    }

    /// Replace the command and arguments. Non-`claude` commands receive the
    /// arguments verbatim and never see the prompt.
    pub fn command<I, S>(mut self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Install a per-line output handler, switching the run into streaming
    /// mode. The handler is called synchronously from the read loop, so a
    /// slow handler slows the child rather than dropping lines.
    pub fn output_handler(mut self, handler: impl FnMut(OutputLine) + Send + 'static) -> Self {
        self.handler = Some(Mutex::new(Box::new(handler)));
        self
    }

    /// Run the command to completion, under an optional deadline and an
    /// external shutdown token.
    ///
    /// Non-zero exit codes are not errors; they come back in the result.
    /// Cancellation returns [`ExecutorError::Interrupted`] with the partial
    /// result attached.
    pub async fn run(
        &self,
        prompt: &str,
        timeout: Option<Duration>,
        cancel: ShutdownToken,
    ) -> Result<ExecuteResult, ExecutorError> {
        let mut args = self.args.clone();
        if self.command == AGENT_COMMAND {
            args.push(prompt.to_string());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.handler.is_some() {
            // New process group so the kill reaches the agent's own children.
            #[cfg(unix)]
            cmd.process_group(0);
            self.run_streaming(cmd, timeout, cancel).await
        } else {
            self.run_buffered(cmd, timeout, cancel).await
        }
    }

    fn spawn(&self, cmd: &mut Command) -> Result<Child, ExecutorError> {
        cmd.spawn().map_err(|source| ExecutorError::Spawn {
            command: self.command.clone(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> ExecutorError {
        ExecutorError::Io {
            command: self.command.clone(),
            source,
        }
    }

    /// Capture stdout and stderr wholesale. Used for plain commands that do
    /// not speak the stream protocol.
    async fn run_buffered(
        &self,
        mut cmd: Command,
        timeout: Option<Duration>,
        mut cancel: ShutdownToken,
    ) -> Result<ExecuteResult, ExecutorError> {
        let mut child = self.spawn(&mut cmd)?;
        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| self.io_error(std::io::Error::other("stdout pipe missing")))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| self.io_error(std::io::Error::other("stderr pipe missing")))?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut timed_out = false;
        let mut interrupted = false;

        {
            let read_all = async {
                tokio::try_join!(
                    stdout_pipe.read_to_end(&mut stdout_buf),
                    stderr_pipe.read_to_end(&mut stderr_buf),
                )
            };
            tokio::pin!(read_all);
            let expiry = expire_after(timeout);
            tokio::pin!(expiry);

            loop {
                tokio::select! {
                    read = &mut read_all => {
                        read.map_err(|e| self.io_error(e))?;
                        break;
                    }
                    _ = &mut expiry, if !interrupted => {
                        interrupted = true;
                        timed_out = true;
                        let _ = child.start_kill();
                    }
                    _ = cancel.cancelled(), if !interrupted => {
                        interrupted = true;
                        let _ = child.start_kill();
                    }
                }
            }
        }

        let status = child.wait().await.map_err(|e| self.io_error(e))?;

        let mut result = ExecuteResult {
            exit_code: 0,
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            timed_out,
        };
        if interrupted {
            return Err(ExecutorError::Interrupted { result });
        }
        result.exit_code = status.code().unwrap_or(-1);
        Ok(result)
    }

    /// Read both pipes line-by-line, invoking the handler for each line while
    /// also accumulating the full output. Each pipe preserves source order;
    /// no ordering holds across the two.
    async fn run_streaming(
        &self,
        mut cmd: Command,
        timeout: Option<Duration>,
        mut cancel: ShutdownToken,
    ) -> Result<ExecuteResult, ExecutorError> {
        let mut child = self.spawn(&mut cmd)?;
        let stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| self.io_error(std::io::Error::other("stdout pipe missing")))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| self.io_error(std::io::Error::other("stderr pipe missing")))?;

        let mut stdout_lines = BufReader::new(stdout_pipe).lines();
        let mut stderr_lines = BufReader::new(stderr_pipe).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut timed_out = false;
        let mut interrupted = false;

        let expiry = expire_after(timeout);
        tokio::pin!(expiry);

        while !(stdout_done && stderr_done) {
            tokio::select! {
                line = stdout_lines.next_line(), if !stdout_done => match line {
                    Ok(Some(text)) => {
                        stdout.push_str(&text);
                        stdout.push('\n');
                        self.dispatch(OutputLine { stream: OutputStream::Stdout, text });
                    }
                    _ => stdout_done = true,
                },
                line = stderr_lines.next_line(), if !stderr_done => match line {
                    Ok(Some(text)) => {
                        stderr.push_str(&text);
                        stderr.push('\n');
                        self.dispatch(OutputLine { stream: OutputStream::Stderr, text });
                    }
                    _ => stderr_done = true,
                },
                _ = &mut expiry, if !interrupted => {
                    interrupted = true;
                    timed_out = true;
                    kill_process_group(&mut child);
                }
                _ = cancel.cancelled(), if !interrupted => {
                    interrupted = true;
                    kill_process_group(&mut child);
                }
            }
        }

        let status = child.wait().await.map_err(|e| self.io_error(e))?;

        let mut result = ExecuteResult {
            exit_code: 0,
            stdout,
            stderr,
            timed_out,
        };
        if interrupted {
            return Err(ExecutorError::Interrupted { result });
        }
        result.exit_code = status.code().unwrap_or(-1);
        Ok(result)
    }

    fn dispatch(&self, line: OutputLine) {
        if let Some(handler) = &self.handler {
            if let Ok(mut handler) = handler.lock() {
                (handler)(line);
            }
        }
    }
}

/// Pending forever when no timeout is configured.
async fn expire_after(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Hard-kill the child's whole process group. The group id equals the child
/// pid because the child was spawned as a group leader.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
        // Already reaped; nothing left to kill.
        None => {}
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::shutdown;
    use std::sync::{Arc, Mutex as StdMutex};

    fn never_cancelled() -> ShutdownToken {
        let (controller, token) = shutdown::channel();
        // Leak the controller so the token stays pending forever.
        std::mem::forget(controller);
        token
    }

    #[tokio::test]
    async fn buffered_success_captures_stdout() {
        let exec = Executor::new().command("echo", ["hello"]);
        let result = exec.run("ignored prompt", None, never_cancelled()).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello\n");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn buffered_nonzero_exit_is_not_an_error() {
        let exec = Executor::new().command("false", Vec::<String>::new());
        let result = exec.run("prompt", None, never_cancelled()).await.unwrap();
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn missing_command_is_a_spawn_error() {
        let exec = Executor::new().command("definitely-not-a-command-xyz", Vec::<String>::new());
        let err = exec.run("prompt", None, never_cancelled()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn deadline_expiry_sets_timed_out() {
        let exec = Executor::new().command("sleep", ["10"]);
        let err = exec
            .run("prompt", Some(Duration::from_millis(100)), never_cancelled())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Interrupted { result } => assert!(result.timed_out),
            other => panic!("expected Interrupted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn external_cancel_does_not_set_timed_out() {
        let (controller, token) = shutdown::channel();
        let exec = Executor::new().command("sleep", ["10"]);
        let run = exec.run("prompt", None, token);
        tokio::pin!(run);

        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.trigger();

        match run.await.unwrap_err() {
            ExecutorError::Interrupted { result } => assert!(!result.timed_out),
            other => panic!("expected Interrupted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn streaming_handler_sees_stdout_lines_in_order() {
        let lines: Arc<StdMutex<Vec<OutputLine>>> = Arc::default();
        let sink = Arc::clone(&lines);
        let exec = Executor::new()
            .command("printf", ["line1\nline2\nline3\n"])
            .output_handler(move |line| sink.lock().unwrap().push(line));

        let result = exec.run("prompt", None, never_cancelled()).await.unwrap();

        let seen = lines.lock().unwrap();
        let stdout: Vec<_> = seen
            .iter()
            .filter(|l| l.stream == OutputStream::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(stdout, ["line1", "line2", "line3"]);
        assert_eq!(result.stdout, "line1\nline2\nline3\n");
    }

    #[tokio::test]
    async fn streaming_handler_sees_stderr_lines() {
        let lines: Arc<StdMutex<Vec<OutputLine>>> = Arc::default();
        let sink = Arc::clone(&lines);
        let exec = Executor::new()
            .command("sh", ["-c", "echo err1 >&2 && echo err2 >&2"])
            .output_handler(move |line| sink.lock().unwrap().push(line));

        exec.run("prompt", None, never_cancelled()).await.unwrap();

        let seen = lines.lock().unwrap();
        let stderr: Vec<_> = seen
            .iter()
            .filter(|l| l.stream == OutputStream::Stderr)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(stderr, ["err1", "err2"]);
    }

    #[tokio::test]
    async fn streaming_result_buffers_match_buffered_mode() {
        let exec = Executor::new()
            .command("sh", ["-c", "echo out; echo err >&2"])
            .output_handler(|_| {});
        let result = exec.run("prompt", None, never_cancelled()).await.unwrap();
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[tokio::test]
    async fn streaming_timeout_returns_partial_output() {
        let exec = Executor::new()
            .command("sh", ["-c", "echo early; sleep 10; echo late"])
            .output_handler(|_| {});
        let err = exec
            .run("prompt", Some(Duration::from_millis(200)), never_cancelled())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Interrupted { result } => {
                assert!(result.timed_out);
                assert_eq!(result.stdout, "early\n");
                assert!(!result.stdout.contains("late"));
            }
            other => panic!("expected Interrupted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn carriage_returns_are_stripped() {
        let lines: Arc<StdMutex<Vec<OutputLine>>> = Arc::default();
        let sink = Arc::clone(&lines);
        let exec = Executor::new()
            .command("printf", ["one\r\ntwo\r\n"])
            .output_handler(move |line| sink.lock().unwrap().push(line));

        exec.run("prompt", None, never_cancelled()).await.unwrap();

        let seen = lines.lock().unwrap();
        assert_eq!(seen[0].text, "one");
        assert_eq!(seen[1].text, "two");
    }
}
