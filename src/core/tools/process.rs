use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use super::{TOOL_CLAUDE_CODE, TOOL_SHELL, Tool, ToolContext, ToolResult, parse_args};
use crate::platform::{NativePlatform, Platform, find_executable};

/// How long stream readers may keep draining after a timed-out child is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

pub(crate) struct Captured {
    /// Interleaved stdout and stderr, line by line in arrival order.
    pub output: String,
    /// `None` when the process was killed on timeout.
    pub status: Option<ExitStatus>,
}

async fn pump<R: AsyncRead + Unpin>(stream: R, sink: Arc<Mutex<String>>) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let mut out = sink.lock().unwrap_or_else(|e| e.into_inner());
                out.push_str(&text);
                if !text.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }
}

/// Spawn `cmd`, capture both output streams into one buffer and wait for it,
/// killing the child if `timeout` elapses first. Output captured before the
/// kill is kept.
pub(crate) async fn run_captured(
    mut cmd: Command,
    timeout: Option<Duration>,
) -> std::io::Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let buffer = Arc::new(Mutex::new(String::new()));
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(pump(stdout, Arc::clone(&buffer))));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(pump(stderr, Arc::clone(&buffer))));
    }

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => {
                warn!("Process exceeded {:?}; killing it", limit);
                let _ = child.kill().await;
                None
            }
        },
        None => Some(child.wait().await?),
    };

    for reader in readers {
        if status.is_some() {
            let _ = reader.await;
        } else {
            // Grandchildren may still hold the pipes open.
            let abort = reader.abort_handle();
            if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
                abort.abort();
            }
        }
    }

    let output = buffer.lock().unwrap_or_else(|e| e.into_inner()).clone();
    Ok(Captured { output, status })
}

#[derive(Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    working_dir: Option<String>,
}

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        TOOL_SHELL
    }

    fn description(&self) -> &'static str {
        "Run a shell command. Use it for builds, tests, installing dependencies and similar operations."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command to run"},
                "working_dir": {"type": "string", "description": "Working directory"}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> ToolResult {
        let args: ShellArgs = match parse_args(TOOL_SHELL, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        if args.command.trim().is_empty() {
            return ToolResult::fail("Missing command");
        }

        let mut cmd = NativePlatform::shell_inline(&args.command);
        cmd.current_dir(ctx.dir_or_default(args.working_dir.as_deref()));

        match run_captured(cmd, None).await {
            Ok(Captured {
                output,
                status: Some(status),
            }) if status.success() => ToolResult::ok(output),
            Ok(Captured { output, status }) => {
                let reason = status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "killed".to_string());
                ToolResult::fail_with_output(output, format!("Command failed: {}", reason))
            }
            Err(e) => ToolResult::fail(format!("Failed to start command: {}", e)),
        }
    }
}

#[derive(Deserialize)]
struct ClaudeCodeArgs {
    task: String,
    #[serde(default)]
    working_dir: Option<String>,
}

/// Delegates a coding task to the Claude Code CLI in print mode.
pub struct ClaudeCodeTool {
    binary: String,
    timeout: Duration,
}

impl ClaudeCodeTool {
    pub fn new(binary: String, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    fn locate(&self) -> Option<PathBuf> {
        find_executable(&self.binary)
    }
}

#[async_trait]
impl Tool for ClaudeCodeTool {
    fn name(&self) -> &'static str {
        TOOL_CLAUDE_CODE
    }

    fn description(&self) -> &'static str {
        "Invoke the Claude Code CLI for complex coding work: reading and changing code, or multi-step development tasks."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {"type": "string", "description": "Description of the task to carry out"},
                "working_dir": {"type": "string", "description": "Working directory"}
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> ToolResult {
        let args: ClaudeCodeArgs = match parse_args(TOOL_CLAUDE_CODE, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        let Some(path) = self.locate() else {
            return ToolResult::fail(format!(
                "Tool unavailable: `{}` was not found; install the Claude Code CLI",
                self.binary
            ));
        };

        let mut cmd = Command::new(&path);
        cmd.arg("-p")
            .arg(&args.task)
            .arg("--output-format")
            .arg("text")
            .current_dir(ctx.dir_or_default(args.working_dir.as_deref()));
        info!("Delegating to {:?} (timeout {:?})", path, self.timeout);

        match run_captured(cmd, Some(self.timeout)).await {
            Ok(Captured {
                output,
                status: Some(status),
            }) => {
                if status.success() {
                    ToolResult::ok(output)
                } else {
                    ToolResult::fail_with_output(output, format!("Command failed: {}", status))
                }
            }
            Ok(Captured { output, status: None }) => ToolResult::fail_with_output(
                output,
                format!("Command timed out after {}s", self.timeout.as_secs()),
            ),
            Err(e) => ToolResult::fail(format!("Failed to start {}: {}", path.display(), e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext {
            working_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn shell_captures_both_streams_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellTool
            .execute(&json!({"command": "echo out; echo err 1>&2"}), &ctx(dir.path()))
            .await;
        assert!(result.success);
        assert!(result.output.contains("out\n"));
        assert!(result.output.contains("err\n"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn shell_failure_keeps_output_and_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellTool
            .execute(&json!({"command": "echo partial; exit 3"}), &ctx(dir.path()))
            .await;
        assert!(!result.success);
        assert_eq!(result.output, "partial\n");
        let error = result.error.unwrap();
        assert!(error.starts_with("Command failed"));
        assert!(error.contains('3'));
    }

    #[tokio::test]
    async fn shell_runs_in_working_dir_and_honours_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("marker.txt"), "").unwrap();

        let result = ShellTool
            .execute(
                &json!({"command": "ls", "working_dir": "sub"}),
                &ctx(dir.path()),
            )
            .await;
        assert!(result.success);
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn run_captured_kills_on_timeout_and_keeps_partial_output() {
        let cmd = NativePlatform::shell_inline("echo partial; sleep 5");
        let started = Instant::now();
        let captured = run_captured(cmd, Some(Duration::from_millis(300)))
            .await
            .unwrap();
        assert!(captured.status.is_none());
        assert_eq!(captured.output, "partial\n");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn claude_code_without_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ClaudeCodeTool::new(
            "workbench-missing-claude-binary".to_string(),
            Duration::from_secs(1),
        );
        let started = Instant::now();
        let result = tool
            .execute(&json!({"task": "refactor"}), &ctx(dir.path()))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Tool unavailable"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
