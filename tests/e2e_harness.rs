#![allow(dead_code)]

use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Reply served once the script runs dry.
const FALLBACK_REPLY: &str =
    r#"{"thought": "Nothing left to do", "action": "complete", "action_input": {"summary": "done"}}"#;

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// OpenAI-compatible chat endpoint that answers from a script.
pub struct MockLlmServer {
    pub port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

async fn mock_chat_completion(
    State(state): State<MockServerState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    state
        .requests
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(payload);
    let content = state
        .replies
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pop_front()
        .unwrap_or_else(|| FALLBACK_REPLY.to_string());

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
}

impl MockLlmServer {
    pub async fn start(replies: &[&str]) -> TestResult<Self> {
        let port = find_free_port()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockServerState {
            replies: Arc::new(Mutex::new(replies.iter().map(|r| r.to_string()).collect())),
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(mock_chat_completion))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Provider base URL; the client appends `/chat/completions`.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/v1", self.port)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Runs the workbench binary against a throwaway data directory.
pub struct CliHarness {
    data_dir: tempfile::TempDir,
    work_dir: tempfile::TempDir,
}

pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for CliOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl CliHarness {
    pub fn new() -> TestResult<Self> {
        Ok(Self {
            data_dir: tempfile::tempdir()?,
            work_dir: tempfile::tempdir()?,
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    /// Directory agents created by the tests operate in.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub async fn run(&self, args: &[&str]) -> TestResult<CliOutput> {
        let output = Command::new(workbench_binary_path()?)
            .args(args)
            .env("WORKBENCH_DATA_DIR", self.data_dir.path())
            .env("NO_PROXY", "127.0.0.1,localhost")
            .env("no_proxy", "127.0.0.1,localhost")
            .output()
            .await?;
        Ok(output.into())
    }

    /// Like `run`, but fails the test on a non-zero exit.
    pub async fn ok(&self, args: &[&str]) -> TestResult<CliOutput> {
        let out = self.run(args).await?;
        if !out.success {
            return Err(format!(
                "workbench {:?} failed\nstdout: {}\nstderr: {}",
                args, out.stdout, out.stderr
            )
            .into());
        }
        Ok(out)
    }

    /// init, a provider pointing at `base_url`, one agent and one task.
    pub async fn bootstrap(&self, base_url: &str, api_key: &str) -> TestResult<()> {
        self.ok(&["init"]).await?;
        let mut provider = vec!["provider", "set", "mock", "--base-url", base_url];
        if !api_key.is_empty() {
            provider.extend(["--api-key", api_key]);
        }
        self.ok(&provider).await?;

        let work_dir = self.work_dir().to_string_lossy().to_string();
        self.ok(&[
            "agent",
            "add",
            "--name",
            "builder",
            "--provider",
            "mock",
            "--model",
            "mock-model-v1",
            "--working-dir",
            &work_dir,
            "--max-steps",
            "5",
        ])
        .await?;
        self.ok(&[
            "task",
            "add",
            "--name",
            "Write release notes",
            "--project",
            "workbench",
        ])
        .await?;
        Ok(())
    }
}

pub fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn workbench_binary_path() -> TestResult<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_workbench") {
        return Ok(PathBuf::from(path));
    }

    let candidate = PathBuf::from("target")
        .join("debug")
        .join(if cfg!(windows) { "workbench.exe" } else { "workbench" });
    if candidate.exists() {
        return Ok(candidate);
    }

    Err("Could not locate workbench test binary path".into())
}
