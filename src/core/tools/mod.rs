mod control;
mod fs;
mod process;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::ToolSettings;

pub use control::{AskUserArgs, AskUserTool, CompleteArgs, CompleteTool, parse_control_args};
pub use fs::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use process::{ClaudeCodeTool, ShellTool};

pub const TOOL_CLAUDE_CODE: &str = "claude_code";
pub const TOOL_SHELL: &str = "shell";
pub const TOOL_READ_FILE: &str = "read_file";
pub const TOOL_WRITE_FILE: &str = "write_file";
pub const TOOL_LIST_FILES: &str = "list_files";
pub const TOOL_ASK_USER: &str = "ask_user";
pub const TOOL_COMPLETE: &str = "complete";

/// Tools offered to an agent that does not configure its own list.
pub const DEFAULT_TOOL_NAMES: &[&str] = &[
    TOOL_SHELL,
    TOOL_READ_FILE,
    TOOL_WRITE_FILE,
    TOOL_LIST_FILES,
    TOOL_ASK_USER,
    TOOL_COMPLETE,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    /// The run should pause until the user answers.
    pub needs_user: bool,
    /// The run has finished.
    pub is_completed: bool,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Failure that still carries whatever the tool produced.
    pub fn fail_with_output(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Per-call execution context.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
}

impl ToolContext {
    /// Relative paths are joined onto the working directory; absolute paths
    /// pass through.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.working_dir.join(candidate)
        }
    }

    /// Directory override from a tool argument, falling back to the default.
    pub fn dir_or_default(&self, override_dir: Option<&str>) -> PathBuf {
        match override_dir.map(str::trim) {
            Some(dir) if !dir.is_empty() => self.resolve(dir),
            _ => self.working_dir.clone(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of `action_input`.
    fn schema(&self) -> Value;
    async fn execute(&self, args: &Value, ctx: &ToolContext) -> ToolResult;
}

/// Decode a tool's typed arguments, turning malformed payloads into a failed
/// result instead of an error the caller has to handle.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolResult> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args)
        .map_err(|e| ToolResult::fail(format!("Invalid arguments for {}: {}", tool, e)))
}

/// Fixed catalog of tools, looked up by name.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut index = HashMap::new();
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name(), i).is_some() {
                warn!("Duplicate tool name {}; later definition wins", tool.name());
            }
        }
        Self { tools, index }
    }

    pub fn builtin(settings: &ToolSettings) -> Self {
        Self::new(vec![
            Arc::new(ClaudeCodeTool::new(
                settings.claude_binary.clone(),
                settings.claude_timeout(),
            )),
            Arc::new(ShellTool),
            Arc::new(ReadFileTool),
            Arc::new(WriteFileTool),
            Arc::new(ListFilesTool),
            Arc::new(AskUserTool),
            Arc::new(CompleteTool),
        ])
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Tools for the given names in the given order; unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<dyn Tool>> {
        names.iter().filter_map(|n| self.get(n.as_ref())).collect()
    }

    pub fn all(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }
}

/// Runs registry tools against a fixed default working directory.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let working_dir = if working_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            working_dir
        };
        Self {
            registry,
            ctx: ToolContext { working_dir },
        }
    }

    #[cfg(test)]
    pub fn working_dir(&self) -> &Path {
        &self.ctx.working_dir
    }

    pub async fn execute(&self, name: &str, args: &Value) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            warn!("Model requested unknown tool {}", name);
            return ToolResult::fail(format!("Unknown tool: {}", name));
        };
        info!("Executing tool [{}] in {:?}", name, self.ctx.working_dir);
        let result = tool.execute(args, &self.ctx).await;
        if result.success {
            info!("Tool [{}] succeeded ({} bytes of output)", name, result.output.len());
        } else {
            warn!(
                "Tool [{}] failed: {}",
                name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }
}
