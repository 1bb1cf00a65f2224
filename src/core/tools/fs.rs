use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{TOOL_LIST_FILES, TOOL_READ_FILE, TOOL_WRITE_FILE, Tool, ToolContext, ToolResult, parse_args};

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    path: String,
    #[serde(default)]
    pattern: Option<String>,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        TOOL_READ_FILE
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> ToolResult {
        let args: PathArgs = match parse_args(TOOL_READ_FILE, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        let path = ctx.resolve(&args.path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => ToolResult::ok(String::from_utf8_lossy(&bytes)),
            Err(e) => ToolResult::fail(format!("Failed to read {}: {}", path.display(), e)),
        }
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        TOOL_WRITE_FILE
    }

    fn description(&self) -> &'static str {
        "Write content to a file, creating parent directories as needed."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"},
                "content": {"type": "string", "description": "File content"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> ToolResult {
        let args: WriteArgs = match parse_args(TOOL_WRITE_FILE, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        let path = ctx.resolve(&args.path);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::fail(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ));
            }
        }
        match tokio::fs::write(&path, args.content.as_bytes()).await {
            Ok(()) => ToolResult::ok(format!("File written: {}", path.display())),
            Err(e) => ToolResult::fail(format!("Failed to write {}: {}", path.display(), e)),
        }
    }
}

pub struct ListFilesTool;

impl ListFilesTool {
    fn glob_matches(dir: &std::path::Path, pattern: &str) -> Result<Vec<String>, String> {
        let full = dir.join(pattern);
        let full = full.to_string_lossy();
        let paths = glob::glob(&full).map_err(|e| format!("Invalid pattern {}: {}", pattern, e))?;
        Ok(paths
            .filter_map(Result::ok)
            .map(|p| p.display().to_string())
            .collect())
    }

    async fn entries(dir: &std::path::Path) -> std::io::Result<Vec<String>> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut lines = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.metadata().await {
                Ok(meta) => {
                    let modified = meta
                        .modified()
                        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    lines.push(format!("{}\t{}\t{}", name, meta.len(), modified));
                }
                Err(_) => lines.push(name),
            }
        }
        lines.sort();
        Ok(lines)
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        TOOL_LIST_FILES
    }

    fn description(&self) -> &'static str {
        "List the files in a directory, optionally filtered by a glob pattern."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path"},
                "pattern": {"type": "string", "description": "Glob pattern such as *.rs"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> ToolResult {
        let args: ListArgs = match parse_args(TOOL_LIST_FILES, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        let dir = ctx.resolve(if args.path.is_empty() { "." } else { &args.path });

        match args.pattern.as_deref().filter(|p| !p.is_empty()) {
            Some(pattern) => match Self::glob_matches(&dir, pattern) {
                Ok(matches) => ToolResult::ok(matches.join("\n")),
                Err(e) => ToolResult::fail(e),
            },
            None => match Self::entries(&dir).await {
                Ok(lines) => ToolResult::ok(lines.join("\n")),
                Err(e) => ToolResult::fail(format!(
                    "Failed to read directory {}: {}",
                    dir.display(),
                    e
                )),
            },
        }
    }
}
