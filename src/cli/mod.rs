mod catalog_cmd;

use anyhow::{Context, Result, anyhow, bail};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::core::brain::AgentBrain;
use crate::core::config::WorkbenchConfig;
use crate::core::dispatch::{TurnHandle, TurnQueue};
use crate::core::llm::HttpConnector;
use crate::core::session::ConversationService;
use crate::core::store::SqliteStore;
use crate::core::terminal::{self, print_status, print_success, print_warn};
use crate::core::tools::ToolRegistry;
use crate::platform::{NativePlatform, Platform};

fn print_help() {
    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("workbench").green()
    );
    let sections: [(&str, &[(&str, &str)]); 3] = [
        (
            "Setup",
            &[
                ("init", "Create the data directory, config file and database"),
                ("provider set <name>", "[--base-url U] [--api-key K] [--disable]"),
                ("provider list", "Show configured model providers"),
            ],
        ),
        (
            "Catalog",
            &[
                (
                    "agent add",
                    "--name N --provider P [--model M] [--tools a,b] [--working-dir D] [--max-steps N] [--prompt TEXT]",
                ),
                ("agent list", "Show configured agents"),
                ("agent enable|disable", "--id N"),
                ("tools", "List the built-in tools"),
                (
                    "task add",
                    "--name N [--description D] [--project P] [--date YYYY-MM-DD] [--deadline YYYY-MM-DD]",
                ),
            ],
        ),
        (
            "Conversations",
            &[
                ("delegate", "--task ID --agent ID [--context TEXT]"),
                ("reply", "--conversation ID --message TEXT"),
                ("show", "--conversation ID"),
                ("stop", "--conversation ID"),
            ],
        ),
    ];
    for (title, commands) in sections {
        println!(" {}", style(title).bold().underlined());
        for (command, usage) in commands {
            println!("   {:<22} {}", style(command).cyan(), style(usage).dim());
        }
        println!();
    }
}

const COMMANDS: &[&str] = &[
    "init", "provider", "agent", "task", "tools", "delegate", "reply", "show", "stop",
];

/// `--flag value` pairs and bare `--switch`es following a command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Flags {
    pub positional: Vec<String>,
    values: Vec<(String, String)>,
    switches: Vec<String>,
}

/// Flags that never take a value.
const SWITCHES: &[&str] = &["--disable", "--steps", "--verbose", "-v"];

impl Flags {
    pub(crate) fn parse(args: &[String], start: usize) -> Self {
        let mut flags = Flags::default();
        let mut i = start;
        while i < args.len() {
            let arg = args[i].as_str();
            if SWITCHES.contains(&arg) {
                flags.switches.push(arg.to_string());
                i += 1;
            } else if arg.starts_with("--") {
                if i + 1 < args.len() {
                    flags.values.push((arg.to_string(), args[i + 1].clone()));
                    i += 2;
                } else {
                    i += 1;
                }
            } else {
                flags.positional.push(arg.to_string());
                i += 1;
            }
        }
        flags
    }

    /// Last occurrence wins.
    pub(crate) fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn required(&self, name: &str) -> Result<&str> {
        match self.value(name).map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(anyhow!("{} is required", name)),
        }
    }

    pub(crate) fn id(&self, name: &str) -> Result<i64> {
        let raw = self.required(name)?;
        raw.parse()
            .map_err(|_| anyhow!("{} expects a numeric id, got '{}'", name, raw))
    }

    pub(crate) fn switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }
}

/// Everything a command needs, built from the data directory.
pub(crate) struct Workbench {
    pub data_dir: PathBuf,
    pub config: WorkbenchConfig,
    pub store: Arc<SqliteStore>,
}

impl Workbench {
    async fn open(data_dir: PathBuf, verbose: bool) -> Result<Self> {
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create {}", data_dir.display()))?;
            NativePlatform::restrict_dir_permissions(&data_dir);
        }
        let config = WorkbenchConfig::load(&data_dir)?;
        crate::logging::init(&config.log_level, &data_dir, verbose);
        let store = Arc::new(SqliteStore::open(config.database_path(&data_dir)).await?);
        Ok(Self {
            data_dir,
            config,
            store,
        })
    }

    fn conversations(&self) -> ConversationService {
        let brain = AgentBrain::new(
            self.store.clone(),
            Arc::new(HttpConnector::new(&self.config.agent)),
            Arc::new(ToolRegistry::builtin(&self.config.tools)),
            self.config.agent.clone(),
        );
        ConversationService::new(self.store.clone(), TurnQueue::new(Arc::new(brain)))
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = args.get(1).map(String::as_str) else {
        print_help();
        return Ok(());
    };
    if matches!(cmd, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    if !COMMANDS.contains(&cmd) {
        print_help();
        bail!("Unknown command: {}", cmd);
    }

    let flags = Flags::parse(&args, 2);
    let verbose = flags.switch("--verbose") || flags.switch("-v");
    let workbench = Workbench::open(NativePlatform::data_dir(), verbose).await?;

    match cmd {
        "init" => run_init(&workbench),
        "provider" => catalog_cmd::run_provider_command(&workbench, &flags).await,
        "agent" => catalog_cmd::run_agent_command(&workbench, &flags).await,
        "task" => catalog_cmd::run_task_command(&workbench, &flags).await,
        "tools" => catalog_cmd::run_tools_command(&workbench),
        "delegate" => {
            let service = workbench.conversations();
            let (conversation, handle) = service
                .start_conversation(
                    flags.id("--task")?,
                    flags.id("--agent")?,
                    flags.value("--context"),
                )
                .await?;
            print_status("Conversation", &conversation.id.to_string());
            finish_turn(&service, handle, flags.switch("--steps")).await
        }
        "reply" => {
            let service = workbench.conversations();
            let handle = service
                .send_message(
                    flags.id("--conversation")?,
                    flags
                        .value("--message")
                        .ok_or_else(|| anyhow!("--message is required"))?,
                )
                .await?;
            finish_turn(&service, handle, flags.switch("--steps")).await
        }
        "show" => {
            let service = workbench.conversations();
            let detail = service
                .conversation_detail(flags.id("--conversation")?)
                .await?;
            terminal::print_transcript(&detail, true);
            Ok(())
        }
        "stop" => {
            let id = flags.id("--conversation")?;
            workbench.conversations().stop_conversation(id).await?;
            print_success(&format!("Conversation {} stopped.", id));
            Ok(())
        }
        other => Err(anyhow!("Unknown command: {}", other)),
    }
}

fn run_init(workbench: &Workbench) -> Result<()> {
    if workbench.config.write_default_if_missing(&workbench.data_dir)? {
        print_success("Wrote default config.toml");
    } else {
        print_warn("config.toml already exists; left untouched");
    }
    print_status("Data directory", &workbench.data_dir.display().to_string());
    print_status(
        "Database",
        &workbench
            .config
            .database_path(&workbench.data_dir)
            .display()
            .to_string(),
    );
    print_success("Workbench is ready. Next: workbench provider set <name> --api-key <key>");
    Ok(())
}

/// The CLI is a one-shot process, so it waits for the turn it triggered.
async fn finish_turn(
    service: &ConversationService,
    handle: TurnHandle,
    with_steps: bool,
) -> Result<()> {
    let conversation_id = handle.conversation_id();
    let outcome = handle.wait().await;
    info!(
        "CLI turn for conversation {} ended with {:?}",
        conversation_id, outcome
    );
    let detail = service.conversation_detail(conversation_id).await?;
    terminal::print_transcript(&detail, with_steps);
    Ok(())
}
