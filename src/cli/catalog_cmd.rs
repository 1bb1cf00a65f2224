use anyhow::{Result, anyhow};
use console::style;

use super::{Flags, Workbench};
use crate::core::store::{NewAgent, NewTask};
use crate::core::terminal::{print_info, print_status, print_success};
use crate::core::tools::{DEFAULT_TOOL_NAMES, ToolRegistry};

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return style("not set").yellow().to_string();
    }
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}

pub(super) async fn run_provider_command(workbench: &Workbench, flags: &Flags) -> Result<()> {
    let sub_cmd = flags.positional.first().map(String::as_str).unwrap_or("");
    match sub_cmd {
        "set" => {
            let name = flags
                .positional
                .get(1)
                .ok_or_else(|| anyhow!("Usage: workbench provider set <name> [--base-url U] [--api-key K] [--disable]"))?;
            let provider = workbench
                .store
                .upsert_provider(
                    name,
                    flags.value("--api-key"),
                    flags.value("--base-url"),
                    !flags.switch("--disable"),
                )
                .await?;
            print_success(&format!("Provider '{}' saved (id {}).", provider.name, provider.id));
            print_status("Base URL", &provider.base_url);
            print_status("API key", &mask_key(&provider.api_key));
            print_status("Enabled", &provider.enabled.to_string());
        }
        "list" => {
            for provider in workbench.store.list_providers().await? {
                println!(
                    "  {:>3}  {:<12} {:<8} {}  {}",
                    provider.id,
                    style(&provider.name).bold(),
                    if provider.enabled { "enabled" } else { "disabled" },
                    mask_key(&provider.api_key),
                    style(&provider.base_url).dim()
                );
            }
        }
        _ => {
            println!("{}", style("Usage: workbench provider <set|list>").bold());
            println!("  • set <name> [--base-url U] [--api-key K] [--disable]");
            println!("  • list");
        }
    }
    Ok(())
}

fn parse_tools(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub(super) async fn run_agent_command(workbench: &Workbench, flags: &Flags) -> Result<()> {
    let sub_cmd = flags.positional.first().map(String::as_str).unwrap_or("");
    match sub_cmd {
        "add" => {
            let provider_name = flags.required("--provider")?;
            let provider = workbench
                .store
                .find_provider_by_name(provider_name)
                .await?
                .ok_or_else(|| anyhow!("Unknown provider '{}'", provider_name))?;
            let max_steps = match flags.value("--max-steps") {
                Some(raw) => Some(
                    raw.trim()
                        .parse::<u32>()
                        .map_err(|_| anyhow!("--max-steps expects a positive number"))?,
                ),
                None => None,
            };
            let agent = workbench
                .store
                .create_agent(&NewAgent {
                    name: flags.required("--name")?.to_string(),
                    prompt: flags.value("--prompt").unwrap_or_default().to_string(),
                    provider_id: Some(provider.id),
                    model: flags.value("--model").unwrap_or_default().to_string(),
                    tools: parse_tools(flags.value("--tools")),
                    working_dir: flags.value("--working-dir").unwrap_or_default().to_string(),
                    max_steps,
                })
                .await?;
            print_success(&format!("Agent '{}' created (id {}).", agent.name, agent.id));
            if agent.tools.is_empty() {
                print_info(&format!("Tools: default set ({})", DEFAULT_TOOL_NAMES.join(", ")));
            }
        }
        "list" => {
            for agent in workbench.store.list_agents().await? {
                let model = if agent.model.is_empty() {
                    workbench.config.agent.default_model.as_str()
                } else {
                    agent.model.as_str()
                };
                println!(
                    "  {:>3}  {:<16} {:<8} {:<20} {}",
                    agent.id,
                    style(&agent.name).bold(),
                    if agent.enabled { "enabled" } else { "disabled" },
                    model,
                    style(if agent.tools.is_empty() {
                        "default tools".to_string()
                    } else {
                        agent.tools.join(",")
                    })
                    .dim()
                );
            }
        }
        "enable" | "disable" => {
            let id = flags.id("--id")?;
            let enabled = sub_cmd == "enable";
            workbench.store.set_agent_enabled(id, enabled).await?;
            print_success(&format!("Agent {} {}d.", id, sub_cmd));
        }
        _ => {
            println!("{}", style("Usage: workbench agent <add|list|enable|disable>").bold());
            println!("  • add --name N --provider P [--model M] [--tools a,b]");
            println!("        [--working-dir D] [--max-steps N] [--prompt TEXT]");
            println!("  • list");
            println!("  • enable --id N / disable --id N");
        }
    }
    Ok(())
}

pub(super) fn run_tools_command(workbench: &Workbench) -> Result<()> {
    let registry = ToolRegistry::builtin(&workbench.config.tools);
    for tool in registry.all() {
        let marker = if DEFAULT_TOOL_NAMES.contains(&tool.name()) { "default" } else { "opt-in" };
        println!(
            "  {:<12} {:<8} {}",
            style(tool.name()).bold(),
            marker,
            style(tool.description()).dim()
        );
    }
    Ok(())
}

pub(super) async fn run_task_command(workbench: &Workbench, flags: &Flags) -> Result<()> {
    let sub_cmd = flags.positional.first().map(String::as_str).unwrap_or("");
    match sub_cmd {
        "add" => {
            let task = workbench
                .store
                .create_task(&NewTask {
                    name: flags.required("--name")?.to_string(),
                    description: flags.value("--description").unwrap_or_default().to_string(),
                    project: flags.value("--project").map(str::to_string),
                    date: flags.value("--date").map(str::to_string),
                    deadline: flags.value("--deadline").map(str::to_string),
                })
                .await?;
            print_success(&format!("Task '{}' created (id {}).", task.name, task.id));
        }
        _ => {
            println!("{}", style("Usage: workbench task add --name N [options]").bold());
            println!("  Options: --description D --project P --date YYYY-MM-DD --deadline YYYY-MM-DD");
        }
    }
    Ok(())
}
