use console::{Emoji, style};

use crate::core::session::ConversationDetail;
use crate::core::store::{AgentStep, ConversationMessage, ConversationStatus, MessageType, StepStatus};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
pub static QUESTION: Emoji<'_, '_> = Emoji("❓ ", "? ");
pub static TOOL: Emoji<'_, '_> = Emoji("🔧 ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

fn print_message(message: &ConversationMessage) {
    let header = match (message.role.as_str(), message.message_type) {
        (_, MessageType::Error) => style("error".to_string()).red().bold(),
        (_, MessageType::Question) => style(format!("{}agent asks", QUESTION)).yellow().bold(),
        (_, MessageType::Result) if message.role == "assistant" => {
            style("result".to_string()).green().bold()
        }
        ("system", MessageType::Result) => style(format!("{}observation", TOOL)).dim(),
        ("system", _) => style("context".to_string()).magenta(),
        ("user", _) => style("you".to_string()).cyan().bold(),
        (role, _) => style(role.to_string()).bold(),
    };
    println!("{} {}", header, style(format!("#{}", message.id)).dim());

    if let Some(step) = message.metadata.get("step_num").and_then(|v| v.as_i64()) {
        if let Some(action) = message.metadata.get("action").and_then(|v| v.as_str()) {
            println!("  {}", style(format!("step {} -> {}", step, action)).dim());
        }
    }
    for line in message.content.lines() {
        println!("  {}", line);
    }
    if let Some(options) = message.metadata.get("options").and_then(|v| v.as_array()) {
        let options: Vec<&str> = options.iter().filter_map(|o| o.as_str()).collect();
        println!("  {}", style(format!("options: {}", options.join(" / "))).yellow());
    }
    println!();
}

fn print_step_row(step: &AgentStep) {
    let status = match step.status {
        StepStatus::Success => style(step.status.as_str()).green(),
        StepStatus::Failed => style(step.status.as_str()).red(),
        StepStatus::Running | StepStatus::Pending => style(step.status.as_str()).yellow(),
    };
    println!(
        "  {:>3}  {:<12} {}  {}",
        step.step_num,
        step.action,
        status,
        style(truncate(&step.action_input, 60)).dim()
    );
    if !step.error.is_empty() {
        println!("       {}", style(truncate(&step.error, 80)).red());
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub fn print_conversation_status(status: ConversationStatus) {
    let label = format!("Conversation status: {}", status);
    match status {
        ConversationStatus::Completed => print_success(&label),
        ConversationStatus::WaitingUser => print_warn(&format!("{} (reply to continue)", label)),
        ConversationStatus::Failed => print_error(&label),
        ConversationStatus::Active => print_info(&label),
    }
}

pub fn print_transcript(detail: &ConversationDetail, with_steps: bool) {
    let title = match &detail.task {
        Some(task) => format!("Conversation {} · {}", detail.conversation.id, task.name),
        None => format!("Conversation {}", detail.conversation.id),
    };
    print_step(&title);
    println!();
    for message in &detail.messages {
        print_message(message);
    }
    if with_steps && !detail.steps.is_empty() {
        println!("{}", style("Steps").bold().underlined());
        for step in &detail.steps {
            print_step_row(step);
        }
        println!();
    }
    print_conversation_status(detail.conversation.status);
}
