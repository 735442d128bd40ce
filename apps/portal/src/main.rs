use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::info;
use wellspring_community::{
    Community, CommunityChat, HandlePrompt, Identity, InboundEvent, Message,
};
use wellspring_config::load as load_config;
use wellspring_runtime::{shutdown_signal, telemetry, ClientServices};
use wellspring_safety::{Escalation, EscalationDispatcher};

type Input = Arc<Mutex<Lines<BufReader<Stdin>>>>;

#[derive(Parser)]
#[command(name = "wellspring-portal")]
#[command(about = "Wellspring community and companion chat in the terminal")]
struct Cli {
    /// Authenticated user id; omit to connect anonymously
    #[arg(long, global = true)]
    user_id: Option<String>,
    /// Display name shown to others while typing
    #[arg(long, global = true, default_value = "Student")]
    name: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List communities
    Communities,
    /// Join a community's chat
    Chat {
        /// Community id
        community: String,
        /// Channel id or name to open instead of the first one
        #[arg(long)]
        channel: Option<String>,
    },
    /// Talk to the AI companion
    Companion,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;
    let services =
        ClientServices::initialise(&config).context("failed to initialise client services")?;

    let identity = match cli.user_id {
        Some(user_id) => Identity::user(user_id, cli.name),
        None => Identity::anonymous(),
    };

    match cli.command {
        Commands::Communities => list_communities(&services).await,
        Commands::Chat { community, channel } => {
            run_chat(&services, identity, &community, channel.as_deref()).await
        }
        Commands::Companion => run_companion(&services).await,
    }
}

fn stdin_lines() -> Input {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

async fn read_line(input: &Input) -> anyhow::Result<Option<String>> {
    let mut lines = input.lock().await;
    Ok(lines.next_line().await?)
}

fn prompt() -> anyhow::Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn print_escalation(escalation: &Escalation) {
    println!("!! {}", escalation.message);
    for link in &escalation.links {
        println!("   - {}: {}", link.label, link.route.path());
    }
}

fn print_banner(escalation: &EscalationDispatcher) {
    if let Some(banner) = escalation.state().banner() {
        println!("[support] {}", banner.message);
    }
}

fn format_message(message: &Message) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M"),
        message.author.handle,
        message.body
    );
    if let Some(parent) = &message.reply_to {
        line.push_str(&format!(" (reply to {parent})"));
    }
    if message.is_edited() {
        line.push_str(" (edited)");
    }
    format!("{line}  #{}", message.id)
}

async fn list_communities(services: &ClientServices) -> anyhow::Result<()> {
    let page = services
        .api
        .list_communities(1)
        .await
        .context("failed to list communities")?;

    if page.items.is_empty() {
        println!("No communities found");
        return Ok(());
    }

    println!("Communities:");
    for community in page.items {
        println!(
            "  {}: {} ({})",
            community.id,
            community.name,
            community.category.unwrap_or_else(|| "general".to_string())
        );
    }
    if page.has_more {
        println!("  ...");
    }
    Ok(())
}

/// Asks on the console for the display name to join a community with.
struct ConsolePrompt {
    input: Input,
}

#[async_trait]
impl HandlePrompt for ConsolePrompt {
    async fn request_handle(&self, community: &Community) -> Option<String> {
        println!(
            "You need to join {} before posting. Choose a display name (blank to cancel):",
            community.name
        );
        print!("name> ");
        let _ = std::io::stdout().flush();

        match read_line(&self.input).await {
            Ok(Some(line)) if !line.trim().is_empty() => Some(line.trim().to_string()),
            _ => None,
        }
    }
}

fn print_chat_help() {
    println!("Available commands:");
    println!("  /help, /h               - Show this help");
    println!("  /channels               - List channels in this community");
    println!("  /open <channel>         - Switch channel");
    println!("  /history                - Show loaded messages");
    println!("  /reply <id> <text>      - Reply to a message");
    println!("  /edit <id> <text>       - Edit one of your messages");
    println!("  /delete <id>            - Delete one of your messages");
    println!("  /leave                  - Leave this community");
    println!("  /notices                - Show errors");
    println!("  /dismiss <n>            - Dismiss an error");
    println!("  /reconnect              - Reconnect to the realtime server");
    println!("  /quit, /exit, /q        - Exit");
    println!("Anything else is sent as a message.");
}

fn print_notices(chat: &CommunityChat) {
    for notice in chat.notices() {
        let hint = if notice.retryable { " (try again)" } else { "" };
        println!("error #{}: {}{}", notice.id, notice.message, hint);
    }
}

fn print_new_notices(chat: &CommunityChat, seen: &mut u64) {
    for notice in chat.notices() {
        if notice.id > *seen {
            let hint = if notice.retryable { " (try again)" } else { "" };
            println!("error: {}{}", notice.message, hint);
            *seen = notice.id;
        }
    }
}

async fn run_chat(
    services: &ClientServices,
    identity: Identity,
    community_id: &str,
    channel: Option<&str>,
) -> anyhow::Result<()> {
    info!(community_id, anonymous = identity.is_anonymous(), "starting community chat");

    let input = stdin_lines();
    let prompt_handle = Arc::new(ConsolePrompt {
        input: input.clone(),
    });
    let mut chat = services.community_chat(identity, prompt_handle);
    let mut seen_notice = 0;

    let mut live = chat.mount().await.is_ok();
    if chat.select_community(community_id).await.is_ok() {
        if let Some(channel) = channel {
            let _ = chat.select_channel(channel).await;
        }
    }
    print_new_notices(&chat, &mut seen_notice);

    if let Some(community) = chat.directory().community() {
        println!("{}", community.name);
    }
    println!(
        "Channel: {}",
        chat.active_channel().unwrap_or("(none selected)")
    );
    println!("Type '/help' for commands, '/quit' to exit");
    println!("---");
    for message in chat.messages() {
        println!("{}", format_message(message));
    }
    print_banner(&services.escalation);
    prompt()?;

    loop {
        let deadline = chat.next_deadline();

        tokio::select! {
            line = read_line(&input) => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_chat_line(&mut chat, line.trim(), &mut live).await {
                    break;
                }
                print_new_notices(&chat, &mut seen_notice);
                prompt()?;
            }
            event = chat.next_event(), if live => {
                match event {
                    Some(event) => render_event(&mut chat, event),
                    None => {
                        println!("Connection lost, reconnecting...");
                        live = chat.reconnect().await.is_ok();
                        if !live {
                            println!("Could not reconnect. Use /reconnect to try again.");
                        }
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let _ = chat.tick(Instant::now()).await;
            }
            _ = shutdown_signal() => {
                println!();
                break;
            }
        }
    }

    chat.unmount().await;
    println!("Goodbye!");
    Ok(())
}

fn render_event(chat: &mut CommunityChat, event: InboundEvent) {
    let line = match &event {
        InboundEvent::NewMessage(message) => {
            let known = chat.messages().iter().any(|m| m.id == message.id);
            (!known).then(|| format_message(message))
        }
        InboundEvent::MessageUpdated(message) => Some(format_message(message)),
        InboundEvent::MessageDeleted(deleted) => Some(format!("(message #{} was deleted)", deleted.id)),
        InboundEvent::UserTyping(typing) => Some(format!(
            "{} is typing...",
            typing.username.as_deref().unwrap_or("Someone")
        )),
        InboundEvent::UserStopTyping(_) => None,
    };

    if chat.handle_event(event, Instant::now()) {
        if let Some(line) = line {
            println!("{line}");
        }
    }
}

/// Returns false when the user asked to quit.
async fn handle_chat_line(chat: &mut CommunityChat, line: &str, live: &mut bool) -> bool {
    if line.is_empty() {
        return true;
    }

    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" | "/q" => return false,
        "/help" | "/h" => print_chat_help(),
        "/channels" => {
            let active = chat.active_channel().map(str::to_string);
            for channel in chat.directory().channels() {
                let marker = if active.as_deref() == Some(channel.id.as_str()) { "*" } else { " " };
                println!(" {marker} {}: {}", channel.id, channel.name);
            }
        }
        "/open" => {
            if chat.select_channel(rest).await.is_ok() {
                println!("Channel: {}", chat.active_channel().unwrap_or(rest));
                for message in chat.messages() {
                    println!("{}", format_message(message));
                }
            }
        }
        "/history" => {
            for message in chat.messages() {
                println!("{}", format_message(message));
            }
        }
        "/reply" => match rest.split_once(' ') {
            Some((id, text)) => {
                let report = chat.reply_to(id, text).await;
                if let Some(escalation) = &report.escalation {
                    print_escalation(escalation);
                }
                if let Some(outcome) = report.outcome {
                    println!("{}", format_message(&outcome.message));
                }
            }
            None => println!("usage: /reply <id> <text>"),
        },
        "/edit" => match rest.split_once(' ') {
            Some((id, text)) => {
                if let Ok(Some(escalation)) = chat.edit_message(id, text).await {
                    print_escalation(&escalation);
                }
            }
            None => println!("usage: /edit <id> <text>"),
        },
        "/delete" => {
            if chat.delete_message(rest).await.is_ok() {
                println!("(deleted #{rest})");
            }
        }
        "/leave" => {
            if chat.leave_community().await.is_ok() {
                println!("You left the community.");
            }
        }
        "/notices" => print_notices(chat),
        "/dismiss" => match rest.parse::<u64>() {
            Ok(id) if chat.dismiss_notice(id) => println!("dismissed"),
            _ => println!("no such notice"),
        },
        "/reconnect" => {
            *live = chat.reconnect().await.is_ok();
            if *live {
                println!("Reconnected.");
            }
        }
        _ if command.starts_with('/') => println!("Unknown command: {command}. Type /help for help."),
        _ => {
            let report = chat.submit(line).await;
            if let Some(escalation) = &report.escalation {
                print_escalation(escalation);
            }
            if let Some(outcome) = report.outcome {
                if let Some(membership) = &outcome.joined {
                    println!("Joined as {}.", membership.handle);
                }
                println!("{}", format_message(&outcome.message));
            }
        }
    }

    true
}

async fn run_companion(services: &ClientServices) -> anyhow::Result<()> {
    info!("starting companion chat");

    let mut chat = services.companion_chat();
    let input = stdin_lines();

    println!("Wellspring Companion");
    println!("Say anything. Use '/quit' to exit");
    println!("---");

    loop {
        prompt()?;
        let Some(line) = read_line(&input).await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "/quit" | "/exit" | "/q") {
            break;
        }

        match chat.send(text).await {
            Ok(exchange) => {
                if let Some(escalation) = &exchange.user_escalation {
                    print_escalation(escalation);
                }
                println!("companion: {}", exchange.reply);
                if let Some(escalation) = &exchange.reply_escalation {
                    print_escalation(escalation);
                }
            }
            Err(error) => {
                // the user's message may still have raised crisis mode
                print_banner(chat.escalation());
                let hint = if error.is_retryable() { " (try again)" } else { "" };
                println!("error: {error}{hint}");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}
