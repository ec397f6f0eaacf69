//! Console Bot Example
//!
//! Runs a Herald bot against the terminal: every line read from stdin is a
//! message, every reply is printed to stdout.
//!
//! # Commands
//!
//! ```text
//! !ping              - Pong!
//! !echo <text>       - Echo text
//! !roll [sides]      - Roll a die (2 rolls per 30s)
//! !whoami            - Message info
//! !help              - Commands you can use here
//! !mod kick <user>   - Guild only, needs Kick Members
//! !slow              - Takes a while; watch the typing indicator
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot
//! cargo run --package console-bot -- --guild 1 --admin
//! ```

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use herald::core::{ApiError, ApiResult, MessageId};
use herald::prelude::*;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

const BOT_ID: UserId = UserId(1);

#[derive(Debug, Parser)]
#[command(about = "Talk to a Herald bot from the terminal")]
struct Cli {
    /// Configuration file (herald.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send messages as if in this guild instead of a direct message
    #[arg(long)]
    guild: Option<u64>,

    #[arg(long, default_value_t = 42)]
    user: u64,

    #[arg(long, default_value = "console")]
    name: String,

    /// Grant the console user every guild permission
    #[arg(long)]
    admin: bool,
}

// ============================================================================
// Console Bot
// ============================================================================

/// A bot whose channel is the terminal.
struct ConsoleBot {
    next_id: AtomicU64,
    admin: bool,
}

#[async_trait]
impl Bot for ConsoleBot {
    fn id(&self) -> UserId {
        BOT_ID
    }

    async fn send_text(&self, channel: ChannelId, text: &str) -> ApiResult<MessageId> {
        println!("[#{channel}] herald: {text}");
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn send_content(&self, channel: ChannelId, content: &Value) -> ApiResult<MessageId> {
        let rendered = serde_json::to_string_pretty(content)
            .map_err(|e| ApiError::Other(e.to_string()))?;
        self.send_text(channel, &rendered).await
    }

    async fn trigger_typing(&self, channel: ChannelId) -> ApiResult<()> {
        println!("[#{channel}] herald is typing...");
        Ok(())
    }

    async fn permissions_in(&self, _event: &MessageEvent) -> ApiResult<Permissions> {
        Ok(Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS)
    }

    async fn author_permissions(&self, event: &MessageEvent) -> ApiResult<Permissions> {
        if self.admin || event.is_direct() {
            Ok(Permissions::ADMINISTRATOR)
        } else {
            Ok(Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES)
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn ping() -> &'static str {
    "Pong! 🏓"
}

async fn echo(Args(text): Args<String>) -> String {
    text.to_string()
}

async fn roll(Args(args): Args<Vec<String>>) -> Result<String, UserError> {
    let sides: u64 = match args.first() {
        Some(raw) => raw
            .parse()
            .ok()
            .filter(|&n| n > 1)
            .ok_or_else(|| UserError::new(format!("'{raw}' is not a die I can roll.")))?,
        None => 6,
    };
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::from(d.subsec_nanos()));
    Ok(format!("🎲 You rolled {} (d{sides})", nanos % sides + 1))
}

async fn whoami(event: MessageEvent) -> String {
    let place = match event.guild_id {
        Some(guild) => format!("guild {guild}, channel {}", event.channel_id),
        None => format!("a direct message (channel {})", event.channel_id),
    };
    format!(
        "📋 You are {} ({}), writing in {place}",
        event.author.name, event.author.id
    )
}

async fn help(ctx: Arc<InvokeContext>) -> String {
    let tree = ctx.command().tree();
    let commands = tree
        .visible_commands(ctx.event(), ctx.bot().as_ref())
        .await;

    let mut lines = vec!["Commands you can use here:".to_string()];
    for command in commands {
        let usage = command.args().usage().unwrap_or_default();
        let line = format!("  {}{} {usage}", ctx.prefix(), command.identifier().replace('.', " "));
        lines.push(match command.short_description() {
            Some(text) => format!("{} - {text}", line.trim_end()),
            None => line.trim_end().to_string(),
        });
    }
    lines.join("\n")
}

async fn kick(Args(args): Args<Vec<String>>) -> String {
    let user = args.first().map_or("nobody", String::as_str);
    format!("👢 {user} has been kicked (not really).")
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(8)).await;
    "Finally done."
}

// ============================================================================
// Plugin definition
// ============================================================================

fn builtin() -> Source {
    Source::new("builtin")
        .command(CommandDefinition::new("ping", ping).description("Pong!"))
        .command(
            CommandDefinition::new("echo", echo)
                .description("Echo text")
                .args(RawArgs::required("text")),
        )
        .command(
            CommandDefinition::new("roll", roll)
                .alias("dice")
                .description("Roll a die")
                .args(ShellArgs::new().max(1))
                .throttle(PerUser::new(2, Duration::from_secs(30))),
        )
        .command(CommandDefinition::new("whoami", whoami).description("Message info"))
        .command(CommandDefinition::new("help", help).description("This help"))
        .command(CommandDefinition::new("slow", slow).description("Takes a while"))
        .module(
            ModuleDefinition::new("mod")
                .description("Moderation")
                .channel_types(ChannelTypes::GUILD)
                .command(
                    CommandDefinition::new("kick", kick)
                        .description("Kick a member")
                        .args(ShellArgs::new().required("user").max(1))
                        .restriction(user_permissions(Permissions::KICK_MEMBERS)),
                ),
        )
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let timing = middleware_fn(|ctx, next| async move {
        let started = Instant::now();
        let result = next.run(ctx).await;
        debug!(elapsed = ?started.elapsed(), "Invocation finished");
        result
    });

    let mut builder = HeraldRuntime::builder().source(builtin()).middleware(timing);
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;

    let bot: BoxedBot = Arc::new(ConsoleBot {
        next_id: AtomicU64::new(1),
        admin: cli.admin,
    });

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(read_stdin(cli, tx));

    info!("Type messages below, e.g. `!help`. Ctrl+D or Ctrl+C to quit.");
    runtime.run(bot, rx).await?;

    Ok(())
}

/// Forwards stdin lines as messages until EOF.
async fn read_stdin(cli: Cli, tx: mpsc::Sender<MessageEvent>) -> Result<()> {
    let author = Author::user(cli.user, cli.name);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut id = 0u64;

    while let Some(line) = lines.next_line().await? {
        id += 1;
        let event = match cli.guild {
            Some(guild) => MessageEvent::guild(id, author.clone(), guild, 100, line),
            None => MessageEvent::direct(id, author.clone(), 10, line),
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}
