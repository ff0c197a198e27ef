//! Echo Bot Example
//!
//! A small LINE bot built on Linex, showing plain handlers, text commands
//! with typed arguments, postback routes and `wait_for`.
//!
//! # Commands
//!
//! ```text
//! /echo <text>   - Echo text
//! /add <a>;<b>   - Add two integers
//! /whoami        - Show your profile
//! /vote          - Vote with quick reply buttons
//! /ask           - Ask a question and wait for the answer
//! ```
//!
//! # Usage
//!
//! ```bash
//! LINEX_CHANNEL_SECRET=... LINEX_CHANNEL_ACCESS_TOKEN=... \
//!     cargo run --package echo-bot -- --port 8080
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use linex::framework::Dispatcher;
use linex::prelude::*;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(about = "A simple echo bot example for the Linex framework")]
struct Args {
    /// Configuration file (defaults to ./linex.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Port to listen on, overriding the configuration.
    #[arg(long)]
    port: Option<u16>,
}

// ============================================================================
// Handler Functions
// ============================================================================

/// Logs every text message.
async fn logging_handler(ctx: Arc<TextMessageContext>) {
    info!(
        user = ctx.source().user_id().unwrap_or("unknown"),
        latency = ?ctx.latency(),
        "{}",
        ctx.text_with_emojis()
    );
}

/// Greets new friends.
async fn follow_handler(ctx: Arc<FollowContext>) -> Result<String> {
    let user = ctx.author().await?;
    Ok(format!(
        "Hi {}! Send /echo <text> and I'll say it back.",
        user.display_name
    ))
}

async fn echo_handler(_: Arc<TextMessageContext>, text: Rest) -> String {
    text.0
}

async fn add_handler(_: Arc<TextMessageContext>, a: i64, b: i64) -> String {
    format!("{a} + {b} = {}", a + b)
}

async fn whoami_handler(ctx: Arc<TextMessageContext>) -> Result<String> {
    let user = ctx.author().await?;
    Ok(format!(
        "📋 Profile\n• Name: {}\n• ID: {}\n• Language: {}",
        user.display_name, user.user_id, user.language
    ))
}

/// Offers quick reply buttons that send `vote;<choice>` postbacks.
async fn vote_handler(ctx: Arc<TextMessageContext>) -> Result<()> {
    let options = ["cats", "dogs"]
        .into_iter()
        .fold(ReplyOptions::new(), |options, choice| {
            options.quick_reply(json!({
                "type": "action",
                "action": {
                    "type": "postback",
                    "label": choice,
                    "data": postback_data("vote", [choice]),
                    "displayText": choice,
                }
            }))
        });
    ctx.reply_with(["Cats or dogs?"], options).await?;
    Ok(())
}

async fn vote_result_handler(_: Arc<PostbackContext>, choice: String) -> String {
    format!("You voted for {choice}!")
}

/// Asks a question, then waits for the same user's next text message.
///
/// The wait runs in its own task so the webhook request is answered now.
async fn ask_handler(ctx: Arc<TextMessageContext>, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let Some(user_id) = ctx.source().user_id().map(str::to_string) else {
        return Ok(());
    };
    ctx.reply(["What's your favourite colour?"]).await?;

    tokio::spawn(async move {
        let answer = dispatcher
            .wait_for_context::<TextMessageContext, _>(
                move |next| next.source().user_id() == Some(user_id.as_str()),
                Some(Duration::from_secs(60)),
            )
            .await;

        let result = match answer {
            Ok(next) => next.reply([format!("{} is a fine colour.", next.text())]).await,
            Err(e) => {
                warn!(error = %e, "No answer");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to answer");
        }
    });
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = LinexRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    let mut config = builder.load()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let runtime = LinexRuntime::from_config(&config)?;

    runtime.on_ready(|bot: Arc<BotUser>| async move {
        info!(
            bot = %bot.display_name,
            settings = %bot.response_settings_url(),
            "Echo bot ready"
        );
    });

    runtime.on::<TextMessageContext, _, _>(logging_handler);
    runtime.on::<FollowContext, _, _>(follow_handler);

    runtime.command("/echo", echo_handler)?;
    runtime.command("/add", add_handler)?;
    runtime.command("/whoami", whoami_handler)?;
    runtime.command("/vote", vote_handler)?;
    runtime.postback("vote", vote_result_handler)?;

    let dispatcher = Arc::clone(runtime.dispatcher());
    runtime.command("/ask", move |ctx: Arc<TextMessageContext>| {
        ask_handler(ctx, Arc::clone(&dispatcher))
    })?;

    runtime.run().await?;

    Ok(())
}
