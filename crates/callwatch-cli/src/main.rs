//! Callwatch CLI - Start and follow outbound AI calls
//!
//! Thin client over the Callwatch HTTP API.

mod api;
mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use dialoguer::Password;
use serde_json::Value;
use std::time::Duration;

use api::{CallwatchClient, SessionResponse, StartCallRequest};
use config::Config;

const WATCH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "callwatch")]
#[command(about = "Callwatch CLI - Start and follow outbound AI calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the API URL and an optional key
    Login {
        /// API base URL (e.g. http://localhost:5001)
        #[arg(short, long)]
        url: Option<String>,
        /// API key (will prompt if not provided)
        #[arg(short, long)]
        key: Option<String>,
        /// Do not store a key
        #[arg(long)]
        no_key: bool,
    },

    /// Show current configuration
    Config,

    /// Check the API is reachable
    Health,

    /// Start an outbound call
    Call {
        /// Destination in international format, e.g. +34699043286
        phone: String,
        /// Question to ask (repeatable)
        #[arg(short, long = "question")]
        questions: Vec<String>,
        #[arg(long)]
        agent_name: Option<String>,
        /// What the call is for
        #[arg(long)]
        purpose: Option<String>,
        /// Voice id
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        first_message: Option<String>,
        /// Replace the generated agent prompt
        #[arg(long)]
        prompt: Option<String>,
        /// Follow the call until it ends and print the result
        #[arg(short, long)]
        watch: bool,
    },

    /// Show a call's status
    Status { job_id: String },

    /// List tracked calls
    List,

    /// Look up a finished call's results with the provider
    Reconcile { job_id: String },

    /// Show a call's results
    Result { job_id: String },

    /// Show the provider's conversation records for a call
    Diagnostics { job_id: String },

    /// Stop polling a call
    Stop { job_id: String },

    /// Discard a tracked call
    Forget { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login { url, key, no_key } => cmd_login(url, key, no_key).await,
        Commands::Config => cmd_config(),
        Commands::Health => cmd_health(&client()?).await,
        Commands::Call {
            phone,
            questions,
            agent_name,
            purpose,
            voice,
            language,
            first_message,
            prompt,
            watch,
        } => {
            let request = StartCallRequest {
                phone_number: phone,
                questions,
                agent_name,
                call_purpose: purpose,
                voice_id: voice,
                language,
                first_message,
                custom_prompt: prompt,
            };
            cmd_call(&client()?, request, watch).await
        }
        Commands::Status { job_id } => {
            let session = client()?.get_call(&job_id).await?;
            print_session(&session);
            Ok(())
        }
        Commands::List => cmd_list(&client()?).await,
        Commands::Reconcile { job_id } => cmd_reconcile(&client()?, &job_id).await,
        Commands::Result { job_id } => {
            let resp = client()?.result(&job_id).await?;
            print_result_state(&resp.result);
            Ok(())
        }
        Commands::Diagnostics { job_id } => {
            let snapshot = client()?.diagnostics(&job_id).await?;
            print_snapshot(&snapshot);
            Ok(())
        }
        Commands::Stop { job_id } => {
            let resp = client()?.stop_call(&job_id).await?;
            if resp.stopped {
                println!("{} Polling stopped for {}", "✓".green(), job_id.cyan());
            } else {
                println!("{} {} was not being polled", "-".dimmed(), job_id.cyan());
            }
            Ok(())
        }
        Commands::Forget { job_id } => {
            let removed = client()?.forget_call(&job_id).await?;
            println!(
                "{} Forgot {} ({})",
                "✓".green(),
                removed.job_id.cyan(),
                status_colored(&removed.status)
            );
            Ok(())
        }
    }
}

/// Client for the configured API
fn client() -> Result<CallwatchClient> {
    let config = Config::load()?;
    Ok(CallwatchClient::new(&config.base_url, config.api_key.as_deref()))
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_login(url: Option<String>, key: Option<String>, no_key: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = url {
        config.set_base_url(&url);
    }

    let api_key = match (key, no_key) {
        (_, true) => None,
        (Some(k), false) => Some(k),
        (None, false) => {
            let entered = Password::new()
                .with_prompt("API Key (empty for none)")
                .allow_empty_password(true)
                .interact()
                .context("Failed to read API key")?;
            Some(entered).filter(|k| !k.trim().is_empty())
        }
    };

    let client = CallwatchClient::new(&config.base_url, api_key.as_deref());
    print!("Testing connection to {}... ", config.base_url);
    match client.health().await {
        Ok(_) => println!("{}", "OK".green()),
        Err(e) => {
            println!("{}", "Failed".red());
            bail!("Could not reach Callwatch API: {}", e);
        }
    }

    config.api_key = api_key;
    config.save()?;
    println!("{} Configuration saved to {:?}", "✓".green(), Config::config_path()?);
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  API Key: {}",
        if config.api_key.is_some() {
            "Set".green()
        } else {
            "Not set".yellow()
        }
    );
    Ok(())
}

async fn cmd_health(client: &CallwatchClient) -> Result<()> {
    let health = client.health().await?;
    println!(
        "{} {} v{} (provider: {}, tracked calls: {})",
        "✓".green(),
        health["message"].as_str().unwrap_or("ok"),
        health["version"].as_str().unwrap_or("?"),
        health["provider"].as_str().unwrap_or("?").cyan(),
        health["tracked_calls"]
    );
    Ok(())
}

async fn cmd_call(client: &CallwatchClient, request: StartCallRequest, watch: bool) -> Result<()> {
    let started = client.start_call(&request).await?;
    println!(
        "{} Call dispatched to {} [{}]",
        "✓".green(),
        request.phone_number.cyan(),
        status_colored(&started.status)
    );
    println!("  Job:   {}", started.job_id.bold());
    println!("  Agent: {} ({})", started.agent.name, started.agent_id.dimmed());
    println!(
        "  {} - {} questions",
        started.agent.purpose.dimmed(),
        started.agent.questions_count
    );

    if !watch {
        println!("\n{}", "Follow it with:".dimmed());
        println!("  callwatch status {}", started.job_id);
        return Ok(());
    }

    watch_call(client, &started.job_id).await
}

/// Poll the API until the call ends, then show its result
async fn watch_call(client: &CallwatchClient, job_id: &str) -> Result<()> {
    let mut last_status = String::new();
    loop {
        tokio::time::sleep(WATCH_INTERVAL).await;
        let session = client.get_call(job_id).await?;
        if session.status != last_status {
            println!("  {} {}", "→".dimmed(), status_colored(&session.status));
            last_status = session.status.clone();
        }
        if session.is_terminal() && (session.has_outcome || session.status != "completed") {
            break;
        }
    }

    println!();
    let resp = client.result(job_id).await?;
    print_result_state(&resp.result);
    Ok(())
}

async fn cmd_list(client: &CallwatchClient) -> Result<()> {
    let sessions = client.list_calls().await?;
    if sessions.is_empty() {
        println!("No calls tracked.");
        return Ok(());
    }

    println!("{}", "Calls:".bold());
    for s in sessions {
        let polling = if s.polling { " (polling)".dimmed().to_string() } else { String::new() };
        println!(
            "  {} {} [{}]{}",
            s.job_id.cyan(),
            s.phone_number.dimmed(),
            status_colored(&s.status),
            polling
        );
    }
    Ok(())
}

async fn cmd_reconcile(client: &CallwatchClient, job_id: &str) -> Result<()> {
    let outcome = client.reconcile(job_id).await?.outcome;
    match outcome["kind"].as_str() {
        Some("result") => print_call_result(&outcome["result"]),
        Some("diagnostic") => {
            println!("{} Giving up on the conversation lookup", "!".yellow());
            print_snapshot(&outcome["snapshot"]);
        }
        Some("not_found") => println!(
            "{} No conversation yet (attempt {} of {}). Try again later.",
            "…".yellow(),
            outcome["attempts"],
            outcome["max_attempts"]
        ),
        _ => println!("{}", outcome),
    }
    Ok(())
}

// ============================================
// Output helpers
// ============================================

fn status_colored(status: &str) -> ColoredString {
    match status {
        "completed" => status.green(),
        "failed" | "cancelled" => status.red(),
        "in_progress" => status.yellow(),
        _ => status.normal(),
    }
}

fn print_session(s: &SessionResponse) {
    println!("{} {}", "Call".bold(), s.job_id.cyan());
    println!("  Phone:    {}", s.phone_number);
    println!("  Status:   {}", status_colored(&s.status));
    println!(
        "  Updated:  {}",
        s.last_update.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
    );
    println!("  Polling:  {}", if s.polling { "yes" } else { "no" });
    println!("  Results:  {}", if s.has_outcome { "available" } else { "none" });
    if s.attempts > 0 {
        println!("  Lookups:  {}", s.attempts);
    }
}

fn print_result_state(state: &Value) {
    match state["state"].as_str() {
        Some("ready") => print_call_result(&state["result"]),
        Some("diagnostic") => print_snapshot(&state["snapshot"]),
        Some("pending") => println!(
            "{} Results pending (status {}, {} lookups)",
            "…".yellow(),
            state["status"].as_str().unwrap_or("?"),
            state["attempts"]
        ),
        Some("ended") => println!(
            "{} Call {} - no results",
            "✗".red(),
            status_colored(state["status"].as_str().unwrap_or("?"))
        ),
        _ => println!("{}", state),
    }
}

fn print_call_result(result: &Value) {
    println!(
        "{} Results ({})",
        "✓".green(),
        result["conversation_id"].as_str().unwrap_or("-").dimmed()
    );

    if let Some(answers) = result["extracted_info"].as_object() {
        for answer in answers.values() {
            let confidence = match &answer["confidence"] {
                Value::Number(n) => format!("{:.0}%", n.as_f64().unwrap_or(0.0) * 100.0),
                _ => "unscored".to_string(),
            };
            println!(
                "  {} {}",
                "Q:".dimmed(),
                answer["question"].as_str().unwrap_or("?")
            );
            println!(
                "  {} {} {}",
                "A:".bold(),
                answer["answer"].as_str().unwrap_or(""),
                format!("[{}]", confidence).dimmed()
            );
        }
    }

    if let Some(note) = result["note"].as_str() {
        println!("  {}", note.dimmed());
    }
}

fn print_snapshot(snapshot: &Value) {
    println!(
        "{} {} conversations for agent {} after {} lookups",
        "Diagnostics:".bold(),
        snapshot["total_conversations_found"],
        snapshot["agent_id"].as_str().unwrap_or("?").cyan(),
        snapshot["attempts"]
    );
    if let Some(note) = snapshot["note"].as_str() {
        println!("  {}", note.yellow());
    }
    if let Some(records) = snapshot["records"].as_array() {
        for r in records {
            println!(
                "  {} job={} status={}",
                r["conversation_id"].as_str().unwrap_or("?"),
                r["job_id"].as_str().unwrap_or("-"),
                r["status"].as_str().unwrap_or("-")
            );
        }
    }
}
