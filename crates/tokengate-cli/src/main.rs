//! tokengate - terminal front-end for the inventory backend session.
//!
//! Logs in against the backend, keeps the token in the OS keychain, and
//! issues authenticated requests through the shared pipeline.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokengate_core::{ApiError, ClientContext, Config, SessionCoordinator, SessionPhase};

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for a forced logout to finish before exiting
const FORCED_LOGOUT_WAIT_SECS: u64 = 5;

const USAGE: &str = "Usage: tokengate <command>

Commands:
  login [email]   Log in and store the session token
  logout          Forget the stored session token
  status          Show the stored session
  get <path>      GET a backend path with the session token";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let mut config = Config::load()?;
    let ctx = ClientContext::with_keyring(config.client_settings()?)
        .context("Failed to create API client")?;
    let session = SessionCoordinator::new(&ctx);
    let phase = session.bootstrap().await;
    info!(?phase, "Session bootstrapped");

    match command.as_str() {
        "login" => login(&ctx, &session, &mut config, args.get(2).cloned()).await,
        "logout" => {
            session.logout().await?;
            eprintln!("Logged out");
            Ok(())
        }
        "status" => {
            print_status(&ctx, &session);
            Ok(())
        }
        "get" => {
            let path = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("get needs a path, e.g. /api/products"))?;
            get(&ctx, &session, path).await
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

async fn login(
    ctx: &ClientContext,
    session: &SessionCoordinator,
    config: &mut Config,
    email: Option<String>,
) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    if let Err(e) = session.login(&email, &password).await {
        eprintln!("{}", e.user_message());
        if let Some(fields) = e.field_errors() {
            for message in &fields.email {
                eprintln!("  email: {}", message);
            }
            for message in &fields.password {
                eprintln!("  password: {}", message);
            }
        }
        std::process::exit(1);
    }

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }

    print_status(ctx, session);
    Ok(())
}

async fn get(ctx: &ClientContext, session: &SessionCoordinator, path: &str) -> Result<()> {
    let mut rx = session.subscribe();
    match ctx.api().get::<serde_json::Value>(path).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e @ ApiError::Unauthorized(_)) => {
            // Let the forced logout finish before the process exits
            let _ = tokio::time::timeout(
                Duration::from_secs(FORCED_LOGOUT_WAIT_SECS),
                rx.wait_for(|s| !s.has_credential()),
            )
            .await;
            eprintln!("Session expired, log in again");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_status(ctx: &ClientContext, session: &SessionCoordinator) {
    let state = session.snapshot();
    match (state.phase(), state.credential()) {
        (SessionPhase::Authenticated { role }, Some(credential)) => {
            let claims = credential.claims();
            println!("Logged in to {}", ctx.settings().base_url);
            println!("  role:    {}", role);
            if let Some(ref sub) = claims.sub {
                println!("  subject: {}", sub);
            }
            if let Some(issued) = claims.issued_at() {
                println!("  issued:  {}", issued.format("%Y-%m-%d %H:%M UTC"));
            }
            if let Some(expires) = claims.expires_at() {
                println!("  expires: {}", expires.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        _ => println!("Not logged in to {}", ctx.settings().base_url),
    }
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("{} is required", label.trim_end_matches(": "));
    }
    Ok(value)
}
