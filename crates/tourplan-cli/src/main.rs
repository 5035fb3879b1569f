mod tui;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tourplan_api::HttpConfig;
use tourplan_app::Config;
use tourplan_auth::{AuthClient, CredentialStore, SignInForm, SignUpForm, SignedIn};
use tourplan_core::{Dashboard, History, SignOutReason};
use tourplan_db::Store;
use tracing_subscriber::EnvFilter;

use crate::tui::app::App;

const KEYRING_SERVICE: &str = "tourplan";
const LOG_FILTER_ENV: &str = "TOURPLAN_LOG";

#[derive(Parser)]
#[command(name = "tourplan", version, about = "Chat with a travel planner from your terminal.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Planner API base URL (overrides TOURPLAN_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Clone, Copy, Subcommand)]
enum Command {
    /// Open the dashboard (default).
    Chat,
    /// Sign in with email and password, then open the dashboard.
    Signin,
    /// Create an account, then open the dashboard.
    Signup,
    /// Forget the stored token, name and chat history.
    Signout,
    /// Delete the saved chat history but stay signed in.
    Clear,
    /// Print the saved chat history.
    History,
}

/// Handles shared by every subcommand.
struct Context {
    config: Config,
    store: Arc<Mutex<Store>>,
    credentials: CredentialStore,
}

impl Context {
    fn open(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match &cli.api_url {
            Some(url) => Config::with_api_url(url.as_str())?,
            None => Config::from_env()?,
        };
        let store = Arc::new(Mutex::new(Store::open(tourplan_app::session_db_path()?)?));
        let credentials = CredentialStore::new(KEYRING_SERVICE, Arc::clone(&store));
        Ok(Self {
            config,
            store,
            credentials,
        })
    }

    fn auth_client(&self) -> AuthClient {
        AuthClient::new(self.config.api_url.clone(), self.credentials.clone())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging()?;

    // Install a panic hook that restores the terminal before printing the
    // panic message, so the user isn't left with a broken terminal.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tui::restore_terminal();
        default_hook(info);
    }));

    let ctx = Context::open(&cli)?;
    tracing::info!(api_url = %ctx.config.api_url, "starting tourplan");

    let outcome = match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_dashboard(&ctx).await,
        Command::Signin => match sign_in(&ctx).await {
            Ok(signed_in) => {
                greet(&signed_in);
                run_dashboard(&ctx).await
            }
            Err(err) => return report_auth_error(err),
        },
        Command::Signup => match sign_up(&ctx).await {
            Ok(signed_in) => {
                greet(&signed_in);
                run_dashboard(&ctx).await
            }
            Err(err) => return report_auth_error(err),
        },
        Command::Signout => {
            ctx.store.lock().slots().clear()?;
            println!("Signed out.");
            Ok(())
        }
        Command::Clear => {
            History::restore(Arc::clone(&ctx.store)).clear();
            println!("Chat history cleared.");
            Ok(())
        }
        Command::History => {
            print_history(&ctx);
            Ok(())
        }
    };
    outcome.map(|()| ExitCode::SUCCESS)
}

/// Logs go to a file because the dashboard owns the terminal.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let path = tourplan_app::log_path()?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_dashboard(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let client = tourplan_api::http(HttpConfig {
        base_url: ctx.config.api_url.clone(),
    });
    let dashboard = Dashboard::start(client, Arc::clone(&ctx.store), ctx.credentials.clone());
    let mut app = App::new(dashboard);

    tui::launch(&mut app).await?;

    match app.sign_out_reason() {
        Some(SignOutReason::User) => {
            println!("Signed out. Run `tourplan signin` to sign in again.");
        }
        Some(SignOutReason::Unauthorized) => {
            println!("Your session has expired. Run `tourplan signin` to sign in again.");
        }
        None => {}
    }
    Ok(())
}

async fn sign_in(ctx: &Context) -> Result<SignedIn, AuthError> {
    let form = SignInForm {
        email: prompt_line("Email: ")?,
        password: rpassword::prompt_password("Password: ")?,
    };
    Ok(ctx.auth_client().sign_in(&form).await?)
}

async fn sign_up(ctx: &Context) -> Result<SignedIn, AuthError> {
    let form = SignUpForm {
        name: prompt_line("Full name: ")?,
        email: prompt_line("Email: ")?,
        password: rpassword::prompt_password("Password: ")?,
        confirm_password: rpassword::prompt_password("Confirm password: ")?,
    };
    Ok(ctx.auth_client().sign_up(&form).await?)
}

/// Failure while collecting or submitting credentials.
#[derive(Debug, thiserror::Error)]
enum AuthError {
    #[error("failed to read input: {0}")]
    Prompt(#[from] io::Error),

    #[error(transparent)]
    Auth(#[from] tourplan_auth::Error),
}

/// Form and server messages are shown as-is and end the process with a
/// failure status; prompt failures propagate.
fn report_auth_error(err: AuthError) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match err {
        AuthError::Auth(err) => {
            tracing::warn!(error = %err, "authentication failed");
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
        AuthError::Prompt(err) => Err(err.into()),
    }
}

fn greet(signed_in: &SignedIn) {
    let name = signed_in
        .display_name
        .as_deref()
        .unwrap_or(tourplan_auth::DEFAULT_DISPLAY_NAME);
    println!("Welcome, {name}!");
    if !signed_in.has_token {
        println!("The server did not issue a token; chat requests will fail until you sign in.");
    }
}

fn print_history(ctx: &Context) {
    let history = History::restore(Arc::clone(&ctx.store));
    if history.is_empty() {
        println!("No saved messages.");
        return;
    }

    for turn in history.turns() {
        let time = turn.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let label = if turn.is_user() { "You" } else { "Assistant" };
        println!("[{time}] {label}:");
        for line in turn.content.lines() {
            println!("  {line}");
        }
        if let Some(map) = &turn.map {
            println!(
                "  [map: {} → {} ({})]",
                map.journey.origin, map.journey.destination, map.image_reference
            );
        }
    }
}

fn prompt_line(prompt: &str) -> Result<String, io::Error> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
