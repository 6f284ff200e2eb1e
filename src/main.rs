//! Purpose: `storefront` CLI entry point.
//! Role: Binary crate root; parses args, wires the client, emits JSON on stdout.
//! Invariants: Success envelopes are printed as JSON on stdout.
//! Invariants: Failures and errors are emitted as JSON on stderr (text on a TTY).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Session mutations go through `api::SessionStore` only.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use storefront::api::{
    Area, ClientConfig, ConfigOverrides, Error, ErrorKind, Failure, FailureKind, Gate, Resource,
    ResourceState, StorefrontClient, to_exit_code,
};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `storefront --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let config = ClientConfig::resolve(ConfigOverrides {
        base_url: cli.base_url,
        data_dir: cli.dir,
        timeout: cli.timeout_secs.map(Duration::from_secs),
        tls_ca: cli.tls_ca,
    });

    command_dispatch::dispatch_command(cli.command, &config, color_mode)
        .map_err(add_io_hint)
        .map_err(add_corrupt_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "storefront",
    version,
    about = "Command-line client for the storefront API",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Every command performs one API call and prints the response envelope as JSON.

Mental model:
  - `login` stores your session (encrypted, under --dir)
  - cart, checkout, orders and rate need a session
  - a 403 from the server signs you out
"#,
    after_help = r#"EXAMPLES
  $ storefront login kejiah --code 123456
  $ storefront search shoe
  $ storefront cart add 66f1c0a2e4 --quantity 2
  $ storefront checkout --receipt-email kejiah@example.com

LEARN MORE
  $ storefront <command> --help
  Set RUST_LOG=debug to trace requests."#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Data directory for session and preferences (default: ~/.storefront, env STOREFRONT_DIR)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "API base URL (default: http://127.0.0.1:8000, env STOREFRONT_BASE_URL)",
        value_hint = ValueHint::Url
    )]
    base_url: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        help = "Request timeout in seconds (default: 120)"
    )]
    timeout_secs: Option<u64>,
    #[arg(
        long,
        global = true,
        help = "PEM file with CA certificates to trust for https",
        value_hint = ValueHint::FilePath
    )]
    tls_ca: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Sign in and store the session",
        after_help = r#"EXAMPLES
  $ storefront login kejiah --code 123456
  $ storefront login "Kejiah Ade" --code 654321   # stored as kejiah_ade"#
    )]
    Login {
        #[arg(help = "Username (lowercased, spaces become _)")]
        username: String,
        #[arg(long, help = "6-digit access code")]
        code: String,
    },
    #[command(about = "Create an account (the access code is sent by email)")]
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, help = "Age between 18 and 100")]
        age: u32,
        #[arg(long, default_value = "")]
        gender: String,
    },
    #[command(about = "Request a code reset token by email")]
    RequestCodeReset {
        username: String,
        #[arg(long)]
        email: String,
    },
    #[command(about = "Replace the access code using a reset token")]
    ResetCode {
        #[arg(long)]
        old_code: String,
        #[arg(long)]
        new_code: String,
        #[arg(long)]
        reset_token: String,
    },
    #[command(about = "Forget the stored session")]
    Logout,
    #[command(about = "Print the stored identity (token redacted)")]
    Whoami,
    #[command(about = "Home listing, personalized by recently viewed products")]
    Home,
    #[command(about = "List product categories")]
    Categories,
    #[command(about = "Show product details and remember the view")]
    Product { id: String },
    #[command(about = "Search products by name")]
    Search { name: String },
    #[command(about = "List products in a category")]
    Category { id: String },
    #[command(about = "Products related to a product")]
    Related {
        id: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        category_id: Option<String>,
    },
    #[command(arg_required_else_help = true, about = "Inspect and change the cart")]
    Cart {
        #[command(subcommand)]
        command: CartCommand,
    },
    #[command(about = "Place an order for the current cart")]
    Checkout {
        #[arg(long, help = "Address that receives the receipt")]
        receipt_email: String,
    },
    #[command(about = "List your orders")]
    Orders,
    #[command(about = "Rate a product from 1 to 5")]
    Rate { product_id: String, rating: u8 },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ storefront completion bash > ~/.local/share/bash-completion/completions/storefront
  $ storefront completion zsh > ~/.zfunc/_storefront
  $ storefront completion fish > ~/.config/fish/completions/storefront.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CartCommand {
    #[command(about = "Show the cart with product details")]
    Show,
    #[command(about = "Add units of a product")]
    Add {
        product_id: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    #[command(about = "Take units of a product out")]
    Decrease {
        product_id: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    #[command(about = "Remove a product line entirely")]
    Remove { product_id: String },
    #[command(about = "Remove everything")]
    Empty,
}

/// Fails with a redirect-to-login error unless a session is stored.
fn require_session(client: &StorefrontClient) -> Result<(), Error> {
    match client.gate(Area::Protected) {
        Gate::Show => Ok(()),
        _ => Err(Error::new(ErrorKind::Permission)
            .with_message("not signed in")
            .with_hint("Run `storefront login <username> --code <code>` first.")),
    }
}

fn start_runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })
}

/// Drives a resource to its terminal state, narrating progress on stderr.
fn drive<T>(resource: Resource<T>) -> Result<Result<T, Failure>, Error>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let runtime = start_runtime()?;
    let path = resource.path().unwrap_or_default();
    let show_progress = io::stderr().is_terminal();
    Ok(runtime.block_on(async move {
        let mut states = Box::pin(resource.states());
        let mut terminal = None;
        while let Some(state) = states.next().await {
            match state {
                ResourceState::Idle => {}
                ResourceState::Loading => {
                    tracing::debug!(%path, "loading");
                    if show_progress {
                        eprintln!("loading {path}…");
                    }
                }
                ResourceState::Success(value) => terminal = Some(Ok(value)),
                ResourceState::Failure(failure) => terminal = Some(Err(failure)),
            }
        }
        terminal.unwrap_or_else(|| {
            Err(Failure::new(FailureKind::Transport, "request ended without a result"))
        })
    }))
}

/// Prints a success payload, or the failure, and picks the exit code.
fn finish<T: Serialize>(result: Result<T, Failure>, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match result {
        Ok(value) => {
            let value = serde_json::to_value(&value).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode response json")
                    .with_source(err)
            })?;
            emit_json(value);
            Ok(RunOutcome::ok())
        }
        Err(failure) => {
            emit_failure(&failure, color_mode);
            Ok(RunOutcome::with_code(failure_exit_code(&failure)))
        }
    }
}

fn failure_exit_code(failure: &Failure) -> i32 {
    let kind = match failure.kind() {
        FailureKind::BadRequest | FailureKind::Unprocessable => ErrorKind::Usage,
        FailureKind::Unauthorized | FailureKind::Forbidden => ErrorKind::Permission,
        FailureKind::NotFound => ErrorKind::NotFound,
        FailureKind::Decode => ErrorKind::Corrupt,
        FailureKind::Transport | FailureKind::Local => ErrorKind::Io,
        FailureKind::Server | FailureKind::Status(_) => ErrorKind::Internal,
    };
    to_exit_code(kind)
}

fn emit_json(value: Value) {
    let pretty = io::stdout().is_terminal();
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_failure(failure: &Failure, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!(
            "{} {}",
            colorize_label("error:", color_mode.use_color(is_tty), AnsiColor::Red),
            failure.message()
        );
        return;
    }
    let json = serde_json::to_string(&failure_json(failure)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn failure_json(failure: &Failure) -> Value {
    let kind = match failure.kind() {
        FailureKind::Status(_) => "Status".to_string(),
        other => format!("{other:?}"),
    };
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(kind));
    inner.insert("message".to_string(), json!(failure.message()));
    if let Some(status) = failure.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => err.with_hint(
            "Permission denied. Check directory permissions or use --dir to a writable location.",
        ),
        ErrorKind::Io => err.with_hint("I/O error. Check the data directory and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("Stored data is unreadable. Run `storefront logout` to reset the session.")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
