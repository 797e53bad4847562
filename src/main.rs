use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trendcloud::{feeds::api::ApiClient, App, Config};

const LOG_ENV: &str = "TRENDCLOUD_LOG";

#[derive(Parser, Debug)]
#[command(name = "trendcloud", version, about = "Trending stock keyword cloud for the terminal")]
struct Cli {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Seed for random word rotations (reproducible layout)
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write logs
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Check that the backend is reachable and exit
    #[arg(long)]
    health: bool,

    /// Print the mention and sentiment history of a keyword and exit
    #[arg(long, value_name = "KEYWORD")]
    history: Option<String>,

    /// How many days of history to print
    #[arg(long, default_value_t = 7, requires = "history")]
    days: u32,
}

fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("trendcloud").join("trendcloud.log"))
}

/// Logs go to a file because the terminal belongs to the UI. If the file
/// cannot be opened the app runs without logging.
fn init_logging(path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("trendcloud=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .try_init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(Config::default_path);
    let mut config = match path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    }
    .with_env_overrides();

    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
    }
    if cli.seed.is_some() {
        config.cloud.seed = cli.seed;
    }
    config.validate()?;
    Ok(config)
}

async fn check_health(client: &ApiClient) -> Result<()> {
    let status = client
        .check_health()
        .await
        .with_context(|| format!("backend at {} is not healthy", client.base_url()))?;
    println!("{}: {}", client.base_url(), status.status);
    Ok(())
}

async fn print_history(client: &ApiClient, keyword: &str, days: u32) -> Result<()> {
    let points = client
        .fetch_history(keyword, days)
        .await
        .with_context(|| format!("fetching {days}-day history for {keyword}"))?;

    if points.is_empty() {
        println!("{keyword}: no history for the last {days} days");
        return Ok(());
    }
    println!("{keyword} over the last {days} days");
    for point in &points {
        println!(
            "{:<25} {:>8} mentions  sentiment {:+.2}",
            point.date, point.mentions, point.sentiment
        );
    }
    Ok(())
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = cli.log_file.clone().or_else(default_log_path);
    init_logging(log_path.as_deref());

    let config = load_config(&cli)?;
    tracing::info!(base_url = %config.api.base_url, "starting trendcloud");
    let client = ApiClient::new(&config.api);

    if cli.health {
        return check_health(&client).await;
    }
    if let Some(keyword) = &cli.history {
        return print_history(&client, keyword, cli.days).await;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_hook(info);
    }));

    let mut app = App::new(Arc::new(client), &config);
    let result = app.run(&mut terminal).await;

    restore_terminal()?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "trendcloud exited with an error");
    }
    result
}
