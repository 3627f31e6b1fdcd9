use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::{Path, PathBuf};

mod app;
mod config;
mod db;
mod error;
mod logger;
mod modal;
mod view;

use crate::app::App;
use crate::db::Store;

const DB_FILE: &str = "local.db";

fn open_store(data_dir: &Path) -> Result<Store> {
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    Store::open(&data_dir.join(DB_FILE)).context("Failed to open notebook store")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableBracketedPaste)?;
    Ok(())
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory for the database, config and logs (default: ~/.notekeeper)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI application (default)
    Tui,
    /// Print every notebook and its notes
    List,
    /// Print the stored notebooks as JSON
    Export,
    /// Delete all notebooks and notes
    ResetLocal,
}

fn print_notebooks(store: &Store) -> Result<()> {
    let notebooks = store.list_notebooks()?;
    if notebooks.is_empty() {
        println!("No notebooks.");
        return Ok(());
    }
    let now = chrono::Utc::now().timestamp_millis();
    for notebook in notebooks {
        println!("{} ({} notes)", notebook.name, notebook.notes.len());
        for note in &notebook.notes {
            let posted = Local
                .timestamp_millis_opt(note.posted_on)
                .single()
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let title = if note.title.is_empty() {
                db::UNTITLED
            } else {
                note.title.as_str()
            };
            println!(
                "  - {}  [{}, {}]",
                title,
                posted,
                view::relative_age(note.posted_on, now)
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_hook(info);
    }));

    let args = Args::parse();
    let data_dir = config::resolve_data_dir(args.data_dir);

    logger::init(&data_dir)?;
    let store = open_store(&data_dir)?;

    match args.command {
        Some(Commands::List) => return print_notebooks(&store),
        Some(Commands::Export) => {
            println!("{}", store.export()?);
            return Ok(());
        }
        Some(Commands::ResetLocal) => {
            store.clear()?;
            println!("All notebooks deleted.");
            return Ok(());
        }
        None | Some(Commands::Tui) => {
            // Proceed to TUI
        }
    }

    let app_config = config::load_config(&data_dir);
    let mut app = App::new(store, app_config, data_dir)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    info!("Starting UI");
    let app_result = app.run(&mut terminal).await;

    let _ = restore_terminal();
    if let Err(err) = app_result {
        eprintln!("Error: {:?}", err);
    }
    Ok(())
}
