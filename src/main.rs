//! Terminal market dashboard
//!
//! Renders the dashboard to stdout whenever it changes and reads one command
//! per line from stdin.

use market_dashboard::{
    api_url_from_env,
    observability::{
        init_logging, log_app_shutdown, log_app_start, log_command_rejected, log_seed_loaded,
        logging_config_from_env,
    },
    render_dashboard, CoinGeckoGateway, DashboardConfig, DashboardError, DashboardTracker,
    MarketDataGateway, SortOrder, ViewModel,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: search <text> | sort <order> | page <n> | next | prev | refresh | quit\n\
Sort orders: market_cap_desc, market_cap_asc, volume_desc, volume_asc, id_asc, id_desc";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Search(String),
    Sort(SortOrder),
    Page(u32),
    Next,
    Previous,
    Refresh,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "search" | "s" => Ok(Command::Search(arg.to_string())),
            "sort" => arg
                .parse::<SortOrder>()
                .map(Command::Sort)
                .map_err(|e| e.to_string()),
            "page" | "p" => arg
                .parse::<u32>()
                .map(Command::Page)
                .map_err(|_| format!("Invalid page number: {}", arg)),
            "next" | "n" => Ok(Command::Next),
            "prev" | "previous" => Ok(Command::Previous),
            "refresh" | "r" => Ok(Command::Refresh),
            "help" | "?" | "" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Applies one command; returns false when the user asked to quit
async fn handle(tracker: &DashboardTracker, command: Command) -> Result<bool, DashboardError> {
    match command {
        Command::Search(text) => tracker.set_search_term(text).await,
        Command::Sort(order) => tracker.set_sort_order(order).await,
        Command::Page(page) => tracker.set_page(page).await?,
        Command::Next => {
            if !tracker.next_page().await {
                eprintln!("Already on the last page");
            }
        }
        Command::Previous => {
            if !tracker.previous_page().await {
                eprintln!("Already on the first page");
            }
        }
        Command::Refresh => tracker.refresh_now().await,
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging = logging_config_from_env();
    init_logging(&logging)?;

    let config = DashboardConfig::default();
    let gateway = Arc::new(CoinGeckoGateway::with_base_url(api_url_from_env())?);
    log_app_start(&logging, &config, gateway.gateway_name());

    let seed = DashboardTracker::bootstrap_seed(gateway.as_ref(), &config).await;
    log_seed_loaded(seed.len());

    let mut tracker = DashboardTracker::new(gateway, config, seed);
    let mut views = tracker.subscribe_view();
    tracker.start();

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_rendered: Option<ViewModel> = None;
    let mut rendered_frames: u64 = 0;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Err(DashboardError::Shutdown.into());
                }
                let view = views.borrow_and_update().clone();
                if last_rendered.as_ref() != Some(&view) {
                    println!("{}", render_dashboard(&view));
                    last_rendered = Some(view);
                    rendered_frames += 1;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(command) => match handle(&tracker, command).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => {
                            log_command_rejected(line.trim(), &e.to_string());
                            eprintln!("{}", e);
                        }
                    },
                    Err(msg) => {
                        log_command_rejected(line.trim(), &msg);
                        eprintln!("{}", msg);
                    }
                }
            }
        }
    }

    tracker.stop().await;
    log_app_shutdown(rendered_frames);
    Ok(())
}
