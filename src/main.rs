use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod connectivity;
mod giphy;
mod model;
mod search_session;
mod storage;

use connectivity::ConnectivityMonitor;
use giphy::{GiphyClient, RequestConfig};
use search_session::{SearchSession, SessionEvent, SessionOptions};
use storage::{config_path, load_config, save_config};

#[tokio::main]
async fn main() -> Result<()> {
    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "giphy_finder=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_config().context("Failed to load configuration")?;
    if config.giphy_api_key.is_none() {
        // Materialize the config file so there is an obvious place to put
        // the key.
        save_config(&config)?;
        warn!(
            "No Giphy API key configured; searches will fail until one is added to {}",
            config_path()?.display()
        );
    }
    let client = Arc::new(GiphyClient::new(RequestConfig::with_api_key(
        config.giphy_api_key,
    )));

    let connectivity = ConnectivityMonitor::new();
    // Stand-in for a real network watcher: assume we are online.
    connectivity.report(true);

    let (session, mut events) =
        SearchSession::spawn(client, connectivity, SessionOptions::default());

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::ResultsChanged(gifs) => {
                    println!("-- {} GIF(s)", gifs.len());
                    for (index, gif) in gifs.iter().enumerate() {
                        println!("   [{}] {}", index, gif.url);
                    }
                }
                SessionEvent::LoadingChanged(true) => println!("-- loading..."),
                SessionEvent::LoadingChanged(false) => {}
                SessionEvent::ErrorChanged(Some(err)) => println!("-- error: {}", err),
                SessionEvent::ErrorChanged(None) => {}
            }
        }
    });

    println!(
        "Type to search, empty line to clear, :more for the next page, \
         :open N to show a GIF URL, :quit to exit."
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim_end() {
            ":quit" => break,
            ":more" => session.scrolled_near_bottom(),
            command if command.starts_with(":open ") => {
                match command[":open ".len()..].trim().parse::<usize>() {
                    Ok(index) => match session.selected_gif(index).await {
                        Some(url) => println!("-- showing {}", url),
                        None => println!("-- no GIF at index {}", index),
                    },
                    Err(_) => println!("-- usage: :open N"),
                }
            }
            text => session.text_changed(text),
        }
    }

    info!("Exiting");
    Ok(())
}
