use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use yt_nope::background::{Message, MessageSender, Reply};
use yt_nope::config::Config;
use yt_nope::discovery::{find_recommendation_links, DiscoveryOptions};
use yt_nope::dom::snapshot;
use yt_nope::engine::{BlocklistStore, ChannelMatcher};
use yt_nope::init::{init_action_logger, init_background, init_stats, setup_logging};
use yt_nope::options::{EditableList, OptionsPage};
use yt_nope::page::Page;
use yt_nope::pipeline::{extract_channel_name, BlockerContext, Pipeline};
use yt_nope::watcher::RecommendationWatcher;

const USAGE: &str = "usage: yt-nope [config.toml] <sync [--force] | show | block <name>.. | allow <name>.. | custom <file> | hide <on|off> | scan <page.html|snapshot.json> | watch <page.html|snapshot.json>>";

enum Command {
    Sync { force: bool },
    Show,
    Block(Vec<String>),
    Allow(Vec<String>),
    Custom(String),
    Hide(bool),
    Scan(String),
    Watch(String),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            bail!(USAGE);
        };
        let command = match (name.as_str(), rest) {
            ("sync", []) => Command::Sync { force: false },
            ("sync", [flag]) if flag == "--force" => Command::Sync { force: true },
            ("show", []) => Command::Show,
            ("block", names) if !names.is_empty() => Command::Block(names.to_vec()),
            ("allow", names) if !names.is_empty() => Command::Allow(names.to_vec()),
            ("custom", [file]) => Command::Custom(file.clone()),
            ("hide", [flag]) => match flag.as_str() {
                "on" => Command::Hide(true),
                "off" => Command::Hide(false),
                other => bail!("hide expects on or off, got '{}'", other),
            },
            ("scan", [file]) => Command::Scan(file.clone()),
            ("watch", [file]) => Command::Watch(file.clone()),
            _ => bail!(USAGE),
        };
        Ok(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match args.first() {
        Some(first) if first.ends_with(".toml") => args.remove(0),
        _ => "config.toml".to_string(),
    };
    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);

    if !Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    let command = Command::parse(&args)?;

    // 3. Storage & background task
    let (storage, sender) = init_background(&config)?;
    let store = BlocklistStore::new(storage);
    let options = OptionsPage::new(sender.clone(), store.clone());

    // 4. Run
    match command {
        Command::Sync { force } => sync(&sender, force).await?,
        Command::Show => show(&options, &store).await?,
        Command::Block(names) => {
            options
                .move_between_lists(EditableList::Whitelist, &names)
                .await?;
            println!("Blocked {} channel(s)", names.len());
        }
        Command::Allow(names) => {
            options
                .move_between_lists(EditableList::Blacklist, &names)
                .await?;
            println!("Allowed {} channel(s)", names.len());
        }
        Command::Custom(file) => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file))?;
            options.save_custom_list(&text).await?;
            println!("Custom list saved from {}", file);
        }
        Command::Hide(hide) => {
            options.set_hide_blocked(hide).await?;
            println!("Hide blocked tiles: {}", hide);
        }
        Command::Scan(file) => scan(&config, &sender, &store, &file).await?,
        Command::Watch(file) => watch(&config, &sender, &store, &file).await?,
    }

    Ok(())
}

async fn sync(sender: &MessageSender, force: bool) -> Result<()> {
    match sender.request(Message::FetchBlacklist { force }).await? {
        Reply::Fetched { outcome, blacklist } => {
            println!("{:?}; block list has {} entries", outcome, blacklist.len());
        }
        Reply::Saved => warn!("Unexpected reply to fetchBlacklist"),
    }
    Ok(())
}

async fn show(options: &OptionsPage, store: &BlocklistStore) -> Result<()> {
    let lists = options.load().await?;
    let print = |title: &str, entries: &[String]| {
        println!("{} ({}):", title, entries.len());
        for entry in entries {
            println!("  {}", entry);
        }
    };
    print("Block list", &lists.blacklist);
    print("Allow list", &lists.whitelist);
    print("Custom list", &lists.customlist);
    println!("Matching against {} names", store.load(false).await?.len());
    println!("Hide blocked tiles: {}", store.hide_blocked().await?);
    Ok(())
}

/// Runs discovery and matching over a saved page. Nothing is suppressed.
async fn scan(config: &Config, sender: &MessageSender, store: &BlocklistStore, file: &str) -> Result<()> {
    // A page load is when the list gets refreshed if it is due.
    sender.request(Message::FetchBlacklist { force: false }).await?;
    let list = store.load(false).await?;
    let doc = snapshot::load(file).await?;

    let groups = find_recommendation_links(&doc, &DiscoveryOptions::from_config(&config.page));
    if groups.is_empty() {
        println!("No recommendation feed found");
        return Ok(());
    }

    for group in &groups {
        let Some(root) = group.root(&doc) else {
            continue;
        };
        println!("Feed {} ({} tiles)", group.key, group.anchors.len());
        for tile in doc.element_children(root) {
            match extract_channel_name(&doc, tile) {
                Some(channel) if list.contains(&channel) => println!("  BLOCK  {}", channel),
                Some(channel) => println!("  allow  {}", channel),
                None => println!("  ?      (no channel)"),
            }
        }
    }
    Ok(())
}

/// Runs the blocker on a saved page until Ctrl-C, then prints the counters.
async fn watch(config: &Config, sender: &MessageSender, store: &BlocklistStore, file: &str) -> Result<()> {
    sender.request(Message::FetchBlacklist { force: false }).await?;

    let stats = init_stats(config);
    let logger = init_action_logger(config);
    let ctx = BlockerContext::load(store, config, stats.clone(), logger).await?;

    let page = Page::new(snapshot::load(file).await?);
    let pipeline = Pipeline::new(page.clone(), Arc::new(ctx));
    let watcher = RecommendationWatcher::new(page.clone(), pipeline, config)?;
    let unloader = page.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            unloader.unload();
        }
    });

    info!("Watching {}. Press Ctrl-C to stop.", file);
    let phase = watcher.run().await;
    info!("Watcher finished in phase {:?}", phase);

    println!("{}", serde_json::to_string_pretty(&stats.get_snapshot())?);
    Ok(())
}
