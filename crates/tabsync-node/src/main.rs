mod config;
mod console;
mod sink;
mod udp;

use std::sync::{Arc, Weak};

use config::NodeConfig;
use console::Console;
use tabsync_proto::packets::WireShape;
use tabsync_sync::features::{NameTagSync, ScoreKind, ScoreSync};
use tabsync_sync::{InboundHandler, ProxySyncBuilder};
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use udp::UdpTransport;

#[tokio::main]
async fn main() {
    let config = match NodeConfig::load("tabsync.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load tabsync.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("tabsync node v{} starting", env!("CARGO_PKG_VERSION"));

    let (bind, peers) = match (config.transport.bind_addr(), config.transport.peer_addrs()) {
        (Ok(bind), Ok(peers)) => (bind, peers),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid transport configuration: {e}");
            std::process::exit(1);
        }
    };
    let transport = match UdpTransport::bind(bind, peers).await {
        Ok(t) => Arc::new(t),
        Err(e) => {
            eprintln!("Failed to bind {bind}: {e}");
            std::process::exit(1);
        }
    };

    let shape = WireShape::for_protocol(config.node.protocol);
    info!(
        "Default server: {}, protocol {} ({shape:?} packet layout)",
        config.node.server, config.node.protocol
    );

    let mut builder = ProxySyncBuilder::new(transport.clone())
        .shutdown_grace(config.executor.shutdown_grace());
    let nametags = config
        .features
        .nametags
        .then(|| NameTagSync::new(config.anti_override.teams));
    let belowname = config.features.belowname.then(|| {
        ScoreSync::new(
            ScoreKind::BelowName,
            config.features.belowname_title.as_str(),
            config.anti_override.scoreboard,
        )
    });
    let playerlist = config.features.playerlist.then(|| {
        ScoreSync::new(
            ScoreKind::PlayerList,
            config.features.playerlist_title.as_str(),
            config.anti_override.scoreboard,
        )
    });
    if let Some(feature) = &nametags {
        builder = builder.feature(feature.clone());
    }
    if let Some(feature) = &belowname {
        builder = builder.feature(feature.clone());
    }
    if let Some(feature) = &playerlist {
        builder = builder.feature(feature.clone());
    }
    let sync = builder.build();

    let mut console = Console::new(sync.clone(), shape, config.node.server.as_str());
    if let Some(feature) = nametags {
        console = console.with_nametags(feature);
    }
    if let Some(feature) = belowname {
        console = console.with_belowname(feature);
    }
    if let Some(feature) = playerlist {
        console = console.with_playerlist(feature);
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let handler: Weak<dyn InboundHandler> = Arc::downgrade(&sync) as Weak<dyn InboundHandler>;
    let receiver = transport.spawn_receiver(handler, shutdown_rx.clone());
    sync.load();

    // Handle Ctrl+C
    let shutdown_tx_ctrlc = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx_ctrlc.send(true);
    });

    // Console REPL: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut shutdown = shutdown_rx;
    loop {
        tokio::select! {
            Some(line) = console_rx.recv() => {
                let result = console.handle(&line);
                for message in &result.messages {
                    if result.success {
                        info!("{message}");
                    } else {
                        warn!("{message}");
                    }
                }
                if result.should_stop {
                    break;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    sync.unload().await;
    transport.flush().await;
    let _ = shutdown_tx.send(true);
    let _ = receiver.await;
    info!("Node shut down.");
}
