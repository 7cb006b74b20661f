use bitmex_ws::{
    ChannelKind, FeedConfig, InboundMessage, Instrument, LifecycleEvent, MessageKind,
    ReconnectSupervisor,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bitmex_ws=info")),
        )
        .init();

    let mut config = FeedConfig::default();
    if let Ok(url) = std::env::var("BITMEX_BASE_URL") {
        config = config.with_base_url(url);
    }

    // Private channels need an API key pair
    let mut kinds = vec![ChannelKind::Quote];
    if let (Ok(key), Ok(secret)) = (
        std::env::var("BITMEX_API_KEY"),
        std::env::var("BITMEX_API_SECRET"),
    ) {
        config = config.with_credentials(key, secret);
        kinds.push(ChannelKind::Position);
    }

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "XBTUSD".to_string());
    let instrument = Instrument::new(symbol, kinds, config.should_auth)?;

    println!("Connecting to {}...", config.ws_url()?);
    println!("Subscribing to {} channel(s)", instrument.channels().len());

    let mut feed = ReconnectSupervisor::new(config, instrument.into_channels())?;

    let mut event_count = 0u64;
    feed.on(MessageKind::Action, move |msg| {
        if let InboundMessage::Action(action) = msg {
            event_count += 1;
            println!(
                "[#{}] {} {} ({} rows)",
                event_count,
                action.table.as_deref().unwrap_or("-"),
                action.action,
                action.data.len()
            );
            if let Some(row) = action.data.last() {
                println!("  {}", row);
            }
        }
    })
    .on(MessageKind::SubscribeAck, |msg| {
        if let InboundMessage::SubscribeAck(ack) = msg {
            if ack.success {
                println!("✅ Subscribed to {}", ack.subscribe);
            } else {
                println!("❌ Subscription to {} rejected", ack.subscribe);
            }
        }
    })
    .on(MessageKind::Error, |msg| {
        if let InboundMessage::Error(error) = msg {
            eprintln!("Server error: {}", error.error);
        }
    })
    .on_lifecycle(|event| match event {
        LifecycleEvent::Opened { epoch } => println!("Connected (epoch {})", epoch),
        LifecycleEvent::Reconnecting { attempt, delay } => {
            println!("Reconnecting in {:?} (attempt {})", delay, attempt)
        }
        _ => {}
    });

    let shutdown = feed.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        println!("\nShutting down...");
        shutdown.shutdown();
    });

    feed.start().await?;
    println!("Feed stopped after {} epoch(s)", feed.epochs());

    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where available
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
