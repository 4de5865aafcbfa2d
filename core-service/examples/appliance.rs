//! Desktop appliance
//!
//! Runs the full pipeline with the desktop adapters: yt-dlp for downloads,
//! ffplay for audio and a simulated panel logged at `trace`. Lines typed on
//! stdin are published on the URL topic, standing in for the tag reader.
//!
//! ```text
//! cargo run -p core-service --example appliance
//! > https://music.youtube.com/watch?v=...
//! > status | stop | clear | quit
//! ```

use anyhow::Context;
use bridge_desktop::ChannelMessageBus;
use bridge_traits::time::LogLevel;
use core_runtime::config::CoreConfig;
use core_runtime::events::{handler_fn, CoreEvent, EventKind};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{AppContext, CoreDependencies};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )?;

    let config = CoreConfig::builder()
        .build()
        .context("invalid configuration")?;
    let topic = config.url_topic.clone();

    let bus = Arc::new(ChannelMessageBus::new());
    let context = AppContext::start(config, CoreDependencies::desktop(bus.clone()))
        .await
        .context("failed to start the appliance")?;

    context.subscribe(
        EventKind::ALL,
        handler_fn(|event: CoreEvent| async move {
            info!(event = ?event, "{}", event.description());
        }),
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match line.trim() {
            "" => {}
            "quit" => break,
            "stop" => context.stop().await?,
            "status" => println!("{}", serde_json::to_string_pretty(&context.status())?),
            "clear" => println!("removed {} entries", context.clear_cache().await?),
            url => {
                bus.publish(&topic, url);
            }
        }
    }

    context.shutdown().await?;
    Ok(())
}
