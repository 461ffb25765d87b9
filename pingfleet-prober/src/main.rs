use clap::Parser;
use pingfleet_icmp::{Engine, TickBatch};
use pingfleet_proto::{Clock, Output, SystemClock};
use pingfleet_prober::transport::Transport;
use pingfleet_prober::{config, load_config};
use std::error::Error;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, Level};

/// Latency prober: pings its targets and streams results to the collector.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long, default_value = "prober.json")]
    config_file: PathBuf,
    /// Run in foreground and log to stderr.
    #[arg(short, long)]
    foreground: bool,
    /// Enable debug-level logging.
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(args: &Args, config: &config::ProberConfig) -> Result<(), Box<dyn Error>> {
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    if args.foreground {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)?;
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config(&args.config_file);
    init_logging(&args, &config)?;
    info!(name = %config.prober_name, url = %config.ws_url, "prober starting");

    // The engine starts with no destinations; the collector pushes the
    // target list right after auth.
    let engine = Engine::new(Vec::new(), config.timeout_ms, config.packet_size)?;
    let handle = engine.handle();

    let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Output>();
    let sink_tx = queue_tx.clone();
    let engine_thread = std::thread::spawn(move || {
        let sink = move |batch: TickBatch| {
            let message = Output {
                id: None,
                send_time: batch.send_time,
                replies: batch.replies,
                message_transmit_time: 0.0,
                remote_ip: None,
                prober_name: None,
            };
            let _ = sink_tx.send(message);
        };
        engine.run(&sink);
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut transport = Transport::new(
        config.ws_url.clone(),
        config.prober_name.clone(),
        clock,
        queue_tx,
        queue_rx,
        handle.clone(),
        shutdown_rx,
    );
    let transport_task = tokio::spawn(async move { transport.run().await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    handle.stop(); // engine exits at the next tick boundary
    let _ = shutdown_tx.send(true); // transport drains in-flight ACKs, then tears down
    let _ = transport_task.await;
    let _ = engine_thread.join();
    Ok(())
}
