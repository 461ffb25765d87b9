use clap::Parser;
use pingfleet_collector::{control, load_config, server, CollectorConfig, StorageConfig, Writer};
use pingfleet_store::{DatafileTsdb, SqliteCatalog, SqliteTsdb, Tsdb};
use std::collections::HashMap;
use std::error::Error;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{info, Level};

/// Central collector: listens for prober connections and records results.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long, default_value = "collector.json")]
    config_file: PathBuf,
    /// Run in foreground and log to stderr.
    #[arg(short, long)]
    foreground: bool,
    /// Enable debug-level logging.
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(args: &Args, config: &CollectorConfig) -> Result<(), Box<dyn Error>> {
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

fn open_tsdb(
    config: &CollectorConfig,
    catalog: Arc<SqliteCatalog>,
) -> Result<Box<dyn Tsdb>, Box<dyn Error>> {
    let tsdb: Box<dyn Tsdb> = match &config.storage {
        StorageConfig::Binary { data_dir } => Box::new(DatafileTsdb::new(catalog, data_dir)?),
        StorageConfig::Sqlite { path } => Box::new(SqliteTsdb::open(path)?),
    };
    Ok(tsdb)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config(&args.config_file);
    init_logging(&args, &config)?;

    let catalog = Arc::new(SqliteCatalog::open(&config.catalog_path)?);
    let tsdb = open_tsdb(&config, catalog.clone())?;

    let (write_tx, write_rx) = std::sync::mpsc::channel();
    let writer_stop = Arc::new(AtomicBool::new(false));
    let writer = Writer::new(tsdb, write_rx, writer_stop.clone());
    let writer_thread = std::thread::spawn(move || writer.run());

    let clients: server::Clients = Arc::new(Mutex::new(HashMap::new()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let control_task = tokio::spawn(control::run(
        catalog.clone(),
        clients.clone(),
        shutdown_rx,
    ));

    let bind = format!("{}:{}", config.ws_address, config.ws_port);
    let listener = TcpListener::bind(&bind).await?;
    info!(addr = %bind, "collector listening");
    let accept_task = tokio::spawn(server::run(
        listener,
        catalog.clone(),
        clients.clone(),
        write_tx.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    accept_task.abort();
    let _ = control_task.await;

    // Sessions still hold queue senders; the stop flag bounds the writer's
    // exit to one pop timeout either way.
    drop(write_tx);
    writer_stop.store(true, Ordering::Relaxed);
    let _ = writer_thread.join();
    Ok(())
}
