pub mod config;      // Configuration file and validation
pub mod error;       // Error helpers
pub mod influx;      // InfluxDB publisher
pub mod measurement; // Timestamped measurement records
pub mod options;     // Command line options parsing
pub mod poller;      // Poll loop tying device, decoder and store together
pub mod prelude;     // Common imports and types
pub mod register;    // Register block layouts and decoding
pub mod venus;       // Modbus TCP client for the Venus device

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::influx::Influx;
use crate::poller::Poller;
use crate::venus::VenusClient;

fn init_logging(filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();
}

/// Loads the config file if one was given, otherwise builds one from flags.
pub fn load_config(options: &Options) -> Result<Config> {
    let mut config = match &options.config_file {
        Some(file) => Config::new(file.clone())?,
        None => Config::from_options(options),
    };
    config.merge_options(options);
    config.validate()?;

    Ok(config)
}

/// Main application entry point
///
/// Runs the poll loop until a message arrives on `shutdown_rx`.
pub async fn app(shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    // logging needs the config's loglevel, so load it first and report later
    let config = load_config(&options);
    let filter = match (options.log_filter(), &config) {
        (Some(filter), _) => filter.to_string(),
        (None, Ok(config)) => config.loglevel().to_string(),
        (None, Err(_)) => "info".to_string(),
    };
    init_logging(&filter);

    info!("venus-bridge {} starting", CARGO_PKG_VERSION);

    let config = config.map_err(|err| {
        error!("Failed to load config: {:?}", err);
        err
    })?;
    if let Some(file) = &options.config_file {
        info!("Read configuration from {}", file);
    }
    config.log_summary();

    info!(
        "Connecting to Victron Venus {} on port {} using unit ID {}",
        config.venus().host(),
        config.venus().port(),
        config.venus().unit_id()
    );
    info!(
        "Writing data to InfluxDB {} database {}",
        config.influx().url(),
        config.influx().database()
    );

    let influx = Influx::new(config.influx().clone())?;
    influx.initialize().await?;

    let venus = VenusClient::from_config(config.venus());
    let mut poller = Poller::new(venus, influx, config.poll_interval());

    poller.start(shutdown_rx).await?;

    info!("venus-bridge shutdown complete");
    Ok(())
}

/// Runs the application with Ctrl-C handling and the optional runtime limit.
pub async fn run(options: Options) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    if let Some(runtime) = options.runtime {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(runtime)).await;
            info!("runtime limit of {}s reached", runtime);
            let _ = shutdown_tx_clone.send(());
        });
    }

    app(shutdown_rx, options).await
}
