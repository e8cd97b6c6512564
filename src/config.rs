use crate::prelude::*;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub venus: Venus,

    #[serde(default = "Config::default_influx")]
    pub influx: Influx,

    #[serde(default = "Config::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Venus {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Venus {
    #[serde(default)]
    pub host: String,
    #[serde(default = "Config::default_modbus_port")]
    pub port: u16,
    #[serde(default = "Config::default_unit_id")]
    pub unit_id: u8,

    pub read_timeout: Option<u64>,
}
impl Venus {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn read_timeout(&self) -> u64 {
        self.read_timeout.unwrap_or(5)
    }
} // }}}

// Influx {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Influx {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_influx_url")]
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_influx_database")]
    pub database: String,
}
impl Influx {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// The URL with its host and/or port replaced, keeping scheme and path.
    fn with_address(&self, host: Option<&str>, port: Option<u16>) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut url) if url.has_host() => {
                if let Some(host) = host {
                    let _ = url.set_host(Some(host));
                }
                if let Some(port) = port {
                    let _ = url.set_port(Some(port));
                }
                url.to_string()
            }
            _ => format!(
                "http://{}:{}",
                host.unwrap_or("localhost"),
                port.unwrap_or(8086)
            ),
        }
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Builds a configuration from command line flags alone.
    pub fn from_options(options: &Options) -> Self {
        let mut config = Self {
            venus: Venus {
                host: String::new(),
                port: Self::default_modbus_port(),
                unit_id: Self::default_unit_id(),
                read_timeout: None,
            },
            influx: Self::default_influx(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            loglevel: Self::default_loglevel(),
        };
        config.merge_options(options);

        config
    }

    /// Lets flags given on the command line override the config file.
    pub fn merge_options(&mut self, options: &Options) {
        if let Some(host) = &options.venus {
            self.venus.host = host.clone();
        }
        if let Some(port) = options.port {
            self.venus.port = port;
        }
        if let Some(unit_id) = options.unit_id {
            self.venus.unit_id = unit_id;
        }

        if options.influx_host.is_some() || options.influx_port.is_some() {
            self.influx.url = self.influx.with_address(
                options.influx_host.as_deref(),
                options.influx_port,
            );
        }
    }

    pub fn venus(&self) -> &Venus {
        &self.venus
    }

    pub fn influx(&self) -> &Influx {
        &self.influx
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  Venus:");
        info!("    Host: {}", self.venus.host);
        info!("    Port: {}", self.venus.port);
        info!("    Unit ID: {}", self.venus.unit_id);
        info!("    Read Timeout: {}s", self.venus.read_timeout());

        info!("  InfluxDB: {}", if self.influx.enabled { "enabled" } else { "disabled" });
        if self.influx.enabled {
            info!("    URL: {}", self.influx.url);
            info!("    Database: {}", self.influx.database);
        }

        info!("  Poll Interval: {}ms", self.poll_interval_ms);
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn validate(&self) -> Result<()> {
        if self.venus.host.is_empty() {
            bail!("config.rs:Venus host cannot be empty");
        }
        if self.venus.port == 0 {
            bail!("venus.port must be between 1 and 65535");
        }
        if self.venus.read_timeout() == 0 {
            bail!("config.rs:Invalid read timeout: 0");
        }

        if self.poll_interval_ms == 0 {
            bail!("config.rs:poll_interval_ms must be greater than 0");
        }

        if self.influx.enabled {
            if let Err(e) = url::Url::parse(&self.influx.url) {
                return Err(anyhow!("config.rs:Invalid InfluxDB URL: {}", e));
            }
            if self.influx.database.is_empty() {
                return Err(anyhow!("config.rs:InfluxDB database name cannot be empty"));
            }
        }

        Ok(())
    }

    fn default_modbus_port() -> u16 {
        502
    }

    fn default_unit_id() -> u8 {
        100
    }

    fn default_influx() -> Influx {
        Influx {
            enabled: Self::default_enabled(),
            url: Self::default_influx_url(),
            username: None,
            password: None,
            database: Self::default_influx_database(),
        }
    }

    fn default_influx_url() -> String {
        "http://localhost:8086".to_string()
    }

    fn default_influx_database() -> String {
        "victron".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_poll_interval_ms() -> u64 {
        1000
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
