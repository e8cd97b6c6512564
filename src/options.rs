use clap::Parser;

/// Venus Bridge - stores Victron Venus readings in InfluxDB
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Venus device IP address
    #[clap(value_name = "Venus-IP")]
    pub venus: Option<String>,

    /// Modbus TCP port [default: 502]
    #[clap(long = "port")]
    pub port: Option<u16>,

    /// Modbus unit ID [default: 100]
    #[clap(long = "unitid")]
    pub unit_id: Option<u8>,

    /// InfluxDB host [default: localhost]
    #[clap(long = "influxdb")]
    pub influx_host: Option<String>,

    /// InfluxDB port [default: 8086]
    #[clap(long = "influxport")]
    pub influx_port: Option<u16>,

    /// Enable debug logging, twice for every module
    #[clap(short = 'd', long = "debug", action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Config file; flags given alongside it take precedence
    #[clap(short = 'c', long = "config")]
    pub config_file: Option<String>,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Log filter implied by the number of `-d` flags, if any.
    pub fn log_filter(&self) -> Option<&'static str> {
        match self.debug {
            0 => None,
            1 => Some("info,venus_bridge=debug"),
            _ => Some("debug"),
        }
    }
}
