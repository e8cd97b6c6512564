use crate::prelude::*;

use async_trait::async_trait;
use rinfluxdb::line_protocol::r#async::Client;

/// Destination for finished measurement records.
#[async_trait]
pub trait StorePublisher: Send + Sync {
    async fn publish(&self, record: &MeasurementRecord) -> Result<()>;
}

pub struct Influx {
    config: config::Influx,
    // None when influx is disabled in the config
    client: Option<Client>,
    http: reqwest::Client,
}

impl Influx {
    pub fn new(config: config::Influx) -> Result<Self> {
        let client = if config.enabled() {
            let url = reqwest::Url::parse(config.url())?;
            let credentials = match (config.username(), config.password()) {
                (Some(u), Some(p)) => Some((u, p)),
                _ => None,
            };

            Some(Client::new(url, credentials)?)
        } else {
            None
        };

        Ok(Self {
            config,
            client,
            http: reqwest::Client::new(),
        })
    }

    /// Creates the database if it does not exist yet.
    pub async fn initialize(&self) -> Result<()> {
        if !self.config.enabled() {
            info!("influx disabled, records will only be logged");
            return Ok(());
        }

        info!("initializing influx at {}", self.config.url());

        let mut url = self.endpoint("query")?;
        url.query_pairs_mut()
            .append_pair("q", &format!("CREATE DATABASE \"{}\"", self.database()));

        let mut request = self.http.post(url);
        if let (Some(u), Some(p)) = (self.config.username(), self.config.password()) {
            request = request.basic_auth(u, Some(p));
        }

        let response = request.send().await.map_err(|err| {
            file_error!("Error during connection to InfluxDB {}: {}", self.config.url(), err)
        })?;
        if !response.status().is_success() {
            bail!(
                "InfluxDB {} refused to create database {}: {}",
                self.config.url(),
                self.database(),
                response.status()
            );
        }

        info!("database {} opened and initialized", self.database());

        Ok(())
    }

    /// Appends `name` to the configured URL, keeping any path prefix.
    fn endpoint(&self, name: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(self.config.url())?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("InfluxDB URL {} cannot take a path", self.config.url()))?
            .pop_if_empty()
            .push(name);

        Ok(url)
    }

    fn database(&self) -> &str {
        self.config.database()
    }
}

#[async_trait]
impl StorePublisher for Influx {
    async fn publish(&self, record: &MeasurementRecord) -> Result<()> {
        let client = match &self.client {
            Some(client) => client,
            None => {
                debug!("dry run: {}", serde_json::to_string(record)?);
                return Ok(());
            }
        };

        let lines = vec![record.to_line()];
        trace!("Sending to InfluxDB: {:?}", lines);

        client
            .send(self.database(), &lines)
            .await
            .map_err(|err| anyhow!("Failed to write to InfluxDB: {:?}", err))?;

        debug!(
            "wrote {} {} fields to InfluxDB",
            record.fields().len(),
            record.category()
        );

        Ok(())
    }
}
