use crate::prelude::*;

use {
    async_trait::async_trait,
    std::net::SocketAddr,
    std::time::Duration,
    tokio::time::timeout,
    tokio_modbus::client::{tcp, Context, Reader},
    tokio_modbus::{slave::Slave, ExceptionCode},
};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Failed to connect to Venus host {host}: {source}")]
    Connect {
        host: String,
        source: std::io::Error,
    },
    #[error("Send or receive error: {0}")]
    Io(#[from] tokio_modbus::Error),
    #[error("Timeout during send or receive operation ({0:?})")]
    Timeout(Duration),
    #[error("Modbus exception from device: {0:?}")]
    Exception(ExceptionCode),
    #[error("expected {expected} registers, device returned {actual}")]
    ShortRead { expected: u16, actual: usize },
}

/// Source of raw holding registers.
#[async_trait]
pub trait RegisterReader: Send {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ReadError>;
}

/// Modbus TCP connection to a Venus GX.
///
/// The connection is opened on the first read and dropped after any
/// failure, so the next read starts over with a fresh one.
pub struct VenusClient {
    host: String,
    port: u16,
    unit_id: u8,
    timeout: Duration,
    context: Option<Context>,
}

impl VenusClient {
    pub fn new(host: &str, port: u16, unit_id: u8, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            unit_id,
            timeout,
            context: None,
        }
    }

    pub fn from_config(config: &config::Venus) -> Self {
        Self::new(
            config.host(),
            config.port(),
            config.unit_id(),
            Duration::from_secs(config.read_timeout()),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    async fn resolve(&mut self) -> Result<SocketAddr, ReadError> {
        let connect_error = |source| ReadError::Connect {
            host: format!("{}:{}", self.host, self.port),
            source,
        };

        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(connect_error)?
            .next()
            .ok_or_else(|| {
                connect_error(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no address found",
                ))
            })
    }

    async fn connect(&mut self) -> Result<Context, ReadError> {
        let addr = self.resolve().await?;
        debug!("connecting to Venus at {} using unit ID {}", addr, self.unit_id);

        match timeout(self.timeout, tcp::connect_slave(addr, Slave(self.unit_id))).await {
            Ok(Ok(context)) => {
                info!("connected to Venus at {}", addr);
                Ok(context)
            }
            Ok(Err(source)) => Err(ReadError::Connect {
                host: addr.to_string(),
                source,
            }),
            Err(_) => Err(ReadError::Timeout(self.timeout)),
        }
    }

    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ReadError> {
        // taken out so that any early return below drops the connection
        let mut context = match self.context.take() {
            Some(context) => context,
            None => self.connect().await?,
        };

        let values = match timeout(self.timeout, context.read_holding_registers(address, count)).await {
            Ok(Ok(Ok(values))) => values,
            Ok(Ok(Err(exception))) => return Err(ReadError::Exception(exception)),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ReadError::Timeout(self.timeout)),
        };

        if values.len() != count as usize {
            return Err(ReadError::ShortRead {
                expected: count,
                actual: values.len(),
            });
        }

        self.context = Some(context);
        Ok(values)
    }
}

#[async_trait]
impl RegisterReader for VenusClient {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ReadError> {
        trace!("reading {} registers from {}", count, address);
        self.read_holding(address, count).await
    }
}
