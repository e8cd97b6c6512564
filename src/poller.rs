use crate::prelude::*;
use crate::influx::StorePublisher;
use crate::venus::RegisterReader;

use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Outcome of one pass over every register block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub published: usize,
    pub failed: usize,
}

pub struct Poller<R, P> {
    reader: R,
    publisher: P,
    interval: Duration,
}

impl<R, P> Poller<R, P>
where
    R: RegisterReader,
    P: StorePublisher,
{
    pub fn new(reader: R, publisher: P, interval: Duration) -> Self {
        Self {
            reader,
            publisher,
            interval,
        }
    }

    /// Polls until a message arrives on `shutdown`.
    pub async fn start(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("polling every {}ms", self.interval.as_millis());

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("poller received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    let stats = self.poll_once().await;
                    trace!("cycle finished: {:?}", stats);
                }
            }
        }

        Ok(())
    }

    /// Reads, decodes and publishes every block once.
    ///
    /// A failure only skips the block it happened in.
    pub async fn poll_once(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();

        for block in BlockType::ALL {
            match self.poll_block(block).await {
                Ok(()) => stats.published += 1,
                Err(e) => {
                    error!("{} block skipped: {}", block, e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    async fn poll_block(&mut self, block: BlockType) -> Result<()> {
        let raw = self
            .reader
            .read_registers(block.start(), block.count())
            .await
            .map_err(|e| anyhow!("Error reading Modbus registers: {}", e))?;

        let fields = register::decode(block, &raw)?;
        let record = MeasurementRecord::build(block.category(), fields, Utc::now());

        self.publisher.publish(&record).await
    }
}
