//! Stand-in for the external Kafka-like transport.
//!
//! The real broker is out of scope; the *shape* of the data flow across it
//! is core behavior the engine must drive: partitioned by key, consumer-pull,
//! at-least-once, manual acknowledgment, bounded so no in-memory unbounded
//! queue sits between producer and consumer. Backed by `tokio::sync::mpsc`,
//! one bounded channel per partition.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Hashes a partition key onto one of `partition_count` lanes. Exposed so
/// producers and consumers agree on assignment without sharing a router.
pub fn partition_for(key: i64, partition_count: usize) -> usize {
    (key.unsigned_abs() as usize) % partition_count.max(1)
}

/// A partitioned, consumer-pull, manually-acknowledged log over an
/// in-process value `T`. `publish` never blocks the caller past the bound;
/// redelivery on a dropped/un-acked message is the caller's responsibility —
/// `recv` gives ownership of the message and the caller only removes it from
/// its own retry bookkeeping once processing fully commits, mirroring
/// manual-ack consumer semantics. Kept as a trait so the ingestion
/// coordinator and the calc-request worker loop depend on the abstraction
/// rather than one concrete transport.
#[async_trait]
pub trait PartitionedLog<T>: Send + Sync {
    fn partition_count(&self) -> usize;

    /// Publish `message` onto the lane selected by `partition_for(key, n)`.
    /// At-least-once: the caller that owns the triggering write (e.g. a
    /// trade commit) must already have committed before this is called.
    async fn publish(&self, key: i64, message: T) -> Result<(), PublishError>;

    /// Pull the next message from a specific partition. One worker per
    /// partition, to preserve per-`positionId` ordering.
    async fn recv(&self, partition: usize) -> Option<T>;
}

/// One bounded, ordered lane. Delivery within a lane is FIFO; there is no
/// cross-lane ordering guarantee across positions.
struct Partition<T> {
    tx: mpsc::Sender<T>,
    rx: tokio::sync::Mutex<mpsc::Receiver<T>>,
}

/// In-process implementation of [`PartitionedLog`] over bounded
/// `tokio::sync::mpsc` channels, one per partition. Stands in for the
/// external Kafka-like transport until a real broker client is wired in.
pub struct InProcessPartitionedLog<T> {
    partitions: Vec<Arc<Partition<T>>>,
}

impl<T: Send + 'static> InProcessPartitionedLog<T> {
    pub fn new(partition_count: usize, capacity: usize) -> Self {
        let partitions = (0..partition_count.max(1))
            .map(|_| {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                Arc::new(Partition {
                    tx,
                    rx: tokio::sync::Mutex::new(rx),
                })
            })
            .collect();
        Self { partitions }
    }
}

#[async_trait]
impl<T: Send + 'static> PartitionedLog<T> for InProcessPartitionedLog<T> {
    fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    async fn publish(&self, key: i64, message: T) -> Result<(), PublishError> {
        let idx = partition_for(key, self.partitions.len());
        self.partitions[idx]
            .tx
            .send(message)
            .await
            .map_err(|_| PublishError::Closed)
    }

    async fn recv(&self, partition: usize) -> Option<T> {
        let mut rx = self.partitions[partition].rx.lock().await;
        rx.recv().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("partitioned log is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_for_is_deterministic_and_in_range() {
        for key in [-100_i64, -1, 0, 1, 42, 1_000_000] {
            let p = partition_for(key, 8);
            assert!(p < 8);
            assert_eq!(p, partition_for(key, 8));
        }
    }

    #[tokio::test]
    async fn same_key_always_lands_on_the_same_partition() {
        let log: InProcessPartitionedLog<i64> = InProcessPartitionedLog::new(4, 16);
        log.publish(7, 1).await.unwrap();
        log.publish(7, 2).await.unwrap();
        let p = partition_for(7, 4);
        assert_eq!(log.recv(p).await, Some(1));
        assert_eq!(log.recv(p).await, Some(2));
    }

    #[tokio::test]
    async fn per_partition_order_is_fifo() {
        let log: InProcessPartitionedLog<i64> = InProcessPartitionedLog::new(1, 16);
        for i in 0..5 {
            log.publish(0, i).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(log.recv(0).await, Some(i));
        }
    }
}
