use std::{collections::HashSet, sync::Arc};

use tokio::sync::mpsc;
use tracing::warn;

use super::StreamStage;
use crate::{
    clock::{Clock, SystemClock},
    domain::Message,
    errors::Error,
    protocol, Result,
};

/// Limits how many distinct recipients can be messaged per calendar day.
///
/// The first `capacity` recipients seen on a day are let through with no
/// volume limit. Messages to any further recipient are dropped and logged;
/// the sender gets no signal. The ledger resets when the clock reports a day
/// switch.
#[derive(Clone)]
pub struct DailyAccountLimiter {
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl DailyAccountLimiter {
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_clock(capacity, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config(
                "daily recipient capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self { capacity, clock })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl StreamStage for DailyAccountLimiter {
    type Output = Message;

    fn apply(&self, mut input: mpsc::Receiver<Message>) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let capacity = self.capacity;
        let clock = self.clock.clone();

        tokio::spawn(async move {
            let mut contacted: HashSet<String> = HashSet::new();
            while let Some(msg) = input.recv().await {
                if clock.day_switched() {
                    contacted = HashSet::new();
                }

                let target = protocol::recipient(&msg.raw).unwrap_or_default();
                if !contacted.contains(target) {
                    if contacted.len() >= capacity {
                        warn!(
                            recipient = target,
                            capacity, "daily recipient limit reached, discarding message"
                        );
                        continue;
                    }
                    contacted.insert(target.to_string());
                }

                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        rx
    }
}
