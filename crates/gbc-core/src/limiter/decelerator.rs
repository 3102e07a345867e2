use std::time::Duration;

use tokio::{sync::mpsc, time::sleep};

use super::StreamStage;
use crate::domain::Message;

const BATCH_BUFFER: usize = 10_000;

/// Periodically collects everything buffered on the input into one batch.
///
/// Pre-aggregation step for stages that work on bundles of messages. After
/// each batch the stage pauses for `interval` before accepting more input.
#[derive(Clone, Copy, Debug)]
pub struct Decelerator {
    interval: Duration,
}

impl Decelerator {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl StreamStage for Decelerator {
    type Output = Vec<Message>;

    fn apply(&self, mut input: mpsc::Receiver<Message>) -> mpsc::Receiver<Vec<Message>> {
        let (tx, rx) = mpsc::channel(BATCH_BUFFER);
        let interval = self.interval;

        tokio::spawn(async move {
            while let Some(first) = input.recv().await {
                let mut batch = vec![first];
                while let Ok(next) = input.try_recv() {
                    batch.push(next);
                }
                if tx.send(batch).await.is_err() {
                    break;
                }
                sleep(interval).await;
            }
        });

        rx
    }
}
