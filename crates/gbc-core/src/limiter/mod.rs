//! Stream stages used to shape outbound traffic.
//!
//! Every stage owns one spawned task that reads its input channel and writes
//! its output channel. Shutdown is a close cascade: when a stage's input is
//! closed and drained it drops its sender, which closes the next stage's
//! input. Stages must therefore be applied from within a Tokio runtime.

mod daily;
mod decelerator;
mod rate_gate;

pub use daily::DailyAccountLimiter;
pub use decelerator::Decelerator;
pub use rate_gate::RateGate;

use tokio::sync::mpsc;

use crate::domain::Message;

/// A pipeline step turning a stream of messages into another stream.
pub trait StreamStage {
    type Output: Send + 'static;

    fn apply(&self, input: mpsc::Receiver<Message>) -> mpsc::Receiver<Self::Output>;
}

/// Merge several streams into one.
///
/// Items are forwarded first-come-first-served, so FIFO order only holds per
/// input. The output closes once every input has closed: each forwarder
/// holds a sender clone and the channel closes when the last one drops.
pub fn fan_in<T: Send + 'static>(inputs: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(1);

    for mut input in inputs {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
    }

    rx
}
