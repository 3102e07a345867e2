use std::time::Duration;

use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};

use super::StreamStage;
use crate::{domain::Message, errors::Error, Result};

/// Paces a stream to at most `limit` messages per `duration`.
///
/// One message is released per `duration / limit` slice, in input order. The
/// slice is truncated to whole nanoseconds, never rounded up. The output
/// channel has a single slot so a slow consumer backpressures the producer.
#[derive(Clone, Copy, Debug)]
pub struct RateGate {
    period: Duration,
}

impl RateGate {
    pub fn new(limit: u32, duration: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Config("rate gate limit must be at least 1".to_string()));
        }
        let period = duration / limit;
        if period.is_zero() {
            return Err(Error::Config(format!(
                "rate gate period for {limit} per {duration:?} is below timer resolution"
            )));
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl StreamStage for RateGate {
    type Output = Message;

    fn apply(&self, mut input: mpsc::Receiver<Message>) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(1);
        let period = self.period;

        tokio::spawn(async move {
            let mut next_slot = Instant::now() + period;
            loop {
                sleep_until(next_slot).await;
                let Some(msg) = input.recv().await else {
                    break;
                };
                if tx.send(msg).await.is_err() {
                    break;
                }
                // Spacing is measured from the hand-off so idle gaps never bank extra slots.
                next_slot = Instant::now() + period;
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;

    fn chat(n: u32) -> Message {
        Message::twitch(format!("PRIVMSG #blaaabot{n}"))
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(RateGate::new(0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn period_truncates_toward_finer_resolution() {
        let gate = RateGate::new(3, Duration::from_secs(1)).unwrap();
        assert_eq!(gate.period(), Duration::from_nanos(333_333_333));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_input_closes_output_within_one_tick() {
        let gate = RateGate::new(2, Duration::from_millis(500)).unwrap();
        let (tx, rx) = mpsc::channel(45);
        let mut out = gate.apply(rx);

        drop(tx);
        let closed = timeout(gate.period() + Duration::from_millis(1), out.recv())
            .await
            .unwrap();
        assert_eq!(closed, None);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_inputs_are_spaced_by_one_period() {
        let gate = RateGate::new(2, Duration::from_millis(500)).unwrap();
        let (tx, rx) = mpsc::channel(5);
        let mut out = gate.apply(rx);

        for i in 1..=5 {
            let start = Instant::now();
            tx.send(chat(i)).await.unwrap();
            tx.send(chat(i * 11)).await.unwrap();

            assert_eq!(out.recv().await, Some(chat(i)));
            let first = Instant::now();
            assert_eq!(out.recv().await, Some(chat(i * 11)));
            let second = Instant::now();

            let gap = second - first;
            assert!(gap >= Duration::from_millis(245) && gap <= Duration::from_millis(255));
            let took = second - start;
            assert!(
                took >= Duration::from_millis(495) && took <= Duration::from_millis(505),
                "took {took:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_does_not_allow_a_burst() {
        let gate = RateGate::new(1, Duration::from_secs(1)).unwrap();
        let (tx, rx) = mpsc::channel(5);
        let mut out = gate.apply(rx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        tx.send(chat(1)).await.unwrap();
        tx.send(chat(2)).await.unwrap();

        out.recv().await.unwrap();
        let first = Instant::now();
        out.recv().await.unwrap();
        assert!(Instant::now() - first >= Duration::from_secs(1));
    }
}
