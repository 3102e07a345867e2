//! Outbound rate-limiting policy for one chat account.
//!
//! ```text
//!            +-> direct:    daily recipients -> per minute -> per second -+
//! input -> split                                                          +-> fan-in -> output
//!            +-> broadcast: per 30 seconds -------------------------------+
//! ```

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    clock::{Clock, SystemClock},
    domain::Message,
    limiter::{fan_in, DailyAccountLimiter, RateGate, StreamStage},
    modes::{RateLimits, RateMode},
    protocol::{self, Category},
    Result,
};

#[derive(Clone)]
pub struct RateLimitPipeline {
    daily: DailyAccountLimiter,
    per_minute: RateGate,
    per_second: RateGate,
    broadcast: RateGate,
}

impl RateLimitPipeline {
    pub fn new(mode: RateMode) -> Result<Self> {
        Self::with_clock(mode.limits(), Arc::new(SystemClock::new()))
    }

    pub fn with_clock(limits: RateLimits, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            daily: DailyAccountLimiter::with_clock(limits.unique_direct_targets_per_day, clock)?,
            per_minute: RateGate::new(limits.direct_per_minute, Duration::from_secs(60))?,
            per_second: RateGate::new(limits.direct_per_second, Duration::from_secs(1))?,
            broadcast: RateGate::new(limits.broadcast_per_30s, Duration::from_secs(30))?,
        })
    }
}

impl StreamStage for RateLimitPipeline {
    type Output = Message;

    fn apply(&self, mut input: mpsc::Receiver<Message>) -> mpsc::Receiver<Message> {
        let (direct_tx, direct_rx) = mpsc::channel(1);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            while let Some(msg) = input.recv().await {
                let branch = match protocol::classify(&msg.raw) {
                    Category::Direct => &direct_tx,
                    Category::Broadcast => &broadcast_tx,
                };
                if branch.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let direct = self
            .per_second
            .apply(self.per_minute.apply(self.daily.apply(direct_rx)));
        let broadcast = self.broadcast.apply(broadcast_rx);

        fan_in(vec![broadcast, direct])
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Instant};

    use super::*;

    fn whisper(target: &str) -> Message {
        Message::twitch(format!("WHISPER {target} :D:"))
    }

    fn standard() -> RateLimitPipeline {
        RateLimitPipeline::new(RateMode::Standard).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn closing_input_closes_output() {
        let (tx, rx) = mpsc::channel(45);
        let mut out = standard().apply(rx);

        drop(tx);
        let next = timeout(Duration::from_secs(2), out.recv()).await.unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test(start_paused = true)]
    async fn caps_distinct_direct_recipients_per_day() {
        let (tx, rx) = mpsc::channel(45);
        let mut out = standard().apply(rx);

        for i in 1..=41 {
            tx.send(whisper(&format!("testuser{i}"))).await.unwrap();
            let res = timeout(Duration::from_secs(2), out.recv()).await;
            if i <= 40 {
                assert_eq!(res.unwrap(), Some(whisper(&format!("testuser{i}"))));
            } else {
                assert!(res.is_err(), "message to recipient 41 must never arrive");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn direct_messages_respect_per_second_limit() {
        let (tx, rx) = mpsc::channel(5);
        let mut out = standard().apply(rx);
        let min_gap = Duration::from_secs(1) / 3;

        for _ in 0..3 {
            let start = Instant::now();
            tx.send(whisper("testTarget")).await.unwrap();
            timeout(Duration::from_secs(2), out.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(Instant::now() - start >= min_gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn direct_messages_respect_per_minute_limit() {
        let (tx, rx) = mpsc::channel(102);
        let mut out = standard().apply(rx);

        for _ in 0..101 {
            tx.send(whisper("test")).await.unwrap();
        }

        let start = Instant::now();
        for _ in 0..101 {
            out.recv().await.unwrap();
        }
        assert!(Instant::now() - start > Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_messages_respect_per_30_seconds_limit() {
        let (tx, rx) = mpsc::channel(1);
        let mut out = standard().apply(rx);
        let min_gap = Duration::from_secs(30) / 20;

        for _ in 0..2 {
            let start = Instant::now();
            tx.send(Message::twitch("PRIVMSG #test :D:")).await.unwrap();
            timeout(Duration::from_secs(2), out.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(Instant::now() - start >= min_gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn branches_do_not_wait_for_each_other() {
        let (tx, rx) = mpsc::channel(10);
        let mut out = standard().apply(rx);

        tx.send(Message::twitch("PRIVMSG #test :first")).await.unwrap();
        tx.send(whisper("someone")).await.unwrap();

        let mut got = Vec::new();
        for _ in 0..2 {
            got.push(out.recv().await.unwrap());
        }
        // The whisper clears its 600ms gate before the 1.5s broadcast slot.
        assert_eq!(got[0], whisper("someone"));
        assert_eq!(got[1].raw, "PRIVMSG #test :first");
    }
}
