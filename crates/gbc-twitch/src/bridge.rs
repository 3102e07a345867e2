//! stdin/stdout bridge around one session.
//!
//! Every non-blank stdin line is sent as a raw protocol line; every received
//! line is printed to stdout. The process exits when the session ends: on
//! stdin EOF (after the queued lines drained through the rate limits), on
//! Ctrl-C, or when the server drops the connection.

use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tracing::info;

use gbc_core::{
    config::{Config, OutputFormat},
    domain::Message,
    ports::ChatClient,
    Result,
};

const OUTBOUND_BUFFER: usize = 64;

pub async fn run(cfg: Arc<Config>) -> anyhow::Result<()> {
    let client = crate::client(cfg.session.clone())?;

    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let mut inbound = client.connect(outbound_rx).await?;
    info!(
        "connected to {} as '{}' ({} limits), channels: {}",
        cfg.session.server_url,
        cfg.session.credentials.name,
        cfg.session.mode,
        cfg.session.channels.join(", ")
    );

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if outbound_tx.send(Message::twitch(line)).await.is_err() {
                break;
            }
        }
        // Dropping the sender ends the session once the pipeline drains.
    });

    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            msg = inbound.recv() => {
                let Some(msg) = msg else {
                    info!("session ended");
                    break;
                };
                let mut line = render(&msg, cfg.output)?;
                line.push('\n');
                stdout.write_all(line.as_bytes()).await?;
                stdout.flush().await?;
            }
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("interrupted, disconnecting");
                client.disconnect().await?;
                break;
            }
        }
    }

    reader.abort();
    Ok(())
}

pub fn render(msg: &Message, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Raw => Ok(msg.raw.clone()),
        OutputFormat::Json => Ok(serde_json::to_string(msg)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_raw_and_json() {
        let msg = Message::twitch(":a!a@a.tmi.twitch.tv PRIVMSG #chan :hi");
        assert_eq!(
            render(&msg, OutputFormat::Raw).unwrap(),
            ":a!a@a.tmi.twitch.tv PRIVMSG #chan :hi"
        );
        assert_eq!(
            render(&msg, OutputFormat::Json).unwrap(),
            r#"{"platform":"TWITCH","raw":":a!a@a.tmi.twitch.tv PRIVMSG #chan :hi"}"#
        );
    }
}
