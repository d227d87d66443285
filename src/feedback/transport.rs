use std::future::Future;

use anyhow::{Context, Result};
use log::debug;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines},
    sync::mpsc,
};

/// Text-frame duplex to the pose detector.
pub trait FeedbackTransport: Send + 'static {
    fn send(&mut self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Next inbound frame; `None` once the peer has gone away.
    fn recv(&mut self) -> impl Future<Output = Option<String>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// In-process transport over tokio channels.
pub struct ChannelTransport {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    incoming: mpsc::UnboundedReceiver<String>,
}

/// The detector's side of a [`ChannelTransport`].
pub struct DetectorEnd {
    pub frames: mpsc::UnboundedSender<String>,
    pub received: mpsc::UnboundedReceiver<String>,
}

impl DetectorEnd {
    pub fn send_json(&self, value: serde_json::Value) -> bool {
        self.frames.send(value.to_string()).is_ok()
    }
}

impl ChannelTransport {
    pub fn pair() -> (Self, DetectorEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: Some(out_tx),
                incoming: in_rx,
            },
            DetectorEnd {
                frames: in_tx,
                received: out_rx,
            },
        )
    }
}

impl FeedbackTransport for ChannelTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.outgoing
            .as_ref()
            .context("transport already closed")?
            .send(text)
            .map_err(|_| anyhow::anyhow!("detector end dropped"))
    }

    async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.outgoing.take();
        self.incoming.close();
        Ok(())
    }
}

/// Newline-delimited JSON frames over a byte stream, e.g. stdin/stdout.
pub struct LineTransport<R, W> {
    lines: Lines<R>,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
        }
    }
}

pub type StdioTransport = LineTransport<BufReader<io::Stdin>, io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> FeedbackTransport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, text: String) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .await
            .context("failed to write feedback frame")?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<String> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(line),
                Ok(None) => return None,
                Err(err) => {
                    debug!("feedback stream read failed: {err}");
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.context("failed to close feedback stream")
    }
}
