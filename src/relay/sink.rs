//! Output sinks and SSE event encoding.
//!
//! The relay writes each fragment with [`FragmentSink::write`] and immediately
//! calls [`FragmentSink::flush`], so the caller sees it without buffering delay.
//! The relay never closes a sink.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::types::OutputFragment;
use crate::{Error, Result};

/// Encode one fragment as a Server-Sent Events event.
///
/// `"A"` becomes `data: A\n\n`. Text containing newlines gets one `data: ` line
/// per text line, which EventSource clients join back with `\n`.
pub fn encode_event(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Destination for relayed fragments.
#[async_trait]
pub trait FragmentSink: Send {
    /// Queue one fragment. An error means the caller is gone.
    async fn write(&mut self, fragment: &OutputFragment) -> Result<()>;

    /// Push everything written so far to the caller.
    async fn flush(&mut self) -> Result<()>;
}

/// Writes SSE-encoded fragments to any async writer.
#[derive(Debug)]
pub struct SseWriter<W> {
    writer: W,
}

impl<W> SseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> FragmentSink for SseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, fragment: &OutputFragment) -> Result<()> {
        self.writer
            .write_all(encode_event(fragment.as_str()).as_bytes())
            .await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Hands SSE-encoded events to an mpsc channel, one message per flush.
///
/// Used to feed a streaming HTTP response body from a spawned relay task.
/// A dropped receiver surfaces as [`Error::SinkClosed`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    pending: BytesMut,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            pending: BytesMut::new(),
        }
    }
}

#[async_trait]
impl FragmentSink for ChannelSink {
    async fn write(&mut self, fragment: &OutputFragment) -> Result<()> {
        if self.tx.is_closed() {
            return Err(Error::SinkClosed);
        }
        self.pending
            .extend_from_slice(encode_event(fragment.as_str()).as_bytes());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        self.tx.send(chunk).await.map_err(|_| Error::SinkClosed)
    }
}

/// In-memory sink for testing.
#[derive(Debug, Default)]
pub struct MemorySink {
    fragments: Vec<String>,
    flushes: usize,
    unflushed: usize,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that reports itself closed once `n` fragments were accepted.
    pub fn closed_after(n: usize) -> Self {
        Self {
            capacity: Some(n),
            ..Self::default()
        }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Fragments written but not yet flushed.
    pub fn unflushed(&self) -> usize {
        self.unflushed
    }

    /// The stream as the caller would receive it on the wire.
    pub fn wire(&self) -> String {
        self.fragments.iter().map(|f| encode_event(f)).collect()
    }
}

#[async_trait]
impl FragmentSink for MemorySink {
    async fn write(&mut self, fragment: &OutputFragment) -> Result<()> {
        if self.capacity.is_some_and(|cap| self.fragments.len() >= cap) {
            return Err(Error::SinkClosed);
        }
        self.fragments.push(fragment.text.clone());
        self.unflushed += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        self.unflushed = 0;
        Ok(())
    }
}
