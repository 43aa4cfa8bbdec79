//! Unidirectional byte pump between two streams.
//!
//! Forwards raw chunks as they arrive: the newline message delimiter is
//! counted for accounting only, and the pump never waits for a complete frame
//! or re-frames what it forwards. A sink write failure aborts the read loop
//! immediately so a stalled peer cannot make the pump drain its source into
//! nowhere.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

const CHUNK_SIZE: usize = 8192;

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpOutcome {
    /// The source reached end-of-stream.
    Eof,
    /// Reading from the source failed.
    ReadError(std::io::Error),
    /// Writing to the sink failed.
    WriteError(std::io::Error),
}

/// Transfer accounting for one finished pump.
#[derive(Debug)]
pub struct PumpSummary {
    pub label: &'static str,
    pub bytes: u64,
    pub frames: u64,
    pub outcome: PumpOutcome,
}

impl PumpSummary {
    /// True when the pump ended with the source's clean end-of-stream.
    pub const fn is_clean(&self) -> bool {
        matches!(self.outcome, PumpOutcome::Eof)
    }
}

/// Copy bytes from `source` to `sink` until end-of-stream or the first
/// stream error. Every chunk is flushed before the next read.
pub async fn run<R, W>(label: &'static str, mut source: R, mut sink: W) -> PumpSummary
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut bytes: u64 = 0;
    let mut frames: u64 = 0;

    let outcome = loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break PumpOutcome::Eof,
            Ok(n) => n,
            Err(e) => break PumpOutcome::ReadError(e),
        };

        if let Err(e) = sink.write_all(&buf[..n]).await {
            break PumpOutcome::WriteError(e);
        }
        if let Err(e) = sink.flush().await {
            break PumpOutcome::WriteError(e);
        }

        bytes += n as u64;
        frames += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
        trace!(label, chunk = n, "Forwarded chunk");
    };

    debug!(
        label,
        bytes,
        frames,
        clean = matches!(outcome, PumpOutcome::Eof),
        "Pump finished"
    );
    PumpSummary {
        label,
        bytes,
        frames,
        outcome,
    }
}
