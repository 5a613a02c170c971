//! `poll_and_read_pcm` / `poll_and_read_bt` (C5): the only two operations
//! that may suspend a worker, and hence the only two cooperative
//! cancellation points (spec §4.5, §5, §9).

use super::{BtSocket, ControlSignal};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared polling context: a timeout and the cooperative-cancellation flag.
/// Spec §9 replaces thread-cancellation with "an explicit 'stopping' atomic
/// flag checked inside every poll primitive" — that's exactly what
/// `CancellationToken` gives us here.
pub struct PollCtx {
    pub timeout: Duration,
    pub stop: CancellationToken,
}

impl PollCtx {
    pub fn new(timeout: Duration, stop: CancellationToken) -> Self {
        PollCtx { timeout, stop }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Bytes/samples were read into the caller's buffer.
    Data(usize),
    /// Timed out with nothing to read (or, for PCM, no clients attached).
    Timeout,
    /// The peer closed the stream (PCM: no clients left; BT: remote closed).
    Closed,
    /// `CODEC_CHANGE` was observed: caller must reinitialise codec state.
    Stale,
    /// The stopping flag was observed; the worker must unwind.
    Cancelled,
}

/// What a control-signal filter wants done with a signal it was handed.
pub enum SignalAction {
    /// The filter handled the signal itself (e.g. reset RTP state); keep
    /// polling for data.
    Continue,
    /// Stop polling and surface this outcome to the worker loop.
    Return(PollOutcome),
}

/// Poll the PCM FIFO and the endpoint's control channel; read into `buf` on
/// readiness. `on_signal` is the spec's "filter": it decides whether a
/// control signal is consumed in place or must be surfaced (e.g. `PCM_CLOSE`
/// resets inbound RTP state and is consumed; `CODEC_CHANGE` is surfaced as
/// [`PollOutcome::Stale`]).
pub async fn poll_and_read_pcm<R, F>(
    ctx: &PollCtx,
    reader: &mut R,
    control: &mut mpsc::Receiver<ControlSignal>,
    buf: &mut [u8],
    mut on_signal: F,
) -> PollOutcome
where
    R: AsyncRead + Unpin,
    F: FnMut(ControlSignal) -> SignalAction,
{
    loop {
        tokio::select! {
            biased;

            _ = ctx.stop.cancelled() => return PollOutcome::Cancelled,

            signal = control.recv() => {
                match signal {
                    None => return PollOutcome::Closed,
                    Some(signal) => match on_signal(signal) {
                        SignalAction::Continue => continue,
                        SignalAction::Return(outcome) => return outcome,
                    },
                }
            }

            result = reader.read(buf) => {
                return match result {
                    Ok(0) => PollOutcome::Closed,
                    Ok(n) => PollOutcome::Data(n),
                    Err(_) => PollOutcome::Closed,
                };
            }

            _ = tokio::time::sleep(ctx.timeout) => return PollOutcome::Timeout,
        }
    }
}

/// Poll the transport's BT socket; read one SEQPACKET datagram on
/// readiness.
pub async fn poll_and_read_bt(ctx: &PollCtx, socket: &BtSocket, buf: &mut [u8]) -> PollOutcome {
    tokio::select! {
        biased;

        _ = ctx.stop.cancelled() => PollOutcome::Cancelled,

        result = socket.recv(buf) => match result {
            Ok(0) => PollOutcome::Closed,
            Ok(n) => PollOutcome::Data(n),
            Err(_) => PollOutcome::Closed,
        },

        _ = tokio::time::sleep(ctx.timeout) => PollOutcome::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn reads_available_data() {
        let (mut writer, mut reader) = duplex(64);
        writer.write_all(b"hello").await.unwrap();

        let ctx = PollCtx::new(Duration::from_millis(200), CancellationToken::new());
        let (_tx, mut rx) = mpsc::channel(1);
        let mut buf = [0u8; 16];

        let outcome =
            poll_and_read_pcm(&ctx, &mut reader, &mut rx, &mut buf, |_| SignalAction::Continue)
                .await;
        assert_eq!(outcome, PollOutcome::Data(5));
        assert_eq!(&buf[..5], b"hello");
    }

    #[tokio::test]
    async fn control_signal_can_be_surfaced() {
        let (_writer, mut reader) = duplex(64);
        let ctx = PollCtx::new(Duration::from_millis(200), CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(ControlSignal::CodecChange).await.unwrap();
        let mut buf = [0u8; 16];

        let outcome = poll_and_read_pcm(&ctx, &mut reader, &mut rx, &mut buf, |signal| {
            match signal {
                ControlSignal::CodecChange => SignalAction::Return(PollOutcome::Stale),
                _ => SignalAction::Continue,
            }
        })
        .await;
        assert_eq!(outcome, PollOutcome::Stale);
    }

    #[tokio::test]
    async fn cancellation_wins_immediately() {
        let (_writer, mut reader) = duplex(64);
        let stop = CancellationToken::new();
        stop.cancel();
        let ctx = PollCtx::new(Duration::from_millis(200), stop);
        let (_tx, mut rx) = mpsc::channel(1);
        let mut buf = [0u8; 16];

        let outcome =
            poll_and_read_pcm(&ctx, &mut reader, &mut rx, &mut buf, |_| SignalAction::Continue)
                .await;
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test]
    async fn timeout_when_idle() {
        let (_writer, mut reader) = duplex(64);
        let ctx = PollCtx::new(Duration::from_millis(10), CancellationToken::new());
        let (_tx, mut rx) = mpsc::channel(1);
        let mut buf = [0u8; 16];

        let outcome =
            poll_and_read_pcm(&ctx, &mut reader, &mut rx, &mut buf, |_| SignalAction::Continue)
                .await;
        assert_eq!(outcome, PollOutcome::Timeout);
    }
}
