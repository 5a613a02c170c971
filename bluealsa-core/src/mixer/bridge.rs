//! Wires the C9 mixer into a transport's `Endpoint` (spec §4.6/§4.9): an
//! `Endpoint`'s PCM source/sink is a boxed `AsyncRead`/`AsyncWrite`, and a
//! direct client FIFO already satisfies that; this module gives
//! `PlaybackMixer`/`CaptureFanout` the same shape so `attach_reader`/
//! `attach_writer` can't tell the two apart.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{CaptureFanout, PlaybackMixer};
use crate::transport::{Endpoint, PcmReader, PcmWriter};

/// Adapts `PlaybackMixer::mix` to `AsyncRead` so the encoder worker can read
/// from it exactly like a direct client FIFO. `mix` is synchronous and
/// non-blocking (it only ever `try_recv`s), so a `std::sync::Mutex` held for
/// the duration of one `mix` call is enough — no need to model this as a
/// real async operation with its own waker bookkeeping.
pub struct MixerReader {
    mixer: Arc<StdMutex<PlaybackMixer>>,
    channels: usize,
}

impl MixerReader {
    pub fn new(mixer: Arc<StdMutex<PlaybackMixer>>, channels: u8) -> Self {
        MixerReader {
            mixer,
            channels: channels.max(1) as usize,
        }
    }
}

impl AsyncRead for MixerReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let sample_bytes = std::mem::size_of::<i16>();
        let n_samples = (buf.remaining() / sample_bytes / self.channels) * self.channels;
        if n_samples == 0 {
            return Poll::Ready(Ok(()));
        }

        let mixed = self.mixer.lock().unwrap().mix(n_samples);
        // No active client right now: feed silence rather than signalling
        // EOF, since "no clients" is a transient state the worker should
        // keep polling through, not a closed stream.
        if mixed.is_empty() {
            buf.put_slice(&vec![0u8; n_samples * sample_bytes]);
        } else {
            let bytes: &[u8] = bytemuck::cast_slice(&mixed);
            buf.put_slice(bytes);
        }
        Poll::Ready(Ok(()))
    }
}

/// Adapts `CaptureFanout::publish` to `AsyncWrite` so the decoder worker can
/// write to it exactly like a direct client FIFO.
pub struct FanoutWriter {
    fanout: Arc<CaptureFanout>,
}

impl FanoutWriter {
    pub fn new(fanout: Arc<CaptureFanout>) -> Self {
        FanoutWriter { fanout }
    }
}

impl AsyncWrite for FanoutWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let samples: Vec<i16> = bytemuck::cast_slice(buf).to_vec();
        self.fanout.publish(samples);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Attaches a playback mixer as `endpoint`'s PCM source — the encoder
/// worker's next read pulls a freshly-mixed block instead of a single
/// client's raw stream.
pub async fn attach_playback_mixer(endpoint: &Endpoint, mixer: Arc<StdMutex<PlaybackMixer>>) {
    let reader: PcmReader = Box::new(MixerReader::new(mixer, endpoint.channels));
    endpoint.attach_reader(reader).await;
}

/// Attaches a capture fan-out as `endpoint`'s PCM sink — every decoded block
/// the decoder worker writes is published to every subscribed client.
pub async fn attach_capture_fanout(endpoint: &Endpoint, fanout: Arc<CaptureFanout>) {
    let writer: PcmWriter = Box::new(FanoutWriter::new(fanout));
    endpoint.attach_writer(writer).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Direction, SampleFormat};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn mixer_reader_feeds_silence_with_no_clients() {
        let mixer = Arc::new(StdMutex::new(PlaybackMixer::new()));
        let mut reader = MixerReader::new(mixer, 2);
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0u8; 8]);
    }

    #[tokio::test]
    async fn mixer_reader_surfaces_mixed_client_audio() {
        let mixer = Arc::new(StdMutex::new(PlaybackMixer::new()));
        let handle = mixer.lock().unwrap().add_client(8);
        handle.audio_tx.send(vec![100, -100]).await.unwrap();

        let mut reader = MixerReader::new(mixer, 2);
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).await.unwrap();
        let samples: &[i16] = bytemuck::cast_slice(&buf);
        assert_eq!(samples, [100, -100]);
    }

    #[tokio::test]
    async fn fanout_writer_publishes_to_subscribers() {
        let fanout = Arc::new(CaptureFanout::new(8));
        let mut next_id = 0;
        let (mut client, _handle) = fanout.add_client(&mut next_id);

        let mut writer = FanoutWriter::new(fanout);
        let pcm: [i16; 2] = [42, -42];
        let bytes: &[u8] = bytemuck::cast_slice(&pcm);
        writer.write_all(bytes).await.unwrap();

        let frame = client.try_recv().expect("frame should be available");
        assert_eq!(*frame.0, vec![42, -42]);
    }

    #[tokio::test]
    async fn attach_helpers_wire_endpoint_pcm_slots() {
        let endpoint = Endpoint::new(Direction::Playback, SampleFormat::S16Le, 2, 44_100);
        let mixer = Arc::new(StdMutex::new(PlaybackMixer::new()));
        attach_playback_mixer(&endpoint, mixer).await;
        assert!(endpoint.pcm_reader.lock().await.is_some());

        let capture = Endpoint::new(Direction::Capture, SampleFormat::S16Le, 2, 44_100);
        let fanout = Arc::new(CaptureFanout::new(8));
        attach_capture_fanout(&capture, fanout).await;
        assert!(capture.pcm_writer.lock().await.is_some());
    }
}
