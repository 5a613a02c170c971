//! C10: the transport manager. Spawns/cancels the encoder/decoder worker
//! pair for each acquired transport, and handles codec reselection
//! (`CODEC_CHANGE`/`ESTALE`) by restarting only the affected worker's inner
//! codec loop, not the transport or its BT socket (spec §4.10, §9's
//! redesign note: cooperative cancellation via an explicit stop signal
//! checked only at the suspension points in [`crate::io::poll`]).
//!
//! Framing is dispatched on [`crate::framing::FrameKind`], a property of the
//! negotiated codec, not of the transport's profile: CVSD and mSBC are both
//! SCO-side codecs but frame completely differently, and FastStream is an
//! A2DP codec that carries neither RTP nor H2.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bluealsa_util::BdAddr;

use crate::codec::{make_decoder, make_encoder, msbc, Decoder, Encoder};
use crate::error::{CoreError, TransportError};
use crate::ffb::Ffb;
use crate::framing::{
    lhdc_header_bytes, media_header_byte, mpeg_audio_header_bytes, mpeg_audio_header_offset,
    parse_media_header_byte, FrameKind, LHDC_HEADER_LEN, MAX_COUNTED_FRAMES, MEDIA_HEADER_LEN,
    MPEG_AUDIO_HEADER_LEN, MSBC_WRITE_CHUNK,
};
use crate::h2::{H2State, H2_HEADER_LEN};
use crate::io::{poll_and_read_bt, poll_and_read_pcm, BtSocket, ControlSignal, PollCtx, PollOutcome, SignalAction};
use crate::rtp::{RtpHeader, RtpInboundState, RtpOutboundState, RTP_HEADER_LEN};
use crate::transport::{CodecId, Endpoint, Transport};
use crate::PacedClock;

const ASHA_PREFIX_LEN: usize = 1;

struct ManagedTransport {
    transport: Arc<Transport>,
    codec_tx: watch::Sender<CodecId>,
    worker_stop: CancellationToken,
    playback_handle: Option<JoinHandle<()>>,
    capture_handle: Option<JoinHandle<()>>,
}

/// Owns the set of currently-acquired transports and their worker tasks.
pub struct TransportManager {
    transports: AsyncMutex<HashMap<BdAddr, ManagedTransport>>,
}

impl TransportManager {
    pub fn new() -> Self {
        TransportManager {
            transports: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Acquires `transport`'s BT socket and spawns its worker pair. Takes
    /// `&Arc<Self>` so a worker that exits with an error can call back into
    /// [`Self::fail`] without the spawned task having to smuggle a raw
    /// manager reference past its own lifetime.
    pub async fn spawn(self: &Arc<Self>, transport: Arc<Transport>) -> Result<(), CoreError> {
        transport.acquire().await.map_err(CoreError::Transport)?;

        let codec = *transport.codec.lock().await;
        let (codec_tx, codec_rx) = watch::channel(codec);
        let worker_stop = transport.stop.child_token();

        let socket = transport
            .socket
            .lock()
            .await
            .clone()
            .ok_or_else(|| CoreError::Transport(TransportError::AcquireFailed("no socket after acquire".into())))?;
        let write_mtu = *transport.write_mtu.lock().await;
        let read_mtu = *transport.read_mtu.lock().await;
        let addr = transport.addr;

        let playback_handle = transport.playback.clone().map(|endpoint| {
            let socket = socket.clone();
            let codec_rx = codec_rx.clone();
            let stop = worker_stop.clone();
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = encoder_worker(endpoint, socket, codec_rx, write_mtu, stop).await {
                    tracing::warn!(%err, "encoder worker exited, failing transport");
                    manager.fail(addr).await;
                }
            })
        });

        let capture_handle = transport.capture.clone().map(|endpoint| {
            let socket = socket.clone();
            let codec_rx = codec_rx.clone();
            let stop = worker_stop.clone();
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = decoder_worker(endpoint, socket, codec_rx, read_mtu, stop).await {
                    tracing::warn!(%err, "decoder worker exited, failing transport");
                    manager.fail(addr).await;
                }
            })
        });

        self.transports.lock().await.insert(
            addr,
            ManagedTransport {
                transport,
                codec_tx,
                worker_stop,
                playback_handle,
                capture_handle,
            },
        );
        Ok(())
    }

    /// `CODEC_CHANGE`/`ESTALE`: swap the negotiated codec without tearing
    /// down the transport. Workers observe the change at their next poll
    /// and rebuild their codec state in place.
    pub async fn reselect_codec(&self, addr: BdAddr, new_codec: CodecId) -> Result<(), CoreError> {
        let transports = self.transports.lock().await;
        let managed = transports
            .get(&addr)
            .ok_or_else(|| CoreError::Transport(TransportError::AcquireFailed("unknown transport".into())))?;

        *managed.transport.codec.lock().await = new_codec;
        let _ = managed.codec_tx.send(new_codec);

        if let Some(playback) = &managed.transport.playback {
            let _ = playback.control_tx.send(ControlSignal::CodecChange).await;
        }
        if let Some(capture) = &managed.transport.capture {
            let _ = capture.control_tx.send(ControlSignal::CodecChange).await;
        }
        Ok(())
    }

    /// Cancels the worker pair and releases the transport's BT socket.
    pub async fn release(&self, addr: BdAddr) {
        let managed = self.transports.lock().await.remove(&addr);
        if let Some(managed) = managed {
            managed.worker_stop.cancel();
            if let Some(handle) = managed.playback_handle {
                let _ = handle.await;
            }
            if let Some(handle) = managed.capture_handle {
                let _ = handle.await;
            }
            managed.transport.release().await;
        }
    }

    /// Moves a transport out of the managed set and tears it down after a
    /// worker reports an unrecoverable error (spec §7: escalate to
    /// RELEASING rather than leave a half-dead transport registered).
    ///
    /// Removal and cancellation happen synchronously so a second worker
    /// error racing in can't observe a still-registered, already-failing
    /// transport. The actual `JoinHandle` awaits happen in a detached task:
    /// `fail` is frequently called *from* one of the two worker tasks whose
    /// handle it would need to await, and awaiting your own handle deadlocks.
    pub async fn fail(&self, addr: BdAddr) {
        let managed = self.transports.lock().await.remove(&addr);
        if let Some(managed) = managed {
            managed.worker_stop.cancel();
            tokio::spawn(async move {
                if let Some(handle) = managed.playback_handle {
                    let _ = handle.await;
                }
                if let Some(handle) = managed.capture_handle {
                    let _ = handle.await;
                }
                managed.transport.release().await;
            });
        }
    }

    /// Releases every managed transport, e.g. on daemon shutdown.
    pub async fn release_all(&self) {
        let addrs: Vec<BdAddr> = self.transports.lock().await.keys().copied().collect();
        for addr in addrs {
            self.release(addr).await;
        }
    }

    pub async fn is_managed(&self, addr: BdAddr) -> bool {
        self.transports.lock().await.contains_key(&addr)
    }
}

impl Default for TransportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes up to `cap` codec frames from the front of `pcm_buf` into one
/// contiguous payload, stopping early if another frame wouldn't fit in
/// `max_payload` bytes (spec §4.8 step 4: "pack as many whole frames as fit,
/// up to the codec's per-packet limit"). Shared by [`FrameKind::RtpCounted`],
/// [`FrameKind::RtpLhdc`], and [`FrameKind::Packed3`], which differ only in
/// `cap` and the header stamped around the returned payload.
fn pack_frames(
    encoder: &mut dyn Encoder,
    pcm_buf: &mut Ffb<i16>,
    frame_samples: usize,
    cap: u8,
    max_payload: usize,
    scratch: &mut [u8],
) -> Result<(Vec<u8>, u8), CoreError> {
    let mut payload = Vec::new();
    let mut count = 0u8;
    while count < cap && pcm_buf.len_out() >= frame_samples {
        let written = encoder
            .encode(&pcm_buf.data()[..frame_samples], scratch)
            .map_err(CoreError::Codec)?;
        if !payload.is_empty() && payload.len() + written > max_payload {
            break;
        }
        payload.extend_from_slice(&scratch[..written]);
        pcm_buf.shift(frame_samples);
        count += 1;
    }
    Ok((payload, count))
}

/// PCM-in, BT-out: reads from the endpoint's source (direct FIFO or mixer),
/// encodes, frames per the negotiated codec's [`FrameKind`], paces, and
/// writes to the socket.
async fn encoder_worker(
    endpoint: Arc<Endpoint>,
    socket: Arc<BtSocket>,
    mut codec_rx: watch::Receiver<CodecId>,
    write_mtu: u16,
    stop: CancellationToken,
) -> Result<(), CoreError> {
    loop {
        if stop.is_cancelled() {
            return Ok(());
        }
        let codec = *codec_rx.borrow_and_update();
        let frame_kind = codec.frame_kind();
        let mut encoder = make_encoder(codec, endpoint.channels, endpoint.rate).map_err(CoreError::Codec)?;
        let channels = endpoint.channels as usize;
        let frame_samples = encoder.frame_pcm_frames() * channels;
        let rate = endpoint.rate;

        let mut pcm_buf: Ffb<i16> = Ffb::new(frame_samples * 8);
        let mut scratch = vec![0u8; encoder.max_frame_bytes()];
        let mut rtp_state = RtpOutboundState::new(rate, rand::rng().random());
        let mut h2_state = H2State::new();
        let mut lhdc_seq: u8 = 0;
        let mut asha_seq: u8 = 0;
        let mut clock = PacedClock::new(rate);
        let ctx = PollCtx::new(Duration::from_millis(500), stop.clone());

        loop {
            if codec_rx.has_changed().unwrap_or(false) {
                break;
            }

            let outcome = {
                let mut reader_guard = endpoint.pcm_reader.lock().await;
                let mut control_guard = endpoint.control_rx.lock().await;
                match reader_guard.as_mut() {
                    Some(reader) => {
                        let byte_buf = bytemuck::cast_slice_mut(pcm_buf.tail_mut());
                        poll_and_read_pcm(&ctx, reader, &mut *control_guard, byte_buf, |signal| match signal {
                            ControlSignal::CodecChange => SignalAction::Return(PollOutcome::Stale),
                            ControlSignal::PcmClose => SignalAction::Return(PollOutcome::Closed),
                            _ => SignalAction::Continue,
                        })
                        .await
                    }
                    None => PollOutcome::Timeout,
                }
            };

            match outcome {
                PollOutcome::Cancelled => return Ok(()),
                PollOutcome::Stale => break,
                PollOutcome::Closed => {
                    clock.sync(0).await;
                    continue;
                }
                PollOutcome::Timeout => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    continue;
                }
                PollOutcome::Data(bytes) => {
                    pcm_buf.seek(bytes / std::mem::size_of::<i16>());
                }
            }

            while pcm_buf.len_out() >= frame_samples {
                let frames_sent = match frame_kind {
                    FrameKind::RtpCounted => {
                        let max_payload = (write_mtu as usize).saturating_sub(RTP_HEADER_LEN + MEDIA_HEADER_LEN);
                        let (payload, count) =
                            pack_frames(&mut *encoder, &mut pcm_buf, frame_samples, MAX_COUNTED_FRAMES, max_payload, &mut scratch)?;
                        if count == 0 {
                            break;
                        }
                        let header = rtp_state.new_frame(false);
                        let mut out = Vec::with_capacity(RTP_HEADER_LEN + MEDIA_HEADER_LEN + payload.len());
                        out.extend_from_slice(&header.to_bytes());
                        out.push(media_header_byte(false, false, false, count));
                        out.extend_from_slice(&payload);
                        send(&socket, &out).await?;
                        rtp_state.update(encoder.frame_pcm_frames() as u32 * count as u32, rate);
                        count
                    }
                    FrameKind::RtpLhdc => {
                        let max_payload = (write_mtu as usize).saturating_sub(RTP_HEADER_LEN + LHDC_HEADER_LEN);
                        let (payload, count) =
                            pack_frames(&mut *encoder, &mut pcm_buf, frame_samples, u8::MAX, max_payload, &mut scratch)?;
                        if count == 0 {
                            break;
                        }
                        let header = rtp_state.new_frame(false);
                        let mut out = Vec::with_capacity(RTP_HEADER_LEN + LHDC_HEADER_LEN + payload.len());
                        out.extend_from_slice(&header.to_bytes());
                        out.extend_from_slice(&lhdc_header_bytes(count, lhdc_seq));
                        lhdc_seq = lhdc_seq.wrapping_add(1);
                        out.extend_from_slice(&payload);
                        send(&socket, &out).await?;
                        rtp_state.update(encoder.frame_pcm_frames() as u32 * count as u32, rate);
                        count
                    }
                    FrameKind::Packed3 => {
                        let (payload, count) =
                            pack_frames(&mut *encoder, &mut pcm_buf, frame_samples, 3, write_mtu as usize, &mut scratch)?;
                        if count == 0 {
                            break;
                        }
                        send(&socket, &payload).await?;
                        count
                    }
                    FrameKind::RtpPlain => {
                        let written = encoder
                            .encode(&pcm_buf.data()[..frame_samples], &mut scratch)
                            .map_err(CoreError::Codec)?;
                        pcm_buf.shift(frame_samples);
                        let header = rtp_state.new_frame(false);
                        let mut out = Vec::with_capacity(RTP_HEADER_LEN + written);
                        out.extend_from_slice(&header.to_bytes());
                        out.extend_from_slice(&scratch[..written]);
                        send(&socket, &out).await?;
                        rtp_state.update(encoder.frame_pcm_frames() as u32, rate);
                        1
                    }
                    FrameKind::H2 => {
                        let written = encoder
                            .encode(&pcm_buf.data()[..frame_samples], &mut scratch)
                            .map_err(CoreError::Codec)?;
                        pcm_buf.shift(frame_samples);
                        let h2_header = h2_state.next_header();
                        let mut frame = Vec::with_capacity(H2_HEADER_LEN + written);
                        frame.extend_from_slice(&h2_header.0);
                        frame.extend_from_slice(&scratch[..written]);
                        if codec == CodecId::MSbc {
                            let padded_len =
                                (frame.len() + MSBC_WRITE_CHUNK - 1) / MSBC_WRITE_CHUNK * MSBC_WRITE_CHUNK;
                            frame.resize(padded_len, 0);
                            for chunk in frame.chunks(MSBC_WRITE_CHUNK) {
                                send(&socket, chunk).await?;
                            }
                        } else {
                            send(&socket, &frame).await?;
                        }
                        1
                    }
                    FrameKind::AshaPrefix => {
                        let written = encoder
                            .encode(&pcm_buf.data()[..frame_samples], &mut scratch)
                            .map_err(CoreError::Codec)?;
                        pcm_buf.shift(frame_samples);
                        let mut frame = Vec::with_capacity(ASHA_PREFIX_LEN + written);
                        frame.push(asha_seq);
                        asha_seq = asha_seq.wrapping_add(1);
                        frame.extend_from_slice(&scratch[..written]);
                        send(&socket, &frame).await?;
                        1
                    }
                    FrameKind::RawPassthrough => {
                        let written = encoder
                            .encode(&pcm_buf.data()[..frame_samples], &mut scratch)
                            .map_err(CoreError::Codec)?;
                        pcm_buf.shift(frame_samples);
                        send(&socket, &scratch[..written]).await?;
                        1
                    }
                    FrameKind::RtpMpegFragmented => {
                        let written = encoder
                            .encode(&pcm_buf.data()[..frame_samples], &mut scratch)
                            .map_err(CoreError::Codec)?;
                        pcm_buf.shift(frame_samples);
                        let max_fragment =
                            (write_mtu as usize).saturating_sub(RTP_HEADER_LEN + MPEG_AUDIO_HEADER_LEN).max(1);
                        let mut offset = 0usize;
                        while offset < written {
                            let chunk_len = max_fragment.min(written - offset);
                            let is_last = offset + chunk_len >= written;
                            let header = rtp_state.new_frame(is_last);
                            let mut out = Vec::with_capacity(RTP_HEADER_LEN + MPEG_AUDIO_HEADER_LEN + chunk_len);
                            out.extend_from_slice(&header.to_bytes());
                            out.extend_from_slice(&mpeg_audio_header_bytes(offset as u16));
                            out.extend_from_slice(&scratch[offset..offset + chunk_len]);
                            send(&socket, &out).await?;
                            offset += chunk_len;
                        }
                        rtp_state.update(encoder.frame_pcm_frames() as u32, rate);
                        1
                    }
                    FrameKind::RtpMarkFragmented => {
                        let written = encoder
                            .encode(&pcm_buf.data()[..frame_samples], &mut scratch)
                            .map_err(CoreError::Codec)?;
                        pcm_buf.shift(frame_samples);
                        let max_fragment = (write_mtu as usize).saturating_sub(RTP_HEADER_LEN).max(1);
                        let mut offset = 0usize;
                        while offset < written {
                            let chunk_len = max_fragment.min(written - offset);
                            let is_last = offset + chunk_len >= written;
                            let header = rtp_state.new_frame(is_last);
                            let mut out = Vec::with_capacity(RTP_HEADER_LEN + chunk_len);
                            out.extend_from_slice(&header.to_bytes());
                            out.extend_from_slice(&scratch[offset..offset + chunk_len]);
                            send(&socket, &out).await?;
                            offset += chunk_len;
                        }
                        rtp_state.update(encoder.frame_pcm_frames() as u32, rate);
                        1
                    }
                };

                if frames_sent > 0 {
                    let backlog = socket.pending_send_bytes().unwrap_or(0);
                    encoder.adapt_bitrate(backlog, write_mtu);
                    clock.sync(encoder.frame_pcm_frames() as u32 * frames_sent as u32).await;
                }
            }
        }
    }
}

/// Writes one datagram; a full kernel send queue (spec §5/§7's 16 KiB
/// backlog budget) surfaces as [`std::io::ErrorKind::WouldBlock`] from
/// [`BtSocket::send`] rather than blocking the worker, so it's dropped here
/// instead of propagated as a fatal transport error.
async fn send(socket: &BtSocket, buf: &[u8]) -> Result<(), CoreError> {
    match socket.send(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
            tracing::debug!("BT socket backlogged, dropping packet");
            Ok(())
        }
        Err(err) => Err(CoreError::Transport(TransportError::Io(err))),
    }
}

async fn write_pcm(endpoint: &Endpoint, pcm_out: &mut [i16], produced: usize) {
    endpoint.apply_volume(&mut pcm_out[..produced]);
    if let Some(writer) = endpoint.pcm_writer.lock().await.as_mut() {
        let bytes: &[u8] = bytemuck::cast_slice(&pcm_out[..produced]);
        let _ = writer.write_all(bytes).await;
    }
}

/// BT-in, PCM-out: reads a framed packet, deframes per the negotiated
/// codec's [`FrameKind`], decodes, applies volume/mute, and writes PCM to
/// the endpoint's sink (direct FIFO or mixer).
async fn decoder_worker(
    endpoint: Arc<Endpoint>,
    socket: Arc<BtSocket>,
    mut codec_rx: watch::Receiver<CodecId>,
    read_mtu: u16,
    stop: CancellationToken,
) -> Result<(), CoreError> {
    loop {
        if stop.is_cancelled() {
            return Ok(());
        }
        let codec = *codec_rx.borrow_and_update();
        let frame_kind = codec.frame_kind();
        let mut decoder = make_decoder(codec, endpoint.channels, endpoint.rate).map_err(CoreError::Codec)?;
        let frame_samples = decoder.frame_pcm_frames() * endpoint.channels as usize;

        let recv_cap = (read_mtu as usize).max(decoder.max_frame_bytes() + RTP_HEADER_LEN + 64);
        let mut recv_buf = vec![0u8; recv_cap];
        let mut pcm_out = vec![0i16; frame_samples];
        let mut rtp_inbound = RtpInboundState::new();
        let ctx = PollCtx::new(Duration::from_millis(500), stop.clone());

        let mut msbc_accum: Vec<u8> = Vec::new();
        let mut mpeg_accum: Vec<u8> = Vec::new();
        let mut mpeg_expected_offset: u16 = 0;
        let mut mark_accum: Vec<u8> = Vec::new();
        let mut unmarked_run: u32 = 0;
        let mut mark_quirk_active = false;

        loop {
            if codec_rx.has_changed().unwrap_or(false) {
                break;
            }

            let outcome = poll_and_read_bt(&ctx, &socket, &mut recv_buf).await;
            let n = match outcome {
                PollOutcome::Cancelled | PollOutcome::Closed => return Ok(()),
                PollOutcome::Timeout | PollOutcome::Stale => continue,
                PollOutcome::Data(n) => n,
            };

            match frame_kind {
                FrameKind::RtpCounted | FrameKind::RtpLhdc => {
                    let header_len = if frame_kind == FrameKind::RtpCounted {
                        RTP_HEADER_LEN + MEDIA_HEADER_LEN
                    } else {
                        RTP_HEADER_LEN + LHDC_HEADER_LEN
                    };
                    if n < header_len {
                        continue;
                    }
                    let header = match RtpHeader::from_bytes(&recv_buf[..n]) {
                        Some(header) => header,
                        None => continue,
                    };
                    let missing = rtp_inbound.sync_stream(&header);
                    if missing < 0 {
                        continue;
                    }
                    if missing > 0 {
                        tracing::warn!(missing, "RTP sequence gap");
                    }
                    let frame_count = if frame_kind == FrameKind::RtpCounted {
                        parse_media_header_byte(recv_buf[RTP_HEADER_LEN]).3
                    } else {
                        recv_buf[RTP_HEADER_LEN + 1]
                    };
                    let mut offset = header_len;
                    for _ in 0..frame_count.max(1) {
                        if offset >= n {
                            break;
                        }
                        match decoder.decode(&recv_buf[offset..n], &mut pcm_out) {
                            Ok((consumed, produced)) => {
                                write_pcm(&endpoint, &mut pcm_out, produced).await;
                                offset += consumed;
                            }
                            Err(err) => {
                                tracing::warn!(%err, "codec decode failed, dropping frame");
                                break;
                            }
                        }
                    }
                }
                FrameKind::Packed3 => {
                    let mut offset = 0usize;
                    while offset < n {
                        match decoder.decode(&recv_buf[offset..n], &mut pcm_out) {
                            Ok((consumed, produced)) => {
                                write_pcm(&endpoint, &mut pcm_out, produced).await;
                                if consumed == 0 {
                                    break;
                                }
                                offset += consumed;
                            }
                            Err(err) => {
                                tracing::warn!(%err, "codec decode failed, dropping frame");
                                break;
                            }
                        }
                    }
                }
                FrameKind::RtpPlain => {
                    if n < RTP_HEADER_LEN {
                        continue;
                    }
                    let header = match RtpHeader::from_bytes(&recv_buf[..n]) {
                        Some(header) => header,
                        None => continue,
                    };
                    let missing = rtp_inbound.sync_stream(&header);
                    if missing < 0 {
                        continue;
                    }
                    if missing > 0 {
                        tracing::warn!(missing, "RTP sequence gap");
                    }
                    match decoder.decode(&recv_buf[RTP_HEADER_LEN..n], &mut pcm_out) {
                        Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                        Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                    }
                }
                FrameKind::H2 => {
                    if codec == CodecId::MSbc {
                        msbc_accum.extend_from_slice(&recv_buf[..n]);
                        let target_len = {
                            let raw = H2_HEADER_LEN + msbc::FRAME_BYTES;
                            (raw + MSBC_WRITE_CHUNK - 1) / MSBC_WRITE_CHUNK * MSBC_WRITE_CHUNK
                        };
                        if msbc_accum.len() < target_len {
                            continue;
                        }
                        let frame = std::mem::take(&mut msbc_accum);
                        if frame.len() < H2_HEADER_LEN {
                            continue;
                        }
                        match decoder.decode(&frame[H2_HEADER_LEN..], &mut pcm_out) {
                            Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                            Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                        }
                    } else {
                        if n < H2_HEADER_LEN {
                            continue;
                        }
                        match decoder.decode(&recv_buf[H2_HEADER_LEN..n], &mut pcm_out) {
                            Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                            Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                        }
                    }
                }
                FrameKind::AshaPrefix => {
                    if n < ASHA_PREFIX_LEN {
                        continue;
                    }
                    match decoder.decode(&recv_buf[ASHA_PREFIX_LEN..n], &mut pcm_out) {
                        Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                        Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                    }
                }
                FrameKind::RawPassthrough => match decoder.decode(&recv_buf[..n], &mut pcm_out) {
                    Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                    Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                },
                FrameKind::RtpMpegFragmented => {
                    if n < RTP_HEADER_LEN + MPEG_AUDIO_HEADER_LEN {
                        continue;
                    }
                    let header = match RtpHeader::from_bytes(&recv_buf[..n]) {
                        Some(header) => header,
                        None => continue,
                    };
                    let missing = rtp_inbound.sync_stream(&header);
                    if missing < 0 {
                        continue;
                    }
                    if missing > 0 {
                        tracing::warn!(missing, "RTP sequence gap, resyncing MPEG reassembly");
                        mpeg_accum.clear();
                        mpeg_expected_offset = 0;
                    }
                    let offset = mpeg_audio_header_offset(&recv_buf[RTP_HEADER_LEN..n]).unwrap_or(0);
                    if offset != mpeg_expected_offset {
                        tracing::warn!(offset, expected = mpeg_expected_offset, "MPEG fragment gap, dropping partial frame");
                        mpeg_accum.clear();
                        mpeg_expected_offset = 0;
                        if offset != 0 {
                            continue;
                        }
                    }
                    mpeg_accum.extend_from_slice(&recv_buf[RTP_HEADER_LEN + MPEG_AUDIO_HEADER_LEN..n]);
                    mpeg_expected_offset = mpeg_accum.len() as u16;
                    if header.marker {
                        match decoder.decode(&mpeg_accum, &mut pcm_out) {
                            Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                            Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                        }
                        mpeg_accum.clear();
                        mpeg_expected_offset = 0;
                    }
                }
                FrameKind::RtpMarkFragmented => {
                    if n < RTP_HEADER_LEN {
                        continue;
                    }
                    let header = match RtpHeader::from_bytes(&recv_buf[..n]) {
                        Some(header) => header,
                        None => continue,
                    };
                    let missing = rtp_inbound.sync_stream(&header);
                    if missing < 0 {
                        continue;
                    }
                    if missing > 0 {
                        tracing::warn!(missing, "RTP sequence gap");
                    }
                    let payload = &recv_buf[RTP_HEADER_LEN..n];
                    if mark_quirk_active {
                        match decoder.decode(payload, &mut pcm_out) {
                            Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                            Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                        }
                        continue;
                    }
                    mark_accum.extend_from_slice(payload);
                    if header.marker {
                        unmarked_run = 0;
                        match decoder.decode(&mark_accum, &mut pcm_out) {
                            Ok((_, produced)) => write_pcm(&endpoint, &mut pcm_out, produced).await,
                            Err(err) => tracing::warn!(%err, "codec decode failed, dropping frame"),
                        }
                        mark_accum.clear();
                    } else {
                        unmarked_run += 1;
                        if unmarked_run >= 3 {
                            tracing::warn!("AAC stream never marks fragment boundaries, switching to per-packet decode");
                            mark_quirk_active = true;
                            mark_accum.clear();
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::LoopbackBackend;
    use crate::transport::{BlueZBackend, Direction, Profile, SampleFormat};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn spawn_then_release_manages_lifecycle() {
        let backend: Arc<dyn BlueZBackend> = Arc::new(LoopbackBackend::new(672, 672));
        let addr: BdAddr = "00:11:22:33:44:55".parse().unwrap();
        let playback = Arc::new(Endpoint::new(Direction::Playback, SampleFormat::S16Le, 2, 44_100));
        let transport = Arc::new(Transport::new(
            addr,
            Profile::A2dpSource,
            CodecId::Sbc,
            StdDuration::from_secs(5),
            Some(playback),
            None,
            backend,
        ));

        let manager = Arc::new(TransportManager::new());
        manager.spawn(transport.clone()).await.unwrap();
        assert!(manager.is_managed(addr).await);

        manager.release(addr).await;
        assert!(!manager.is_managed(addr).await);
        assert_eq!(transport.current_state().await, crate::transport::TransportState::Idle);
    }

    #[tokio::test]
    async fn reselect_codec_updates_transport_without_releasing() {
        let backend: Arc<dyn BlueZBackend> = Arc::new(LoopbackBackend::new(672, 672));
        let addr: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let playback = Arc::new(Endpoint::new(Direction::Playback, SampleFormat::S16Le, 1, 16_000));
        let transport = Arc::new(Transport::new(
            addr,
            Profile::HfpAg,
            CodecId::Cvsd,
            StdDuration::from_secs(5),
            Some(playback),
            None,
            backend,
        ));

        let manager = Arc::new(TransportManager::new());
        manager.spawn(transport.clone()).await.unwrap();

        manager.reselect_codec(addr, CodecId::MSbc).await.unwrap();
        assert_eq!(*transport.codec.lock().await, CodecId::MSbc);
        assert_eq!(transport.current_state().await, crate::transport::TransportState::Active);

        manager.release(addr).await;
    }

    #[tokio::test]
    async fn failed_worker_releases_transport_without_self_join_deadlock() {
        let backend: Arc<dyn BlueZBackend> = Arc::new(LoopbackBackend::new(672, 672));
        let addr: BdAddr = "11:22:33:44:55:66".parse().unwrap();
        let playback = Arc::new(Endpoint::new(Direction::Playback, SampleFormat::S16Le, 2, 44_100));
        let transport = Arc::new(Transport::new(
            addr,
            Profile::A2dpSource,
            CodecId::Sbc,
            StdDuration::from_secs(5),
            Some(playback),
            None,
            backend,
        ));

        let manager = Arc::new(TransportManager::new());
        manager.spawn(transport.clone()).await.unwrap();
        assert!(manager.is_managed(addr).await);

        manager.fail(addr).await;
        assert!(!manager.is_managed(addr).await);

        for _ in 0..50 {
            if transport.current_state().await == crate::transport::TransportState::Idle {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        panic!("transport never returned to Idle after fail()");
    }
}
