//! C6 (Endpoint) + C7 (Transport and its lifecycle FSM), spec §4.6-4.7.

mod backend;
mod endpoint;
mod fsm;

pub use backend::{AcquiredTransport, BlueZBackend};
#[cfg(any(test, feature = "test-support"))]
pub use backend::test_support;
pub use endpoint::{DelayReport, Direction, Endpoint, PcmReader, PcmWriter, SampleFormat, VolumeChannel};
pub use fsm::{FsmError, TransportEvent, TransportState};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::io::BtSocket;
use bluealsa_util::BdAddr;

/// Bluetooth profile a transport speaks, spec §3's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    A2dpSource,
    A2dpSink,
    HfpAg,
    HfpHf,
    HspAg,
    HspHs,
}

impl Profile {
    pub fn is_a2dp(self) -> bool {
        matches!(self, Profile::A2dpSource | Profile::A2dpSink)
    }

    pub fn is_sco(self) -> bool {
        !self.is_a2dp()
    }
}

/// Negotiated codec, spec §4.8's twelve adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    Sbc,
    MSbc,
    Lc3Swb,
    Cvsd,
    Mp3,
    Aac,
    AptX,
    AptXHd,
    Ldac,
    Lhdc,
    FastStream,
    Opus,
    G722,
}

impl CodecId {
    /// True for the SCO-side codecs (spec §4.3's H2 framing applies only to
    /// these).
    pub fn is_sco(self) -> bool {
        matches!(
            self,
            CodecId::MSbc | CodecId::Lc3Swb | CodecId::Cvsd | CodecId::G722
        )
    }
}

/// A single acquired Bluetooth audio connection: its socket, negotiated
/// codec, lifecycle state, and up to two PCM endpoints (A2DP has one, HFP/HSP
/// has both playback and capture).
pub struct Transport {
    pub addr: BdAddr,
    pub profile: Profile,
    pub codec: AsyncMutex<CodecId>,
    pub read_mtu: AsyncMutex<u16>,
    pub write_mtu: AsyncMutex<u16>,
    pub socket: AsyncMutex<Option<Arc<BtSocket>>>,
    pub state: AsyncMutex<TransportState>,
    pub keep_alive: Duration,
    pub playback: Option<Arc<Endpoint>>,
    pub capture: Option<Arc<Endpoint>>,
    pub stop: CancellationToken,
    backend: Arc<dyn BlueZBackend>,
}

impl Transport {
    pub fn new(
        addr: BdAddr,
        profile: Profile,
        codec: CodecId,
        keep_alive: Duration,
        playback: Option<Arc<Endpoint>>,
        capture: Option<Arc<Endpoint>>,
        backend: Arc<dyn BlueZBackend>,
    ) -> Self {
        Transport {
            addr,
            profile,
            codec: AsyncMutex::new(codec),
            read_mtu: AsyncMutex::new(0),
            write_mtu: AsyncMutex::new(0),
            socket: AsyncMutex::new(None),
            state: AsyncMutex::new(TransportState::Idle),
            keep_alive,
            playback,
            capture,
            stop: CancellationToken::new(),
            backend,
        }
    }

    /// Drives Idle -> Pending -> Active, acquiring the BT socket and
    /// recording its MTUs (spec §4.7).
    pub async fn acquire(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().await;
            *state = state
                .apply(TransportEvent::AcquireRequested)
                .map_err(|e| TransportError::InvalidState(e.state))?;
        }

        match self.backend.acquire(self.addr, self.profile).await {
            Ok(acquired) => {
                let sock = BtSocket::from_raw_fd(acquired.fd)
                    .map_err(TransportError::Io)?;
                *self.read_mtu.lock().await = acquired.read_mtu;
                *self.write_mtu.lock().await = acquired.write_mtu;
                *self.socket.lock().await = Some(Arc::new(sock));

                let mut state = self.state.lock().await;
                *state = state
                    .apply(TransportEvent::AcquireSucceeded)
                    .map_err(|e| TransportError::InvalidState(e.state))?;
                Ok(())
            }
            Err(io_err) => {
                let mut state = self.state.lock().await;
                let _ = state.apply(TransportEvent::AcquireFailed);
                Err(TransportError::AcquireFailed(io_err.to_string()))
            }
        }
    }

    /// Tears down: signals workers to stop, drops the socket, notifies the
    /// backend, and returns to Idle.
    pub async fn release(&self) {
        {
            let mut state = self.state.lock().await;
            if let Ok(next) = state.apply(TransportEvent::ReleaseRequested) {
                *state = next;
            }
        }

        self.stop.cancel();
        self.socket.lock().await.take();
        self.backend.release(self.addr, self.profile).await;

        let mut state = self.state.lock().await;
        if let Ok(next) = state.apply(TransportEvent::ReleaseCompleted) {
            *state = next;
        }
    }

    pub async fn current_state(&self) -> TransportState {
        *self.state.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::LoopbackBackend;

    fn test_transport(backend: Arc<dyn BlueZBackend>) -> Transport {
        Transport::new(
            "00:11:22:33:44:55".parse().unwrap(),
            Profile::A2dpSource,
            CodecId::Sbc,
            Duration::from_secs(5),
            None,
            None,
            backend,
        )
    }

    #[tokio::test]
    async fn acquire_then_release_round_trips_through_idle() {
        let backend = Arc::new(LoopbackBackend::new(672, 672));
        let t = test_transport(backend);

        assert_eq!(t.current_state().await, TransportState::Idle);
        t.acquire().await.unwrap();
        assert_eq!(t.current_state().await, TransportState::Active);
        assert!(t.socket.lock().await.is_some());

        t.release().await;
        assert_eq!(t.current_state().await, TransportState::Idle);
        assert!(t.socket.lock().await.is_none());
    }

    #[tokio::test]
    async fn release_cancels_worker_stop_token() {
        let backend = Arc::new(LoopbackBackend::new(672, 672));
        let t = test_transport(backend);
        t.acquire().await.unwrap();
        assert!(!t.stop.is_cancelled());
        t.release().await;
        assert!(t.stop.is_cancelled());
    }
}
