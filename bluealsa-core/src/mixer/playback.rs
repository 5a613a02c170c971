//! Playback fan-in (spec §4.9): several local clients write PCM
//! concurrently; the mixer sums them sample-by-sample (clamped) into one
//! stream for the encoder worker to consume. Grounded on the teacher's
//! `MultiSubscriberNode`/bounded-mpsc fan-in shape
//! (`pmoaudio::nodes::mod.rs`), adapted from fan-out to fan-in.

use std::collections::HashMap;
use tokio::sync::mpsc;

use tokio::sync::oneshot;

use super::client::{ClientCommand, ClientSlot, ClientState};

/// One playback client's inbound PCM queue plus its control slot.
struct PlaybackClient {
    slot: ClientSlot,
    audio_rx: mpsc::Receiver<Vec<i16>>,
    pending: Vec<i16>,
    drain_reply: Option<oneshot::Sender<()>>,
}

pub struct PlaybackMixer {
    clients: HashMap<u64, PlaybackClient>,
    next_id: u64,
}

pub struct PlaybackClientHandle {
    pub id: u64,
    pub audio_tx: mpsc::Sender<Vec<i16>>,
    pub commands: mpsc::Sender<ClientCommand>,
}

impl PlaybackMixer {
    pub fn new() -> Self {
        PlaybackMixer {
            clients: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn add_client(&mut self, audio_channel_depth: usize) -> PlaybackClientHandle {
        let id = self.next_id;
        self.next_id += 1;

        let (slot, handle) = ClientSlot::new(id);
        let (audio_tx, audio_rx) = mpsc::channel(audio_channel_depth);

        self.clients.insert(
            id,
            PlaybackClient {
                slot,
                audio_rx,
                pending: Vec::new(),
                drain_reply: None,
            },
        );

        PlaybackClientHandle {
            id,
            audio_tx,
            commands: handle.commands,
        }
    }

    pub fn remove_client(&mut self, id: u64) {
        self.clients.remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Pulls as much queued audio as is available from every active client
    /// without blocking, sums it sample-wise (each client contributes
    /// silence once its own queue runs dry), and returns `n_frames *
    /// channels` summed samples. Paused/draining clients contribute
    /// silence and are excluded from the drain-completion check.
    pub fn mix(&mut self, n_samples: usize) -> Vec<i16> {
        let mut out = vec![0i32; n_samples];
        let mut any_active = false;

        for client in self.clients.values_mut() {
            if let Some(reply) = client.slot.poll_commands() {
                if client.pending.is_empty() {
                    let _ = reply.send(());
                    client.slot.state = ClientState::Active;
                } else {
                    // Still has buffered audio; replied once `pending`
                    // empties out below (this call or a later one).
                    client.drain_reply = Some(reply);
                }
            }

            if client.slot.state == ClientState::Paused {
                continue;
            }

            while client.pending.len() < n_samples {
                match client.audio_rx.try_recv() {
                    Ok(mut chunk) => client.pending.append(&mut chunk),
                    Err(_) => break,
                }
            }

            if client.pending.is_empty() {
                continue;
            }
            any_active = true;

            let take = client.pending.len().min(n_samples);
            for (slot, &sample) in out.iter_mut().zip(client.pending[..take].iter()) {
                *slot = (*slot + sample as i32).clamp(i16::MIN as i32, i16::MAX as i32);
            }
            client.pending.drain(..take);

            if client.slot.state == ClientState::Draining && client.pending.is_empty() {
                if let Some(reply) = client.drain_reply.take() {
                    let _ = reply.send(());
                }
                client.slot.state = ClientState::Active;
            }
        }

        if !any_active {
            return Vec::new();
        }
        out.into_iter().map(|s| s as i16).collect()
    }
}

impl Default for PlaybackMixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sums_two_clients_without_overflow() {
        let mut mixer = PlaybackMixer::new();
        let a = mixer.add_client(8);
        let b = mixer.add_client(8);

        a.audio_tx.send(vec![20000, 20000]).await.unwrap();
        b.audio_tx.send(vec![20000, 20000]).await.unwrap();

        let mixed = mixer.mix(2);
        assert_eq!(mixed, vec![i16::MAX, i16::MAX]);
    }

    #[tokio::test]
    async fn empty_mixer_returns_empty() {
        let mut mixer = PlaybackMixer::new();
        assert!(mixer.mix(4).is_empty());
    }

    #[tokio::test]
    async fn paused_client_contributes_nothing() {
        let mut mixer = PlaybackMixer::new();
        let a = mixer.add_client(8);
        a.audio_tx.send(vec![1000, 1000]).await.unwrap();
        a.commands.send(ClientCommand::Pause).await.unwrap();

        let mixed = mixer.mix(2);
        assert!(mixed.is_empty());
    }
}
