//! Per-client control plane (spec §4.9): DRAIN/DROP/PAUSE/RESUME, grounded
//! on the teacher's subscriber-list-plus-mpsc-channel pattern
//! (`pmoaudio::nodes::buffer_node::BufferNode`).

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// 400 ms, bluealsa's own drain timeout: long enough to flush a typical
/// transport buffer, short enough that a stuck client doesn't wedge a
/// DRAIN request forever.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Active,
    Paused,
    /// Draining: stop accepting new audio, wait for buffered audio to be
    /// delivered (or `DRAIN_TIMEOUT` to elapse), then report done.
    Draining,
}

pub enum ClientCommand {
    Pause,
    Resume,
    /// Discard whatever this client has buffered right now.
    Drop,
    /// Block until buffered audio has drained (or the timeout elapses),
    /// then reply on the given channel.
    Drain(oneshot::Sender<()>),
}

/// One playback (fan-in) or capture (fan-out) client slot.
pub struct ClientSlot {
    pub id: u64,
    pub state: ClientState,
    pub commands: mpsc::Receiver<ClientCommand>,
}

pub struct ClientHandle {
    pub id: u64,
    pub commands: mpsc::Sender<ClientCommand>,
}

impl ClientSlot {
    pub fn new(id: u64) -> (ClientSlot, ClientHandle) {
        let (tx, rx) = mpsc::channel(8);
        (
            ClientSlot {
                id,
                state: ClientState::Active,
                commands: rx,
            },
            ClientHandle { id, commands: tx },
        )
    }

    /// Drain any control commands without blocking, applying them to
    /// `self.state`. Returns any pending drain-completion sender so the
    /// caller can reply once the buffer has actually emptied.
    pub fn poll_commands(&mut self) -> Option<oneshot::Sender<()>> {
        let mut pending_drain = None;
        while let Ok(command) = self.commands.try_recv() {
            match command {
                ClientCommand::Pause => self.state = ClientState::Paused,
                ClientCommand::Resume => self.state = ClientState::Active,
                ClientCommand::Drop => self.state = ClientState::Active,
                ClientCommand::Drain(reply) => {
                    self.state = ClientState::Draining;
                    pending_drain = Some(reply);
                }
            }
        }
        pending_drain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_resume_updates_state() {
        let (mut slot, handle) = ClientSlot::new(1);
        handle.commands.send(ClientCommand::Pause).await.unwrap();
        slot.poll_commands();
        assert_eq!(slot.state, ClientState::Paused);

        handle.commands.send(ClientCommand::Resume).await.unwrap();
        slot.poll_commands();
        assert_eq!(slot.state, ClientState::Active);
    }

    #[tokio::test]
    async fn drain_request_surfaces_reply_channel() {
        let (mut slot, handle) = ClientSlot::new(2);
        let (reply_tx, reply_rx) = oneshot::channel();
        handle.commands.send(ClientCommand::Drain(reply_tx)).await.unwrap();

        let pending = slot.poll_commands();
        assert_eq!(slot.state, ClientState::Draining);
        assert!(pending.is_some());
        pending.unwrap().send(()).unwrap();
        reply_rx.await.unwrap();
    }
}
