//! Capture fan-out (spec §4.9): one decoded PCM stream delivered to every
//! subscribed client. `tokio::sync::broadcast` gives each client its own
//! lagging-aware receiver without the mixer tracking per-client offsets
//! itself, unlike the teacher's manually-offset-tracked
//! `BufferNode::subscribers` (`pmoaudio::nodes::buffer_node.rs`) — broadcast
//! channels didn't exist as a dependency there, but the crate already pulls
//! in `tokio`'s `sync` feature, so reaching for `broadcast` over
//! reimplementing its bookkeeping is the idiomatic choice here.

use tokio::sync::broadcast;

use super::client::{ClientCommand, ClientSlot, ClientState};

#[derive(Clone)]
pub struct CaptureFrame(pub std::sync::Arc<Vec<i16>>);

pub struct CaptureFanout {
    tx: broadcast::Sender<CaptureFrame>,
}

pub struct CaptureClientHandle {
    pub id: u64,
    pub audio_rx: broadcast::Receiver<CaptureFrame>,
    pub commands: tokio::sync::mpsc::Sender<ClientCommand>,
}

impl CaptureFanout {
    pub fn new(channel_depth: usize) -> Self {
        let (tx, _rx) = broadcast::channel(channel_depth);
        CaptureFanout { tx }
    }

    /// Publish one decoded PCM block to every subscriber. Lagging
    /// subscribers silently drop old frames (broadcast's built-in
    /// behavior) rather than applying backpressure to the decoder.
    pub fn publish(&self, frame: Vec<i16>) {
        let _ = self.tx.send(CaptureFrame(std::sync::Arc::new(frame)));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A capture client's slot: its own broadcast receiver plus the control
/// channel the client uses to pause/resume/drop/drain.
pub struct CaptureClient {
    pub slot: ClientSlot,
    pub audio_rx: broadcast::Receiver<CaptureFrame>,
}

impl CaptureFanout {
    /// Registers a new client and returns its internal slot (polled by the
    /// decoder worker) plus the external handle callers use to send audio
    /// control commands. Each gets its own independent broadcast receiver.
    pub fn add_client(&self, id_source: &mut u64) -> (CaptureClient, CaptureClientHandle) {
        let id = *id_source;
        *id_source += 1;

        let (slot, handle) = ClientSlot::new(id);

        (
            CaptureClient {
                slot,
                audio_rx: self.tx.subscribe(),
            },
            CaptureClientHandle {
                id,
                audio_rx: self.tx.subscribe(),
                commands: handle.commands,
            },
        )
    }
}

impl CaptureClient {
    /// Non-blocking poll: returns the latest frame if this client is
    /// active and one's available.
    pub fn try_recv(&mut self) -> Option<CaptureFrame> {
        self.slot.poll_commands();
        if self.slot.state != ClientState::Active {
            return None;
        }
        match self.audio_rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_frame_reaches_subscriber() {
        let fanout = CaptureFanout::new(8);
        let mut next_id = 0;
        let (mut client, _handle) = fanout.add_client(&mut next_id);

        fanout.publish(vec![1, 2, 3]);
        let frame = client.try_recv().expect("frame should be available");
        assert_eq!(*frame.0, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn paused_client_does_not_receive() {
        let fanout = CaptureFanout::new(8);
        let mut next_id = 0;
        let (mut client, handle) = fanout.add_client(&mut next_id);

        handle.commands.send(ClientCommand::Pause).await.unwrap();
        fanout.publish(vec![9, 9]);
        assert!(client.try_recv().is_none());
    }
}
