//! I/O poll primitives (C5) and the BT socket wrapper they read/write.

mod bt_socket;
mod control;
mod poll;

pub use bt_socket::BtSocket;
pub use control::ControlSignal;
pub use poll::{poll_and_read_bt, poll_and_read_pcm, PollCtx, PollOutcome, SignalAction};
