#![doc = r#"
bluealsa-core — the per-transport audio I/O engine.

This crate implements the hard real-time part of a BlueALSA-style bridge: for
every active Bluetooth audio transport (A2DP or SCO/eSCO), it runs a pair of
codec worker tasks that translate between raw PCM frames and RTP- or
H2-framed codec bitstreams carried over a Bluetooth `SOCK_SEQPACKET` socket.

# Layered view

```text
 local PCM clients                              BT SEQPACKET socket
        |                                               ^
        v                                               |
   [ mixer (C9) ]  <-- fan-in/out for multi-client  -->  |
        |                                               |
        v                                               |
 [ endpoint (C6) ]  <-- volume/mute/delay/FIFO      -->  |
        |                                               |
        v                                               |
 [ codec worker (C8) ]  <-- encoder or decoder      -->  |
        | builds RTP (C3) or H2 (C4) frames,             |
        | paced by the ASRS clock (C2),                  |
        | staged through FFBs (C1),                      |
        | polled via C5 --------------------------------+
```

[`transport`] owns the lifecycle FSM (C7) and the BT socket; [`manager`]
(C10) spawns/cancels the worker pair per transport; [`codec`] holds the
twelve adapters (C8); [`mixer`] is the optional multi-client fan-in/fan-out
(C9).
"#]

pub mod asrs;
pub mod codec;
pub mod error;
pub mod ffb;
pub mod framing;
pub mod h2;
pub mod io;
pub mod manager;
pub mod mixer;
pub mod rtp;
pub mod transport;

pub use asrs::PacedClock;
pub use error::{CodecError, CoreError, MixerError, TransportError};
pub use ffb::Ffb;
pub use framing::FrameKind;
pub use h2::{H2Header, H2State};
pub use manager::TransportManager;
pub use rtp::{RtpHeader, RtpInboundState, RtpOutboundState};
pub use transport::{Endpoint, Profile, Transport, TransportState};
