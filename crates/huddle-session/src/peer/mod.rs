//! One peer session per remote participant, full mesh.

mod manager;
mod types;

pub use manager::{PeerConnectionManager, PeerNotice};
pub use types::{NegotiationState, PeerSession};
