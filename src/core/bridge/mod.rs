//! Duplex audio bridge between a Twilio Media Stream and a voice-AI link.
//!
//! - [`state`]: pure per-call state machine (timestamps, marks, barge-in)
//! - [`session`]: async task wiring the state machine to both sockets
//! - [`registry`]: admits calls and tracks live sessions

pub mod registry;
pub mod session;
pub mod state;

pub use registry::{
    BridgeSettings, RealtimeLinkFactory, RegistryError, SessionGuard, SessionInfo,
    SessionRegistry,
};
pub use session::BridgeSession;
pub use state::{BridgeAction, BridgeState};
