pub mod bridge;
pub mod realtime;
pub mod telephony;

pub use bridge::{BridgeSession, BridgeSettings, BridgeState, RegistryError, SessionRegistry};
pub use realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeResult, create_realtime_provider,
};
pub use telephony::{TelephonyError, TwilioIncoming, TwilioOutgoing};
