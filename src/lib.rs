//! Signed bearer tokens with session semantics: issue, authenticate, refresh and
//! revoke, under a single-session or multi-session policy, with revocation state kept
//! in a pluggable [`SessionStore`].

pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod guard;
pub mod manager;
pub mod storage;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigLocation, Driver, GuardConfig, read_config};
pub use errors::{Error, ExpiryKind, Result};
pub use events::{ChannelSink, EventSink, LifecycleEvent, NoopSink, TracingSink};
pub use guard::{
    Guard, IssuedToken, MultiSession, SessionPolicy, SessionRecord, SingleSession,
};
pub use manager::TokenManager;
pub use storage::{MemoryStore, NullStore, SessionStore, StoreConfig, StoreStats};
pub use token::{CustomClaims, Payload, TokenCodec, Uid};
