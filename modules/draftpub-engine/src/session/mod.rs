pub mod acquire;
pub mod context;
pub mod observer;

pub use acquire::{ContextSource, CredentialAcquirer, CredentialSource, SCRIPT_HEADER_NAMES};
pub use context::{BrowsingContext, PageGlobals};
pub use observer::{HarObserver, ObservedRequest, RecordingObserver, TrafficObserver};
