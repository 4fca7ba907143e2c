pub mod controller;
pub mod error;
pub mod events;
pub mod publish;
pub mod report;
pub mod scan;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use controller::{Run, RunController, RunOutcome, RunSignal};
pub use error::{Result, RunError};
pub use events::{ChannelObserver, RunEvent, RunObserver, StoreObserver};
