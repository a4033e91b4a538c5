pub mod engine;
pub mod fanout;
pub mod hosting;
pub mod inbox;
pub mod ledger;
pub mod lifecycle;
pub mod retry;
pub mod transaction;
pub mod verification;

pub use engine::{Collaborators, EngineSettings, RideEngine};
pub use fanout::{DispatchMode, FanoutReport, NotificationFanout, RideEvent};
pub use hosting::{RideListing, RosterEntry};
pub use lifecycle::{CancelResult, CompleteResult};
pub use retry::RetryPolicy;
pub use transaction::{JoinResult, LeaveResult};
pub use verification::RiderPin;
