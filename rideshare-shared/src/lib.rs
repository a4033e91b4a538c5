pub mod models;
pub mod pii;

pub use models::document::{DocumentError, RideDocument};
pub use models::notification::{Notification, NotificationDraft, NotificationType};
pub use models::ride::{Join, Ride, RideStatus, Vehicle};
pub use pii::Masked;
