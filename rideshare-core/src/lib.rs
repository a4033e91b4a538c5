pub mod clock;
pub mod collaborators;
pub mod identity;
pub mod pin;
pub mod policy;
pub mod repository;

use rideshare_shared::RideStatus;

/// Failures of the storage backend itself, as opposed to business-rule rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything a booking or lifecycle operation can report back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("Ride not found")]
    RideNotFound,

    #[error("You already joined this ride")]
    AlreadyJoined,

    #[error("You have not joined this ride")]
    NotJoined,

    #[error("No seats left for this ride")]
    SoldOut,

    #[error("Ride is {status}, operation not allowed")]
    InvalidState { status: RideStatus },

    #[error("Only the ride owner may do this")]
    NotAuthorized,

    #[error("A cancellation note is required")]
    NoteRequired,

    #[error("Ride is busy, gave up after {attempts} attempts; try again")]
    TransientConflict { attempts: u32 },

    #[error("Invalid ride: {0}")]
    InvalidRide(String),

    #[error("Notification not found")]
    NotificationNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Whether the caller may transparently retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::TransientConflict { .. })
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::RideNotFound => "ride_not_found",
            BookingError::AlreadyJoined => "already_joined",
            BookingError::NotJoined => "not_joined",
            BookingError::SoldOut => "sold_out",
            BookingError::InvalidState { .. } => "invalid_state",
            BookingError::NotAuthorized => "not_authorized",
            BookingError::NoteRequired => "note_required",
            BookingError::TransientConflict { .. } => "transient_conflict",
            BookingError::InvalidRide(_) => "invalid_ride",
            BookingError::NotificationNotFound => "notification_not_found",
            BookingError::Store(_) => "internal",
        }
    }
}

impl From<rideshare_shared::DocumentError> for BookingError {
    fn from(err: rideshare_shared::DocumentError) -> Self {
        BookingError::InvalidRide(err.to_string())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
