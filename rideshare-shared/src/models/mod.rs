pub mod document;
pub mod notification;
pub mod ride;
