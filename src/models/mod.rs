pub mod app_scheme;
pub mod approval;
pub mod collection;
pub mod family;
pub mod loose;
pub mod question;
pub mod timestamp;
