/// Server-rendered HTML pages
///
/// Pages are plain `format!` templates around a shared Bootstrap layout.
/// Every interpolated value that did not originate in this module goes
/// through [`escape`].

pub mod admin;
pub mod auth;
pub mod events;
pub mod layout;
pub mod members;

pub use layout::{escape, PageContext};
