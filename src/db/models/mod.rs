//! Database models split into domain-specific modules.

pub mod invite;
pub mod trip;
pub mod user;
pub mod view;

pub use invite::*;
pub use trip::*;
pub use user::*;
pub use view::*;
