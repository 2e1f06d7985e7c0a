/// Record types shared with the CRUD layer
///
/// Checks and users are stored as JSON documents; these types are the typed
/// view the engine works with once a record has passed validation.
pub mod check;
pub mod user;

pub use check::{Check, HttpMethod, Protocol, generate_id};
pub use user::User;
