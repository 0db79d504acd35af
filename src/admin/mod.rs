//! Admin viewer: clan occupancy and participant lists behind a shared secret.

pub mod session;

pub use session::AdminSession;
