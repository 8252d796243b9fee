pub mod auth;
pub mod session;

pub use auth::AdminUser;
pub use session::{Session, session_middleware};
