pub mod auth;

pub use auth::CallerContext;
