pub mod handlers;
pub mod token;
pub mod users;

pub use token::{TokenError, TokenVerifier};
