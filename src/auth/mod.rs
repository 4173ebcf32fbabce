//! The auth boundary (spec.md §3): just enough to authenticate an HTTP
//! request or a WebSocket upgrade and hand the Dispatcher a user id. Identity
//! management proper (profiles, password reset, etc.) is out of scope.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, JwtIssuer, TokenError, TokenValidator};
