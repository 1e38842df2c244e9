//! The HS Client: a typed wrapper over the homeserver's Client-Server +
//! Application-Service HTTP API, grounded on the teacher crate's
//! `matrix::MatrixClient` (bearer-authenticated `reqwest` request helper,
//! JSON error decoding). Narrowed to exactly the operations the distilled
//! spec's §4.1 names, and widened with AppService impersonation
//! (`?user_id=`) which the teacher's client never needed (it authenticated
//! as a single logged-in WeChat puppet, not as an arbitrary namespace of
//! puppets).

pub mod client;
pub mod types;

pub use client::{is_success, HsClient};
pub use types::*;
