//! Publishing backend for generated stories.
//!
//! `Publisher` uploads featured images and creates posts; `WordPressPublisher`
//! implements it over the WordPress REST API with per-personality Basic auth.

mod publisher;
mod wordpress;

pub use publisher::{PostPayload, PostStatus, Publisher};
pub use wordpress::{WordPressCredentials, WordPressPublisher};
