//! dostate - declarative state management for DigitalOcean resources
//!
//! Each module applies a present/absent intent to one logical resource:
//! validate parameters, resolve the current state through the paginated API,
//! issue at most one mutation, poll its action when the backend executes it
//! asynchronously, and report a structured changed/unchanged/failed result.
//!
//! # Crate layout
//!
//! - [`digitalocean`] - token auth, HTTP wrapper, client, normalized errors
//! - [`resource`] - pagination, action polling, idempotency classification
//! - [`modules`] - the present/absent modules and read-only info modules
//! - [`inventory`] - dynamic inventory document built from the droplet listing
//! - [`config`] - optional runtime defaults

pub mod config;
pub mod digitalocean;
pub mod inventory;
pub mod modules;
pub mod resource;
