//! DigitalOcean API interaction module
//!
//! Token resolution, the HTTP wrapper, the client, and the normalized error
//! shape. Everything above this layer works with `Result<_, ErrorShape>` and
//! never touches reqwest directly.
//!
//! # Module Structure
//!
//! - [`auth`] - API token resolution from parameters or the environment
//! - [`client`] - main client: URL building, pagination, action polling
//! - [`error`] - the uniform `{Message, Status Code, Reason}` error shape
//! - [`http`] - reqwest wrapper for REST calls

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
