//! Resource interaction core
//!
//! The reusable control-flow layer shared by every module: cursor pagination,
//! action polling, and idempotency classification. Everything in here is
//! transport-agnostic: requests are injected as closures, so tests drive
//! these paths without a network.
//!
//! # Module Structure
//!
//! - [`page`] - cursor pagination following `links.pages.next`
//! - [`poll`] - fixed-interval action polling with a wall-clock deadline
//! - [`resolve`] - zero/one/many classification and present/absent decisions

pub mod page;
pub mod poll;
pub mod resolve;

pub use page::{paginate, Page};
pub use poll::{await_terminal, ActionHandle, PollOutcome};
pub use resolve::{
    decide, describe_ambiguous, lookup_path, resolve, Decision, Intent, LookupFilter, MatchOutcome,
};
