//! Job and credit ledger.
//!
//! Backed by a PostgREST endpoint. Job records live in `video_jobs`;
//! credit balances live in `users` and are debited through an atomic
//! stored procedure.

pub mod client;
pub mod credits;
pub mod error;
pub mod jobs;

pub use client::{LedgerClient, LedgerConfig};
pub use credits::CreditsRepository;
pub use error::{LedgerError, LedgerResult};
pub use jobs::JobRepository;
