//! Generation backend adapters.
//!
//! One trait, [`VideoProvider`], fronts every backend; the rest of the
//! crate is the machinery shared by all of them: the retry executor,
//! the polling loop, seed image preparation, and the error taxonomy.

pub mod adapter;
pub mod error;
pub mod images;
pub mod poll;
pub mod retry;
pub mod sora;
pub mod veo;

pub use adapter::{ensure_handle_owner, nearest_supported, VideoProvider};
pub use error::{is_retryable_text, ProviderError, ProviderResult};
pub use images::{encode_seed_jpeg, seed_to_url};
pub use poll::{poll_until_complete, PollConfig};
pub use retry::{call_with_retry, RetryPolicy};
pub use sora::SoraClient;
pub use veo::VeoClient;
