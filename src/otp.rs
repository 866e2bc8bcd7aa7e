//! One-time password ledger keyed by email address.
use std::future::ready;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use rand::Rng;

/// Upper bound on outstanding codes held in memory.
const MAX_OUTSTANDING_CODES: u64 = 100_000;

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Generates a fresh 6-digit code for `identifier`, replacing any
    /// outstanding one.
    async fn issue(&self, identifier: &str) -> String;

    /// Returns true and consumes the code when `candidate` matches. A wrong
    /// candidate leaves the stored code untouched.
    async fn verify(&self, identifier: &str, candidate: &str) -> bool;
}

/// In-process ledger whose entries expire after a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct InMemoryOtpStore {
    codes: Cache<String, String>,
}

impl InMemoryOtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Cache::builder()
                .max_capacity(MAX_OUTSTANDING_CODES)
                .time_to_live(ttl)
                .build(),
        }
    }
}

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn issue(&self, identifier: &str) -> String {
        let code = generate_code();
        self.codes.insert(identifier.to_owned(), code.clone()).await;
        code
    }

    async fn verify(&self, identifier: &str, candidate: &str) -> bool {
        // Compare and remove in one step so a code can only be redeemed once.
        let outcome = self
            .codes
            .entry(identifier.to_owned())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) if entry.value() == candidate => Op::Remove,
                    _ => Op::Nop,
                };
                ready(op)
            })
            .await;

        matches!(outcome, CompResult::Removed(_))
    }
}
