//! Bounded retry for units of work that may hit lock contention in the store.
//!
//! Every attempt runs under a timeout. A timed-out attempt is abandoned, which drops (and so rolls back) its
//! transaction. Timeouts are not retried: once an attempt has been abandoned there is no way to tell whether its
//! commit landed, and a second attempt could apply the same mutation twice.
use std::{env, future::Future, time::Duration};

use log::*;
use rand::Rng;
use wallet_common::helpers::parse_numeric_setting;

use crate::traits::WalletError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound on the duration of a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            timeout: DEFAULT_TX_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Reads `WALLET_TX_MAX_ATTEMPTS`, `WALLET_TX_BACKOFF_MS` and `WALLET_TX_TIMEOUT_SECS`, falling back to the
    /// defaults for anything missing or malformed.
    pub fn from_env_or_default() -> Self {
        let (max_attempts, err) = parse_numeric_setting(env::var("WALLET_TX_MAX_ATTEMPTS").ok(), DEFAULT_MAX_ATTEMPTS);
        if let Some(e) = err {
            warn!("🪛️ WALLET_TX_MAX_ATTEMPTS: {e} Using the default, {DEFAULT_MAX_ATTEMPTS}, instead.");
        }
        let default_backoff = DEFAULT_BASE_DELAY.as_millis() as u64;
        let (backoff_ms, err) = parse_numeric_setting(env::var("WALLET_TX_BACKOFF_MS").ok(), default_backoff);
        if let Some(e) = err {
            warn!("🪛️ WALLET_TX_BACKOFF_MS: {e} Using the default, {default_backoff}ms, instead.");
        }
        let default_timeout = DEFAULT_TX_TIMEOUT.as_secs();
        let (timeout_secs, err) = parse_numeric_setting(env::var("WALLET_TX_TIMEOUT_SECS").ok(), default_timeout);
        if let Some(e) = err {
            warn!("🪛️ WALLET_TX_TIMEOUT_SECS: {e} Using the default, {default_timeout}s, instead.");
        }
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(backoff_ms),
            max_delay: DEFAULT_MAX_DELAY,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Exponential backoff before retry number `attempt` (1-based), capped at `max_delay`, with up to 50% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);
        let jitter_ms = delay.as_millis() as u64 / 2;
        let jitter = if jitter_ms > 0 { rand::thread_rng().gen_range(0..=jitter_ms) } else { 0 };
        delay + Duration::from_millis(jitter)
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the attempts in `policy` are used up.
///
/// `op` must build a fresh unit of work on every call.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, WalletError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => {
                error!("🔁️ {label} timed out after {:?}. The unit of work has been rolled back.", policy.timeout);
                return Err(WalletError::StoreTimeout(policy.timeout));
            },
        };
        match result {
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!("🔁️ {label} hit contention on attempt {attempt}/{}: {e}. Retrying in {delay:?}", policy.max_attempts);
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) if e.is_transient() => {
                error!("🔁️ {label} failed after {attempt} attempts: {e}");
                return Err(WalletError::StoreUnavailable { attempts: attempt, reason: e.to_string() });
            },
            other => return other,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retry(&fast_policy(), "test", || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(WalletError::TransientStoreError("database is locked".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = with_retry(&fast_policy().with_max_attempts(2), "test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(WalletError::TransientStoreError("database is locked".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(WalletError::StoreUnavailable { attempts: 2, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = with_retry(&fast_policy(), "test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(WalletError::EmptyCart(1))
            }
        })
        .await;
        assert_eq!(result, Err(WalletError::EmptyCart(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy().with_timeout(Duration::from_millis(20));
        let result: Result<(), _> = with_retry(&policy, "test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .await;
        assert_eq!(result, Err(WalletError::StoreTimeout(Duration::from_millis(20))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy::default();
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(75));
        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(200) && third <= Duration::from_millis(300));
        let capped = policy.backoff(30);
        assert!(capped >= Duration::from_secs(1) && capped <= Duration::from_millis(1500));
    }
}
