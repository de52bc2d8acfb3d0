use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// Reddit's script-app ceiling: one operation per second, no bursts.
    pub fn reddit_script() -> Self {
        Self::min_interval(Duration::from_secs(1))
    }

    /// At most one request per `interval`, strictly serialized.
    pub fn min_interval(interval: Duration) -> Self {
        Self {
            max_requests: 1,
            time_window: interval,
            burst_allowance: 1,
        }
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    tokens: Arc<Mutex<f64>>,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Arc<Mutex<Instant>>,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let window = config.time_window.as_secs_f64();
        let refill_rate = if window > 0.0 {
            config.max_requests as f64 / window
        } else {
            f64::INFINITY
        };

        Self {
            tokens: Arc::new(Mutex::new(capacity)),
            capacity,
            refill_rate,
            last_refill: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;

        // Refill tokens based on elapsed time
        {
            let mut last_refill = self.last_refill.lock().await;
            let elapsed = now.duration_since(*last_refill);
            let tokens_to_add = elapsed.as_secs_f64() * self.refill_rate;

            *tokens = (*tokens + tokens_to_add).min(self.capacity);
            *last_refill = now;
        }

        if *tokens >= tokens_needed {
            *tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - *tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn get_available_tokens(&self) -> f64 {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        let mut last_refill = self.last_refill.lock().await;

        let elapsed = now.duration_since(*last_refill);
        let tokens_to_add = elapsed.as_secs_f64() * self.refill_rate;

        *tokens = (*tokens + tokens_to_add).min(self.capacity);
        *last_refill = now;

        *tokens
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
    permits_issued: Arc<Mutex<u64>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.burst_allowance.max(1) as usize));
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            semaphore,
            config,
            permits_issued: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore should not be closed");

        // Try to acquire token, wait if necessary
        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        *self.permits_issued.lock().await += 1;

        RateLimitPermit {
            _permit,
            queue_wait_time: start_time.elapsed(),
        }
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let available_tokens = self.token_bucket.get_available_tokens().await;
        let permits_issued = *self.permits_issued.lock().await;

        RateLimitStatus {
            available_tokens: available_tokens as u32,
            max_tokens: self.config.burst_allowance,
            requests_per_window: self.config.max_requests,
            window: self.config.time_window,
            permits_issued,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub requests_per_window: u32,
    pub window: Duration,
    pub permits_issued: u64,
}
