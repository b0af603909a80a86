use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::ApiError;

/// Number of tracked windows above which expired ones are pruned
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Error, Debug, PartialEq)]
pub enum RateLimitParseError {
    #[error("expected '<count>/<unit>' or '<count> per <unit>'")]
    Format,
    #[error("invalid count '{0}'")]
    Count(String),
    #[error("unknown unit '{0}'")]
    Unit(String),
    #[error("window '{0}' is too long")]
    Window(String),
}

/// A limit of `count` requests per `window`
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitRule {
    count: u32,
    window: Duration,
    raw: String,
}

impl RateLimitRule {
    pub fn new(count: u32, window: Duration) -> Self {
        Self {
            count,
            window,
            raw: format!("{}/{}s", count, window.as_secs()),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit {
        "s" | "sec" | "second" | "seconds" => Some(1),
        "m" | "min" | "minute" | "minutes" => Some(60),
        "h" | "hour" | "hours" => Some(3600),
        "d" | "day" | "days" => Some(86400),
        _ => None,
    }
}

impl FromStr for RateLimitRule {
    type Err = RateLimitParseError;

    /// Parses `10/minute`, `10 per minute` or `10/5 minutes`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let (count, period) = raw
            .split_once('/')
            .or_else(|| raw.split_once(" per "))
            .ok_or(RateLimitParseError::Format)?;

        let count_str = count.trim();
        let count: u32 = count_str
            .parse()
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| RateLimitParseError::Count(count_str.to_string()))?;

        let period = period.trim();
        let (multiplier, unit) = match period.split_once(char::is_whitespace) {
            Some((n, unit)) => {
                let n: u64 = n
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| RateLimitParseError::Count(n.to_string()))?;
                (n, unit.trim())
            }
            None => (1, period),
        };

        let seconds = unit_seconds(unit)
            .ok_or_else(|| RateLimitParseError::Unit(unit.to_string()))?
            .checked_mul(multiplier)
            .ok_or_else(|| RateLimitParseError::Window(period.to_string()))?;

        Ok(Self {
            count,
            window: Duration::from_secs(seconds),
            raw: s.trim().to_string(),
        })
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: u64 },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    length: Duration,
    hits: u32,
}

/// Fixed-window request counter keyed by `(scope, client)`
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit for `client` in `scope` and reports whether it is allowed
    pub fn check(&self, scope: &str, client: &str, rule: &RateLimitRule) -> Decision {
        self.check_at(scope, client, rule, Instant::now())
    }

    pub fn check_at(&self, scope: &str, client: &str, rule: &RateLimitRule, now: Instant) -> Decision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < w.length);
        }

        let window = windows
            .entry((scope.to_string(), client.to_string()))
            .or_insert_with(|| Window {
                started: now,
                length: rule.window,
                hits: 0,
            });

        if now.duration_since(window.started) >= window.length {
            window.started = now;
            window.length = rule.window;
            window.hits = 0;
        }

        if window.hits >= rule.count {
            let elapsed = now.duration_since(window.started);
            let remaining = window.length.saturating_sub(elapsed);
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Decision::Limited {
                retry_after: retry_after.max(1),
            };
        }

        window.hits += 1;
        Decision::Allowed {
            remaining: rule.count - window.hits,
        }
    }

    /// Number of windows currently tracked
    pub fn tracked(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

/// Rate limit configuration attached to one group of routes
#[derive(Clone)]
pub struct RouteLimit {
    pub limiter: Arc<RateLimiter>,
    pub scope: &'static str,
    pub rule: RateLimitRule,
}

/// Address used to identify the caller
///
/// Falls back to `unknown` when the server was not started with connect info,
/// which is the case for in-process tests.
pub fn client_addr(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting requests over the route group's limit with 429
pub async fn enforce_rate_limit(
    State(limit): State<RouteLimit>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_addr(&req);

    match limit.limiter.check(limit.scope, &client, &limit.rule) {
        Decision::Allowed { remaining } => {
            debug!(scope = limit.scope, client = %client, remaining, "Rate limit check passed");
            Ok(next.run(req).await)
        }
        Decision::Limited { retry_after } => {
            warn!(scope = limit.scope, client = %client, limit = %limit.rule, "Rate limit exceeded");
            Err(ApiError::RateLimited {
                retry_after,
                limit: limit.rule.to_string(),
            })
        }
    }
}
