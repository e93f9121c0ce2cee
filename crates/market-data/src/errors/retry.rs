/// Whether a provider error may clear up on its own.
///
/// | Class | Retried by the limiter? | Try the next source? |
/// |-------|------------------------|----------------------|
/// | `Transient` | Only when rate-limit-class | Yes |
/// | `Permanent` | No | Yes |
///
/// Fallback happens for both classes; the class tells callers of the strict
/// API whether asking again later is worthwhile.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Rate limiting, timeouts, exhausted retries, an open circuit.
    Transient,
    /// Malformed responses, client errors, unconfigured or unsupported sources.
    Permanent,
}

/// Phrases providers use in error bodies when they throttle a caller.
pub const RATE_LIMIT_PHRASES: &[&str] = &[
    "too many requests",
    "rate limited",
    "rate limit",
    "429",
    "throttled",
    "quota exceeded",
];

/// Case-insensitive match against [`RATE_LIMIT_PHRASES`].
pub fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RATE_LIMIT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
