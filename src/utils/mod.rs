pub mod http;
pub mod logger;
pub mod serializer;

/// Milliseconds elapsed since `start`, saturating instead of truncating.
pub fn elapsed_ms(start: tokio::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
