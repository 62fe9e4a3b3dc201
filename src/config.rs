use once_cell::sync::Lazy;

/// Secret key for the billing provider. Optional: when unset (or not shaped
/// like a secret key) the simulated billing client is used instead.
pub static STRIPE_SECRET_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("STRIPE_SECRET_KEY"));

/// Base URL of the billing provider API. Overridable so tests can point the
/// live client at a local mock server.
pub static STRIPE_API_BASE: Lazy<String> = Lazy::new(|| {
    read_optional_env("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string())
});

/// key: billing-config -> currency for newly created prices
pub static BILLING_CURRENCY: Lazy<String> = Lazy::new(|| {
    read_optional_env("BILLING_CURRENCY")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| "usd".to_string())
});

/// key: billing-config -> pause between successive live provider calls
pub static BILLING_SYNC_PACE_MS: Lazy<u64> = Lazy::new(|| {
    std::env::var("BILLING_SYNC_PACE_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(200)
});

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
