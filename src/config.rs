use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    // Relying party
    pub domain: String,
    pub allowed_origin: Option<String>,

    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,

    // TTLs (in seconds)
    pub nonce_ttl_secs: u64,
    pub session_ttl_secs: u64,

    // Deadline for every store/directory call
    pub store_timeout_ms: u64,

    // Stale sign-in messages
    pub max_message_age_secs: Option<u64>,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,

    // Cookies
    pub cookie_secure: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("domain", &self.domain)
            .field("allowed_origin", &self.allowed_origin)
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("nonce_ttl_secs", &self.nonce_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("max_message_age_secs", &self.max_message_age_secs)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // A .env file is optional; it never overrides variables already set
        let _ = dotenvy::dotenv();

        // Relying party domain - required, host[:port] only
        let domain = env::var("SIWE_DOMAIN")
            .map_err(|_| ConfigError::MissingVar("SIWE_DOMAIN".to_string()))?;
        validate_domain(&domain)?;

        let allowed_origin = env::var("ALLOWED_ORIGIN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(origin) = &allowed_origin {
            validate_origin(origin)?;
        }

        // Redis - required to prevent silent unauthenticated connections
        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        // TTLs
        let nonce_ttl_secs = parse_env_or_default("NONCE_TTL_SECS", 600)?;
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 86_400)?;
        if nonce_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "NONCE_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if session_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let store_timeout_ms = parse_env_or_default("STORE_TIMEOUT_MS", 2_000)?;

        let max_message_age_secs = match env::var("MAX_MESSAGE_AGE_SECS") {
            Ok(val) if !val.trim().is_empty() => Some(val.trim().parse::<u64>().map_err(|e| {
                ConfigError::ParseError(
                    "MAX_MESSAGE_AGE_SECS".to_string(),
                    format!("{}: {}", e, val),
                )
            })?),
            _ => None,
        };

        // Rate limiting
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 20)?;

        let cookie_secure = parse_env_or_default("COOKIE_SECURE", true)?;

        Ok(Config {
            domain,
            allowed_origin,
            redis_url,
            bind_addr,
            nonce_ttl_secs,
            session_ttl_secs,
            store_timeout_ms,
            max_message_age_secs,
            rate_limit_auth_per_min,
            cookie_secure,
        })
    }
}

/// The domain is compared byte-for-byte with the message's domain line,
/// so it must be a bare authority: no scheme, no path, no whitespace.
fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| {
        Err(ConfigError::InvalidValue(
            "SIWE_DOMAIN".to_string(),
            reason.to_string(),
        ))
    };

    if domain.is_empty() {
        return invalid("cannot be empty");
    }
    if domain.contains("://") {
        return invalid("must not include a scheme");
    }
    if domain.contains('/') {
        return invalid("must not include a path or trailing slash");
    }
    if domain.chars().any(char::is_whitespace) {
        return invalid("must not contain whitespace");
    }
    Ok(())
}

/// A CORS origin is `scheme://host[:port]` and must be usable as a header value.
fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| {
        Err(ConfigError::InvalidValue(
            "ALLOWED_ORIGIN".to_string(),
            reason.to_string(),
        ))
    };

    let Some(host) = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
    else {
        return invalid("must start with http:// or https://");
    };
    if host.is_empty() {
        return invalid("missing host");
    }
    if host.contains('/') {
        return invalid("must not include a path or trailing slash");
    }
    if axum::http::HeaderValue::from_str(origin).is_err() {
        return invalid("not a valid header value");
    }
    Ok(())
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests run serially since they modify global env vars.
    // unwrap_or_else handles poison from prior panics.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn lock_test() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_test_env() {
        env::remove_var("SIWE_DOMAIN");
        env::remove_var("ALLOWED_ORIGIN");
        env::remove_var("REDIS_URL");
        env::remove_var("BIND_ADDR");
        env::remove_var("NONCE_TTL_SECS");
        env::remove_var("SESSION_TTL_SECS");
        env::remove_var("STORE_TIMEOUT_MS");
        env::remove_var("MAX_MESSAGE_AGE_SECS");
        env::remove_var("RATE_LIMIT_AUTH_PER_MIN");
        env::remove_var("COOKIE_SECURE");
    }

    fn set_required() {
        env::set_var("SIWE_DOMAIN", "example.com");
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_parse_env_or_default() {
        let _guard = lock_test();

        env::set_var("TEST_U64", "12345");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 12345);

        env::remove_var("TEST_U64");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 100);
    }

    #[test]
    fn test_config_defaults() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        // Override any .env value to ensure a predictable result
        env::set_var("BIND_ADDR", "0.0.0.0:8080");

        let config = Config::from_env().unwrap();

        assert_eq!(config.domain, "example.com");
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.nonce_ttl_secs, 600);
        assert_eq!(config.session_ttl_secs, 86_400);
        assert_eq!(config.store_timeout_ms, 2_000);
        assert_eq!(config.max_message_age_secs, None);
        assert_eq!(config.rate_limit_auth_per_min, 20);
        assert!(config.cookie_secure);

        clear_test_env();
    }

    #[test]
    fn test_missing_domain() {
        let _guard = lock_test();
        clear_test_env();

        // Empty rather than unset, so a .env file cannot fill it in
        env::set_var("SIWE_DOMAIN", "");
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SIWE_DOMAIN"
        ));

        clear_test_env();
    }

    #[test]
    fn test_domain_with_scheme_or_slash() {
        let _guard = lock_test();

        for bad in ["https://example.com", "example.com/", "example.com/login", "exa mple.com"] {
            clear_test_env();
            set_required();
            env::set_var("SIWE_DOMAIN", bad);

            let result = Config::from_env();
            assert!(
                matches!(
                    result,
                    Err(ConfigError::InvalidValue(ref s, _)) if s == "SIWE_DOMAIN"
                ),
                "{} should be rejected",
                bad
            );
        }

        clear_test_env();
    }

    #[test]
    fn test_domain_with_port_is_valid() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("SIWE_DOMAIN", "localhost:3000");

        let config = Config::from_env().unwrap();
        assert_eq!(config.domain, "localhost:3000");

        clear_test_env();
    }

    #[test]
    fn test_invalid_socket_addr() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("BIND_ADDR", "invalid_address");

        let result = Config::from_env();
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_, _)));

        clear_test_env();
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("NONCE_TTL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "NONCE_TTL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_optional_values() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("MAX_MESSAGE_AGE_SECS", "300");
        env::set_var("ALLOWED_ORIGIN", "https://app.example.com");
        env::set_var("COOKIE_SECURE", "false");

        let config = Config::from_env().unwrap();
        assert_eq!(config.max_message_age_secs, Some(300));
        assert_eq!(
            config.allowed_origin.as_deref(),
            Some("https://app.example.com")
        );
        assert!(!config.cookie_secure);

        env::set_var("MAX_MESSAGE_AGE_SECS", "soon");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::ParseError(ref s, _) if s == "MAX_MESSAGE_AGE_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_allowed_origin_rejected() {
        let _guard = lock_test();

        for bad in [
            "app.example.com",
            "https://",
            "https://app.example.com/",
            "https://app.example.com/login",
            "https://app.example.com\u{7f}",
        ] {
            clear_test_env();
            set_required();
            env::set_var("ALLOWED_ORIGIN", bad);

            let result = Config::from_env();
            assert!(
                matches!(
                    result,
                    Err(ConfigError::InvalidValue(ref s, _)) if s == "ALLOWED_ORIGIN"
                ),
                "{:?} should be rejected",
                bad
            );
        }

        clear_test_env();
    }

    #[test]
    fn test_allowed_origin_with_port() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("ALLOWED_ORIGIN", "http://localhost:3000");

        let config = Config::from_env().unwrap();
        assert_eq!(config.allowed_origin.as_deref(), Some("http://localhost:3000"));

        clear_test_env();
    }

    #[test]
    fn test_debug_redacts_redis_url() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("REDIS_URL", "redis://:hunter2@10.0.0.5:6379");

        let config = Config::from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));

        clear_test_env();
    }
}
