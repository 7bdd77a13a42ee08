//! Configuration integration tests

#[cfg(test)]
mod tests {
    use amas_services::{Config, RateLimiter, ServiceError};
    use std::io::Write;

    #[tokio::test]
    async fn test_full_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
rate_limiter:
  key_prefix: "test:rl"
  default_limits:
    requests_per_minute: 10
    requests_per_hour: 100
    requests_per_day: 1000
  identities:
    bot:
      enabled: false
    premium:
      requests_per_minute: 600
      requests_per_hour: 10000
      requests_per_day: 100000
dedup:
  ttl_secs: 10
  linger_ms: 50
redis:
  enabled: false
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).await.unwrap();
        assert_eq!(config.rate_limiter.key_prefix, "test:rl");
        assert_eq!(config.rate_limiter.identities.len(), 2);
        assert_eq!(config.dedup.linger_ms, 50);

        let limiter = RateLimiter::connect(config.rate_limiter, &config.redis)
            .await
            .unwrap();
        assert!(!limiter.get_config("bot").enabled);
        assert_eq!(limiter.get_config("premium").requests_per_minute, 600);
        assert_eq!(limiter.get_config("anyone").requests_per_minute, 10);
        assert!(limiter.check("bot").await.is_unbounded());
    }

    #[test]
    fn test_invalid_sections_are_named() {
        let err = Config::from_yaml("dedup:\n  ttl_secs: 0\n").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
        assert!(err.to_string().contains("Deduplication"));

        let err =
            Config::from_yaml("redis:\n  enabled: true\n  url: \"http://nope\"\n").unwrap_err();
        assert!(err.to_string().contains("Redis"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Config::from_yaml("rate_limiter: [unterminated").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
