#[cfg(test)]
mod integration_tests {
    use crate::{Config, OutputFormat, Priority, ScreenshotRequest, Viewport};
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.screenshot_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries_regular, 2);
        assert!(matches!(config.output_format, OutputFormat::Png));
    }

    #[test]
    fn test_screenshot_request_default() {
        let request = ScreenshotRequest::default();
        assert!(!request.id.is_empty());
        assert!(request.url.is_empty());
        assert!(matches!(request.priority, Priority::Normal));
        assert!(request.custom_viewport.is_none());
        assert!(request.wait_time.is_none());
        assert!(request.element_selector.is_none());
        assert!(!request.full_page);
        assert_eq!(request.retry_count, 0);
    }

    #[test]
    fn test_viewport_default() {
        let viewport = Viewport::default();
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
        assert_eq!(viewport.device_scale_factor, 1.0);
        assert!(!viewport.mobile);
    }

    #[test]
    fn test_capture_request_defaults() {
        use crate::config::CaptureRequest;
        let request: CaptureRequest =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(request.width, 1280);
        assert_eq!(request.height, 720);
        assert!(request.cache);
    }

    #[test]
    fn test_chrome_args_generation() {
        let config = Config::default();
        let args = crate::get_chrome_args(&config);

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-gpu".to_string()));
        assert!(args.contains(&format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        )));
    }

    #[test]
    fn test_browser_config_creation() {
        let config = Config::default();
        let _browser_config = crate::create_browser_config(&config);
    }

    #[test]
    fn test_error_retryable() {
        use crate::ScreenshotError;

        assert!(ScreenshotError::BrowserUnavailable.is_retryable());
        assert!(ScreenshotError::NetworkError("test".to_string()).is_retryable());
        assert!(ScreenshotError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ScreenshotError::InvalidUrl("test".to_string()).is_retryable());
        assert!(!ScreenshotError::ConfigurationError("test".to_string()).is_retryable());
        assert!(!ScreenshotError::InvalidInput("test".to_string()).is_retryable());
    }

    #[test]
    fn test_error_severity() {
        use crate::{ErrorSeverity, ScreenshotError};

        assert!(matches!(
            ScreenshotError::InvalidUrl("test".to_string()).severity(),
            ErrorSeverity::Low
        ));
        assert!(matches!(
            ScreenshotError::InvalidInput("test".to_string()).severity(),
            ErrorSeverity::Low
        ));
        assert!(matches!(
            ScreenshotError::NetworkError("test".to_string()).severity(),
            ErrorSeverity::Medium
        ));
        assert!(matches!(
            ScreenshotError::ConfigurationError("test".to_string()).severity(),
            ErrorSeverity::High
        ));
        assert!(matches!(
            ScreenshotError::MemoryLimitExceeded.severity(),
            ErrorSeverity::High
        ));
    }

    #[test]
    fn test_circuit_breaker() {
        use crate::CircuitBreaker;

        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(breaker.can_execute());
        assert_eq!(breaker.get_failure_count(), 0);

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert!(!breaker.can_execute());

        breaker.record_success();
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_failure_count(), 0);
    }

    #[test]
    fn test_utils_sanitize_filename() {
        use crate::sanitize_filename;

        assert_eq!(sanitize_filename("test.txt"), "test.txt");
        assert_eq!(sanitize_filename("test/file.txt"), "test_file.txt");
        assert_eq!(sanitize_filename("test:file?.txt"), "test_file_.txt");
        assert_eq!(sanitize_filename("test<>file.txt"), "test__file.txt");
    }

    #[test]
    fn test_utils_format_duration() {
        use crate::format_duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.0s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }

    #[test]
    fn test_utils_format_bytes() {
        use crate::format_bytes;

        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_utils_validate_url() {
        use crate::validate_url;

        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/path?query=value").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("invalid-url").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_utils_extract_domain() {
        use crate::extract_domain;

        assert_eq!(
            extract_domain("https://example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            extract_domain("http://subdomain.example.com"),
            Some("subdomain.example.com".to_string())
        );
        assert_eq!(
            extract_domain("https://example.com:8080/path"),
            Some("example.com".to_string())
        );
        assert_eq!(extract_domain("invalid-url"), None);
        assert_eq!(extract_domain(""), None);
    }

    #[test]
    fn test_utils_is_same_domain() {
        use crate::is_same_domain;

        assert!(is_same_domain(
            "https://example.com/path1",
            "https://example.com/path2"
        ));
        assert!(is_same_domain("http://example.com", "https://example.com"));
        assert!(!is_same_domain("https://example.com", "https://other.com"));
        assert!(!is_same_domain("invalid-url", "https://example.com"));
    }

    #[test]
    fn test_request_interceptor() {
        use crate::RequestInterceptor;

        let interceptor = RequestInterceptor::new();

        assert!(interceptor.should_block("https://googletagmanager.com/script.js", "script"));
        assert!(interceptor.should_block("https://googlesyndication.com/ad.js", "script"));

        assert!(interceptor.should_block("https://example.com/analytics.js", "script"));
        assert!(interceptor.should_block("https://example.com/tracking/pixel.gif", "image"));

        assert!(!interceptor.should_block("https://example.com/main.js", "script"));
        assert!(!interceptor.should_block("https://example.com/style.css", "stylesheet"));
    }

    #[test]
    fn test_memory_monitor() {
        use crate::{MemoryMonitor, MemoryStatus};

        let monitor = MemoryMonitor::new(1024 * 1024);

        assert_eq!(monitor.check_memory(), MemoryStatus::Normal);
        assert_eq!(monitor.get_usage_percentage(), 0.0);

        monitor.update_usage(512 * 1024);
        assert_eq!(monitor.check_memory(), MemoryStatus::Normal);
        assert_eq!(monitor.get_usage_percentage(), 50.0);

        monitor.update_usage(900 * 1024);
        assert_eq!(monitor.check_memory(), MemoryStatus::Warning);

        monitor.update_usage(1100 * 1024);
        assert_eq!(monitor.check_memory(), MemoryStatus::Critical);
    }

    #[test]
    fn test_retry_config() {
        use crate::RetryConfig;

        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.multiplier, 2.0);
    }

    #[test]
    fn test_emergency_policy_default() {
        use crate::config::EmergencyPolicy;
        assert!(matches!(EmergencyPolicy::default(), EmergencyPolicy::OnTimeoutOnly));
    }

    fn test_app_config() -> crate::AppConfig {
        crate::AppConfig {
            capture: Config {
                chrome_path: Some("/usr/sbin/chromium".to_string()),
                max_concurrent_screenshots: 5,
                screenshot_timeout: Duration::from_secs(10),
                ..Default::default()
            },
            browser_pool: crate::config::BrowserPoolConfig {
                min_size: 1,
                max_size: 1,
                ..Default::default()
            },
            transform: crate::config::TransformConfig::default(),
            signer: crate::config::SignerConfig {
                key_hex: "00".repeat(32),
                salt_hex: "00".repeat(32),
                base_url: "http://localhost:8080".to_string(),
            },
            storage: crate::config::StorageConfig {
                backend: crate::config::StorageBackendKind::Local,
                local_dir: std::env::temp_dir().to_string_lossy().to_string(),
                bucket: None,
                endpoint: None,
                region: "auto".to_string(),
                access_key_id: None,
                secret_access_key: None,
                public_base_url: None,
                object_expiration_days: 7,
                use_imgproxy_for_local: false,
            },
            cache: crate::config::CacheConfig::default(),
            admission: crate::config::AdmissionConfig::default(),
            server: crate::config::ServerConfig::default(),
            emergency_policy: crate::config::EmergencyPolicy::default(),
            emergency_context_timeout: Duration::from_secs(15),
        }
    }

    // Integration test helper; retries service creation to ride out Chrome
    // startup flakiness on a loaded test machine.
    async fn create_test_service() -> crate::ScreenshotService {
        let config = test_app_config();

        let mut attempts = 0;
        loop {
            match crate::ScreenshotService::new(&config).await {
                Ok(service) => return service,
                Err(e) if attempts < 3 => {
                    attempts += 1;
                    eprintln!("service creation attempt {attempts} failed: {e:?}, retrying...");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => panic!("failed to create service after {} attempts: {e:?}", attempts + 1),
            }
        }
    }

    #[tokio::test]
    async fn test_service_creation() {
        let service = create_test_service().await;

        let stats = service.browser_pool.get_stats().await;
        assert_eq!(stats.browsers, 1);
        assert_eq!(stats.max_size, 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_single_screenshot() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let service = create_test_service().await;

        let request = ScreenshotRequest {
            url: "https://example.com".to_string(),
            ..Default::default()
        };

        let result = service.screenshot_single(request).await;

        match result {
            Ok(screenshot) => {
                if screenshot.success {
                    assert!(screenshot.path.exists());
                    assert_eq!(screenshot.url, "https://example.com");
                    println!("screenshot test passed");
                } else {
                    eprintln!(
                        "screenshot failed (may be expected in some environments): {:?}",
                        screenshot.error
                    );
                }
            }
            Err(e) => {
                eprintln!("screenshot test failed (expected in some environments): {e:?}");
            }
        }

        service.shutdown().await;
    }
}
