use crate::{BrowserPool, HealthLevel, HealthStatus, HealthThresholds, Metrics, ScreenshotService};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{error, info, warn};

pub struct SystemHealthChecker {
    browser_pool: Arc<BrowserPool>,
    service: Arc<ScreenshotService>,
    thresholds: HealthThresholds,
    last_check: Option<Instant>,
}

impl SystemHealthChecker {
    pub fn new(
        browser_pool: Arc<BrowserPool>,
        service: Arc<ScreenshotService>,
        _metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            browser_pool,
            service,
            thresholds: HealthThresholds::default(),
            last_check: None,
        }
    }

    pub async fn check_system_health(&mut self) -> HealthStatus {
        let start_time = Instant::now();

        let browser_health = self.check_browser_pool_health().await;
        let service_health = self.check_service_health().await;
        let resource_health = self.check_resource_health().await;

        let overall_health = self.determine_overall_health(&[
            browser_health.clone(),
            service_health.clone(),
            resource_health.clone(),
        ]);

        let check_duration = start_time.elapsed();
        self.last_check = Some(start_time);

        info!(
            "Health check completed in {:?}: {:?}",
            check_duration, overall_health
        );

        HealthStatus {
            overall: overall_health,
            performance: service_health,
            resources: resource_health,
            errors: browser_health,
            timestamp: std::time::SystemTime::now(),
        }
    }

    async fn check_browser_pool_health(&self) -> HealthLevel {
        let stats = self.browser_pool.get_stats().await;

        // Check if we have enough live browser processes
        if stats.browsers < self.thresholds.min_available_browsers {
            warn!(
                "Browser pool health critical: only {} browsers running",
                stats.browsers
            );
            return HealthLevel::Critical;
        }

        // Check tab concurrency utilization
        let utilization = if stats.max_concurrent_contexts > 0 {
            stats.tabs_in_use as f64 / stats.max_concurrent_contexts as f64
        } else {
            0.0
        };

        if utilization > 0.95 {
            error!(
                "Browser pool health critical: context utilization {:.2}%",
                utilization * 100.0
            );
            return HealthLevel::Critical;
        } else if utilization > 0.8 {
            warn!(
                "Browser pool high utilization: {:.2}%",
                utilization * 100.0
            );
            return HealthLevel::Warning;
        }

        HealthLevel::Healthy
    }

    async fn check_service_health(&self) -> HealthLevel {
        if !self.service.is_available() {
            error!("Service health critical: capture circuit breaker is open");
            return HealthLevel::Critical;
        }
        HealthLevel::Healthy
    }

    async fn check_resource_health(&self) -> HealthLevel {
        // Check memory usage
        if let Ok(memory_usage) = self.get_memory_usage() {
            if memory_usage > self.thresholds.max_memory_usage {
                error!(
                    "Resource health critical: memory usage {} MB",
                    memory_usage / 1024 / 1024
                );
                return HealthLevel::Critical;
            } else if memory_usage > self.thresholds.max_memory_usage * 8 / 10 {
                warn!(
                    "Resource health warning: memory usage {} MB",
                    memory_usage / 1024 / 1024
                );
                return HealthLevel::Warning;
            }
        }

        // Check disk space (simplified)
        if let Ok(disk_usage) = self.get_disk_usage() {
            if disk_usage > 0.95 {
                error!(
                    "Resource health critical: disk usage {:.2}%",
                    disk_usage * 100.0
                );
                return HealthLevel::Critical;
            } else if disk_usage > 0.85 {
                warn!(
                    "Resource health warning: disk usage {:.2}%",
                    disk_usage * 100.0
                );
                return HealthLevel::Warning;
            }
        }

        HealthLevel::Healthy
    }

    fn determine_overall_health(&self, healths: &[HealthLevel]) -> HealthLevel {
        if healths.contains(&HealthLevel::Critical) {
            HealthLevel::Critical
        } else if healths.contains(&HealthLevel::Warning) {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        }
    }

    fn get_memory_usage(&self) -> Result<usize, Box<dyn std::error::Error>> {
        // Try to read from /proc/self/status (Linux)
        if let Ok(content) = std::fs::read_to_string("/proc/self/status") {
            for line in content.lines() {
                if line.starts_with("VmRSS:") {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() >= 2 {
                        if let Ok(kb) = parts[1].parse::<usize>() {
                            return Ok(kb * 1024); // Convert KB to bytes
                        }
                    }
                }
            }
        }

        Ok(0) // Fallback if we can't read memory usage
    }

    fn get_disk_usage(&self) -> Result<f64, Box<dyn std::error::Error>> {
        // This is a simplified disk usage check
        // In a real implementation, you'd use system APIs
        Ok(0.1) // Return 10% as a placeholder
    }

    pub async fn start_periodic_health_checks(&mut self, interval_duration: Duration) {
        let mut interval_timer = interval(interval_duration);

        loop {
            interval_timer.tick().await;

            let health_status = self.check_system_health().await;

            // Log health status
            match health_status.overall {
                HealthLevel::Healthy => {
                    info!("System health: OK");
                }
                HealthLevel::Warning => {
                    warn!(
                        "System health: WARNING - Performance: {:?}, Resources: {:?}, Errors: {:?}",
                        health_status.performance, health_status.resources, health_status.errors
                    );
                }
                HealthLevel::Critical => {
                    error!("System health: CRITICAL - Performance: {:?}, Resources: {:?}, Errors: {:?}",
                           health_status.performance, health_status.resources, health_status.errors);
                }
            }

            // Take corrective actions if needed
            if health_status.overall == HealthLevel::Critical {
                self.handle_critical_health().await;
            }
        }
    }

    async fn handle_critical_health(&self) {
        warn!("Handling critical health status");

        let stats = self.browser_pool.get_stats().await;
        warn!(
            "Browser pool under critical load: {}/{} tabs in use across {} browsers",
            stats.tabs_in_use, stats.max_concurrent_contexts, stats.browsers
        );
        // The pool's own watchdog retires aged-out and crashed browser
        // processes and refills to min_size; there's nothing more to force
        // here beyond logging the condition for operators.
    }
}

pub struct HealthMonitor {
    checker: SystemHealthChecker,
    alerts: Vec<HealthAlert>,
}

impl HealthMonitor {
    pub fn new(
        browser_pool: Arc<BrowserPool>,
        service: Arc<ScreenshotService>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            checker: SystemHealthChecker::new(browser_pool, service, metrics),
            alerts: Vec::new(),
        }
    }

    pub async fn start_monitoring(&mut self, interval: Duration) {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;

            let health_status = self.checker.check_system_health().await;

            // Check for alert conditions
            self.check_alerts(&health_status).await;

            // Clean up old alerts
            self.cleanup_old_alerts();
        }
    }

    async fn check_alerts(&mut self, health_status: &HealthStatus) {
        if health_status.overall == HealthLevel::Critical {
            self.create_alert(AlertType::Critical, "System health is critical".to_string());
        }

        if health_status.resources == HealthLevel::Critical {
            self.create_alert(
                AlertType::ResourceExhaustion,
                "Resource usage is critical".to_string(),
            );
        }

        if health_status.performance == HealthLevel::Critical {
            self.create_alert(
                AlertType::PerformanceDegradation,
                "Performance is critically degraded".to_string(),
            );
        }
    }

    fn create_alert(&mut self, alert_type: AlertType, message: String) {
        let alert = HealthAlert {
            id: uuid::Uuid::new_v4().to_string(),
            alert_type,
            message,
            timestamp: std::time::SystemTime::now(),
            acknowledged: false,
        };

        error!("Health Alert [{}]: {}", alert.alert_type, alert.message);
        self.alerts.push(alert);
    }

    fn cleanup_old_alerts(&mut self) {
        let cutoff = std::time::SystemTime::now() - Duration::from_secs(24 * 60 * 60);
        self.alerts.retain(|alert| alert.timestamp > cutoff);
    }

    pub fn get_active_alerts(&self) -> Vec<&HealthAlert> {
        self.alerts.iter().filter(|a| !a.acknowledged).collect()
    }

    pub fn acknowledge_alert(&mut self, alert_id: &str) {
        if let Some(alert) = self.alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.acknowledged = true;
            info!("Alert {} acknowledged", alert_id);
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthAlert {
    pub id: String,
    pub alert_type: AlertType,
    pub message: String,
    pub timestamp: std::time::SystemTime,
    pub acknowledged: bool,
}

#[derive(Debug, Clone)]
pub enum AlertType {
    Critical,
    ResourceExhaustion,
    PerformanceDegradation,
    BrowserPoolFailure,
    NetworkIssue,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Critical => write!(f, "CRITICAL"),
            AlertType::ResourceExhaustion => write!(f, "RESOURCE_EXHAUSTION"),
            AlertType::PerformanceDegradation => write!(f, "PERFORMANCE_DEGRADATION"),
            AlertType::BrowserPoolFailure => write!(f, "BROWSER_POOL_FAILURE"),
            AlertType::NetworkIssue => write!(f, "NETWORK_ISSUE"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub max_queue_size: usize,
    pub max_error_rate: f64,
    pub max_response_time: Duration,
    pub min_available_browsers: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_error_rate: 0.1, // 10%
            max_response_time: Duration::from_secs(60),
            min_available_browsers: 2,
        }
    }
}

pub struct HealthEndpoint {
    monitor: Arc<tokio::sync::Mutex<HealthMonitor>>,
}

impl HealthEndpoint {
    pub fn new(monitor: HealthMonitor) -> Self {
        Self {
            monitor: Arc::new(tokio::sync::Mutex::new(monitor)),
        }
    }

    pub async fn get_health_status(&self) -> HealthStatus {
        let mut monitor = self.monitor.lock().await;
        monitor.checker.check_system_health().await
    }

    pub async fn get_alerts(&self) -> Vec<HealthAlert> {
        let monitor = self.monitor.lock().await;
        monitor.get_active_alerts().into_iter().cloned().collect()
    }

    pub async fn acknowledge_alert(&self, alert_id: &str) {
        let mut monitor = self.monitor.lock().await;
        monitor.acknowledge_alert(alert_id);
    }
}
