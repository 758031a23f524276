//! Telemetry and metrics collection

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use openapi_server::models::{RouteStats, StatsSnapshot, SystemSnapshot};
use sysinfo::System;

/// Counters shared by the monitor loop and the HTTP front-end
#[derive(Debug)]
pub struct MonitorStats {
    start: DateTime<Utc>,
    requests: AtomicU64,
    bytes_in: AtomicU64,
    cycles: AtomicU64,
    detection_errors: AtomicU64,
    jobs_dispatched: AtomicU64,
    deploys_succeeded: AtomicU64,
    deploys_failed: AtomicU64,
    routes: Mutex<BTreeMap<String, RouteStats>>,
    last_cycle_at: Mutex<Option<DateTime<Utc>>>,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            start: Utc::now(),
            requests: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            detection_errors: AtomicU64::new(0),
            jobs_dispatched: AtomicU64::new(0),
            deploys_succeeded: AtomicU64::new(0),
            deploys_failed: AtomicU64::new(0),
            routes: Mutex::new(BTreeMap::new()),
            last_cycle_at: Mutex::new(None),
        }
    }

    /// Count an incoming request against its route
    pub fn record_request(&self, route: &str, bytes_in: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes_in, Ordering::Relaxed);

        let mut routes = lock(&self.routes);
        let entry = routes.entry(route.to_string()).or_default();
        entry.requests += 1;
        entry.bytes_in += bytes_in;
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_cycle_at) = Some(Utc::now());
    }

    pub fn record_detection_error(&self) {
        self.detection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_jobs(&self, count: u64) {
        self.jobs_dispatched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, success: bool) {
        if success {
            self.deploys_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.deploys_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            start: self.start,
            requests: self.requests.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            routes: lock(&self.routes).clone(),
            cycles: self.cycles.load(Ordering::Relaxed),
            detection_errors: self.detection_errors.load(Ordering::Relaxed),
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            deploys_succeeded: self.deploys_succeeded.load(Ordering::Relaxed),
            deploys_failed: self.deploys_failed.load(Ordering::Relaxed),
            last_cycle_at: *lock(&self.last_cycle_at),
        }
    }
}

// Counters stay usable even if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Collect host metrics
pub fn collect_system() -> SystemSnapshot {
    let mut sys = System::new_all();
    sys.refresh_all();

    let memory_used = sys.used_memory();
    let memory_total = sys.total_memory();

    SystemSnapshot {
        cpu_usage: sys.global_cpu_usage(),
        memory_used,
        memory_total,
        memory_percent: if memory_total > 0 {
            (memory_used as f32 / memory_total as f32) * 100.0
        } else {
            0.0
        },
        uptime_secs: System::uptime(),
        cpu_count: sys.cpus().len(),
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
    }
}
