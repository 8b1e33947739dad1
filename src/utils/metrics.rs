//! Server Metrics
//!
//! Atomic counters describing connection and session activity. One
//! [`Metrics`] instance is shared by the accept loop and every connection
//! task, and logged when the server stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    /// Connections accepted
    pub connections_total: AtomicU64,
    /// Connections currently open
    pub connections_active: AtomicU64,
    /// PASS commands that locked a maildrop
    pub logins_success: AtomicU64,
    /// PASS commands refused
    pub logins_failed: AtomicU64,
    /// Complete lines handed to a session
    pub commands_total: AtomicU64,
    /// `-ERR` replies sent
    pub negative_replies: AtomicU64,
    /// Sessions dropped by the autologout timer
    pub idle_timeouts: AtomicU64,
    /// Accept or socket failures
    pub connection_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            logins_success: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            commands_total: AtomicU64::new(0),
            negative_replies: AtomicU64::new(0),
            idle_timeouts: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    pub fn login_success(&self) {
        self.logins_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one processed command and whether it was refused
    pub fn command(&self, positive: bool) {
        self.commands_total.fetch_add(1, Ordering::Relaxed);
        if !positive {
            self.negative_replies.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn idle_timeout(&self) {
        self.idle_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            logins_success: self.logins_success.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            commands_total: self.commands_total.load(Ordering::Relaxed),
            negative_replies: self.negative_replies.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            logins_success = snapshot.logins_success,
            logins_failed = snapshot.logins_failed,
            commands_total = snapshot.commands_total,
            negative_replies = snapshot.negative_replies,
            idle_timeouts = snapshot.idle_timeouts,
            connection_errors = snapshot.connection_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Server metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub logins_success: u64,
    pub logins_failed: u64,
    pub commands_total: u64,
    pub negative_replies: u64,
    pub idle_timeouts: u64,
    pub connection_errors: u64,
    pub uptime_seconds: u64,
}
