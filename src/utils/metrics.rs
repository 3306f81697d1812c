//! Server observability counters.
//!
//! Thread-safe atomic counters for connection, handshake, message, and
//! moderation events. Each server owns its own [`Metrics`] instance and
//! hands out references; there is no process-global collector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector owned by a server instance.
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently live sessions
    pub connections_active: AtomicU64,
    /// Handshakes attempted
    pub handshakes_total: AtomicU64,
    /// Handshakes that produced a session
    pub handshakes_success: AtomicU64,
    /// Handshakes rejected or timed out
    pub handshakes_failed: AtomicU64,
    /// Messages written to peers
    pub messages_sent: AtomicU64,
    /// Messages read from peers
    pub messages_received: AtomicU64,
    /// Payload bytes written
    pub bytes_sent: AtomicU64,
    /// Payload bytes read
    pub bytes_received: AtomicU64,
    /// Chat messages delivered (per recipient)
    pub chat_delivered: AtomicU64,
    /// Kicks that found a live session
    pub kicks_total: AtomicU64,
    /// Messages dropped for an unregistered DataID
    pub unknown_data_dropped: AtomicU64,
    /// Streams abandoned for malformed bytes
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_total: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            chat_delivered: AtomicU64::new(0),
            kicks_total: AtomicU64::new(0),
            unknown_data_dropped: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
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

    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn chat_delivered(&self, recipient_count: u64) {
        self.chat_delivered.fetch_add(recipient_count, Ordering::Relaxed);
    }

    pub fn kick_recorded(&self) {
        self.kicks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_data(&self) {
        self.unknown_data_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            chat_delivered: self.chat_delivered.load(Ordering::Relaxed),
            kicks_total: self.kicks_total.load(Ordering::Relaxed),
            unknown_data_dropped: self.unknown_data_dropped.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            handshakes_total = snapshot.handshakes_total,
            handshakes_success = snapshot.handshakes_success,
            handshakes_failed = snapshot.handshakes_failed,
            messages_sent = snapshot.messages_sent,
            messages_received = snapshot.messages_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            chat_delivered = snapshot.chat_delivered,
            kicks_total = snapshot.kicks_total,
            unknown_data_dropped = snapshot.unknown_data_dropped,
            protocol_errors = snapshot.protocol_errors,
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

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub chat_delivered: u64,
    pub kicks_total: u64,
    pub unknown_data_dropped: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.connection_established();
        metrics.connection_closed();
        metrics.message_sent(100);
        metrics.message_sent(50);
        metrics.message_received(7);
        metrics.chat_delivered(3);
        metrics.kick_recorded();
        metrics.unknown_data();

        let snap = metrics.snapshot();
        assert_eq!(snap.connections_total, 2);
        assert_eq!(snap.connections_active, 1);
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.bytes_sent, 150);
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.bytes_received, 7);
        assert_eq!(snap.chat_delivered, 3);
        assert_eq!(snap.kicks_total, 1);
        assert_eq!(snap.unknown_data_dropped, 1);
    }

    #[test]
    fn test_independent_instances() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.kick_recorded();
        assert_eq!(a.snapshot().kicks_total, 1);
        assert_eq!(b.snapshot().kicks_total, 0);
    }
}
