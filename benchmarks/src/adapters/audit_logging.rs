use crate::adapters::BenchTarget;
use crate::result::BenchmarkResult;
use std::time::Instant;

use supervision_common::canonical::{canonicalize, chain_hash};
use supervision_models::{ActorType, AuditEntry};

/// Benchmark adapter for audit hash-chain append operations, exercising the
/// real canonicalization and chaining functions the audit log uses.
pub struct AuditLoggingBench;

impl BenchTarget for AuditLoggingBench {
    fn id(&self) -> String {
        "audit_logging".to_string()
    }

    fn run(&self) -> BenchmarkResult {
        let start = Instant::now();

        let iterations = 1000;
        let mut last_hash = String::new();

        for i in 0..iterations {
            let action = match i % 5 {
                0 => "policy.evaluate",
                1 => "constraint.check",
                2 => "escalation.resolve",
                3 => "anomaly.detect",
                _ => "audit.query",
            };
            last_hash = append_entry(action, &last_hash);
        }

        let duration = start.elapsed();
        let avg_latency_ms = duration.as_millis() as f64 / iterations as f64;

        BenchmarkResult::new(
            self.id(),
            serde_json::json!({
                "iterations": iterations,
                "total_duration_ms": duration.as_millis(),
                "avg_latency_ms": avg_latency_ms,
                "final_chain_hash_prefix": &last_hash[..8.min(last_hash.len())],
                "throughput_ops_per_sec": (iterations as f64 / duration.as_secs_f64()),
            }),
        )
    }
}

/// Canonicalize and chain one entry the way `AuditLog::log` does, minus the
/// durable-store round trip.
fn append_entry(action: &str, prev_hash: &str) -> String {
    let entry = AuditEntry {
        audit_id: "bench".to_string(),
        action: action.to_string(),
        actor_id: "agent-bench".to_string(),
        actor_type: ActorType::Agent,
        resource_type: "policy".to_string(),
        resource_id: "p-bench".to_string(),
        details: serde_json::json!({}),
        parent_audit_id: None,
        timestamp: chrono::Utc::now(),
        integrity_hash: String::new(),
        signature: None,
        signature_algorithm: None,
    };
    let canonical = canonicalize(&entry);
    chain_hash(prev_hash, &canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_logging_bench() {
        let bench = AuditLoggingBench;
        assert_eq!(bench.id(), "audit_logging");

        let result = bench.run();
        assert_eq!(result.target_id, "audit_logging");

        assert!(result.metrics.get("iterations").is_some());
        assert!(result.metrics.get("final_chain_hash_prefix").is_some());
    }

    #[test]
    fn test_chained_hash_diverges_from_its_own_prefix() {
        let h1 = append_entry("policy.evaluate", "");
        let h2 = append_entry("policy.evaluate", &h1);
        assert_ne!(h1, h2);
    }
}
