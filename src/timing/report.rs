// src/timing/report.rs

//! Serializable summary of a finished (or in-flight) run.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::types::{ExecutionPolicy, SparkKey};

use super::TimingRecorder;

#[derive(Debug, Clone, Serialize)]
pub struct SparkTiming {
    pub key: SparkKey,
    pub policy: ExecutionPolicy,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyTiming {
    pub policy: ExecutionPolicy,
    /// Sum of the durations of this policy's sparks.
    pub total_ms: f64,
    /// First start to last stop within this policy.
    pub window_ms: Option<f64>,
}

/// Everything the timing query surface knows, in one value.
#[derive(Debug, Clone, Serialize)]
pub struct TimingReport {
    /// Stopped sparks in the order they started.
    pub sparks: Vec<SparkTiming>,
    pub policies: Vec<PolicyTiming>,
    pub total_ms: f64,
    pub execution_delta_ms: Option<f64>,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl TimingRecorder {
    /// Take a report of everything recorded so far.
    pub fn snapshot(&self) -> TimingReport {
        let sparks = self
            .ordered_durations()
            .into_iter()
            .map(|(key, policy, d)| SparkTiming {
                key,
                policy,
                duration_ms: millis(d),
            })
            .collect();

        let sums = self.sum_of_durations_by_policy();
        let windows = self.execution_delta_by_policy();
        let policies = ExecutionPolicy::ALL
            .iter()
            .filter(|p| sums.contains_key(*p))
            .map(|p| PolicyTiming {
                policy: *p,
                total_ms: millis(sums[p]),
                window_ms: windows.get(p).copied().map(millis),
            })
            .collect();

        TimingReport {
            sparks,
            policies,
            total_ms: millis(self.sum_of_durations()),
            execution_delta_ms: self.execution_delta().map(millis),
        }
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sparks ({}):", self.sparks.len())?;
        for s in &self.sparks {
            writeln!(f, "  - {:<24} {:<9} {:>10.2} ms", s.key, s.policy, s.duration_ms)?;
        }
        writeln!(f, "by policy:")?;
        for p in &self.policies {
            match p.window_ms {
                Some(window) => writeln!(
                    f,
                    "  - {:<9} total {:>10.2} ms  window {:>10.2} ms",
                    p.policy, p.total_ms, window
                )?,
                None => writeln!(f, "  - {:<9} total {:>10.2} ms", p.policy, p.total_ms)?,
            }
        }
        write!(f, "total {:.2} ms", self.total_ms)?;
        if let Some(delta) = self.execution_delta_ms {
            write!(f, ", wall clock {delta:.2} ms")?;
        }
        Ok(())
    }
}
