// tandem_core/src/session.rs

use std::collections::BTreeMap;

use serde::Serialize;

/// One logged value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogSample {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl LogSample {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(x) => Some(*x),
            Self::Vector(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Objective value of a module.
    Objective,
    /// Constraint violation of a module.
    Violation,
    /// Euclidean norm of a module gradient.
    GradientNorm,
    /// Overall NLP quantities (merit, step norm) of one SQP iteration.
    Iteration,
}

impl LogKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Objective => "obj",
            Self::Violation => "inf",
            Self::GradientNorm => "grad",
            Self::Iteration => "iter",
        }
    }
}

/// Diagnostic log of one solve session.
///
/// Keys follow `"{tag}/{kind}_{name}"`, e.g. `opt/1/obj_goal_norm`. Samples are appended in
/// evaluation order, so the last sample of a key doubles as the last computed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionLog {
    entries: BTreeMap<String, Vec<LogSample>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(tag: &str, kind: LogKind, name: &str) -> String {
        format!("{}/{}_{}", tag, kind.prefix(), name)
    }

    pub fn record(&mut self, key: String, sample: LogSample) {
        self.entries.entry(key).or_default().push(sample);
    }

    pub fn record_scalar(&mut self, tag: &str, kind: LogKind, name: &str, value: f64) {
        self.record(Self::key(tag, kind, name), LogSample::Scalar(value));
    }

    pub fn record_vector(&mut self, tag: &str, kind: LogKind, name: &str, values: Vec<f64>) {
        self.record(Self::key(tag, kind, name), LogSample::Vector(values));
    }

    pub fn get(&self, key: &str) -> Option<&[LogSample]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn last(&self, key: &str) -> Option<&LogSample> {
        self.entries.get(key).and_then(|samples| samples.last())
    }

    pub fn last_scalar(&self, tag: &str, kind: LogKind, name: &str) -> Option<f64> {
        self.last(&Self::key(tag, kind, name))
            .and_then(LogSample::as_scalar)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends all samples of `other`, keeping per-key order.
    pub fn merge(&mut self, other: SessionLog) {
        for (key, samples) in other.entries {
            self.entries.entry(key).or_default().extend(samples);
        }
    }

    /// Flushes the log at a session boundary.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_last() {
        let mut log = SessionLog::new();
        log.record_scalar("opt/0", LogKind::Objective, "goal_norm", 3.0);
        log.record_scalar("opt/0", LogKind::Objective, "goal_norm", 2.0);
        assert_eq!(log.last_scalar("opt/0", LogKind::Objective, "goal_norm"), Some(2.0));
        assert_eq!(log.get("opt/0/obj_goal_norm").map(<[LogSample]>::len), Some(2));
        assert_eq!(log.last_scalar("opt/1", LogKind::Objective, "goal_norm"), None);
    }

    #[test]
    fn test_merge_and_reset() {
        let mut a = SessionLog::new();
        a.record_scalar("opt/0", LogKind::Violation, "speed_limits", 0.0);
        let mut b = SessionLog::new();
        b.record_vector("opt/1", LogKind::Iteration, "sqp", vec![1.0, 2.0]);
        a.merge(b);
        assert_eq!(a.len(), 2);
        a.reset();
        assert!(a.is_empty());
    }
}
