use crate::error::{TelemetryError, TelemetryResult};
use crate::gate::{validate_delta, OperationEvaluation};
use crate::snapshot::{derive_into, next_snapshot, now_millis, MetricSnapshot};
use crate::spec::{MetricKind, MetricSet};
use crate::status::{StatusLabels, SystemStatus};
use crate::threshold::{gate_map, GateOutcome, ThresholdSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Externally supplied definition of one metric domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainConfig {
    pub name: String,
    pub metrics: BTreeMap<String, MetricKind>,
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub labels: StatusLabels,
    /// Fixes the noise stream; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A classified snapshot as handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainReading {
    pub domain: String,
    pub snapshot: MetricSnapshot,
    pub status: SystemStatus,
    pub label: String,
    pub gates: Vec<GateOutcome>,
}

impl DomainReading {
    pub fn gate_map(&self) -> BTreeMap<String, bool> {
        gate_map(&self.gates)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedOperation {
    pub evaluation: OperationEvaluation,
    pub committed: bool,
}

#[derive(Debug)]
struct DomainState {
    last: Option<MetricSnapshot>,
    rng: StdRng,
}

/// Owns the "last snapshot" of one domain behind a single lock.
///
/// Every snapshot handed out is a clone; callers never observe or mutate
/// the stored one.
#[derive(Debug)]
pub struct DomainSimulator {
    name: String,
    metrics: MetricSet,
    thresholds: ThresholdSet,
    labels: StatusLabels,
    state: Mutex<DomainState>,
}

impl DomainSimulator {
    pub fn create(config: DomainConfig) -> TelemetryResult<Self> {
        if config.name.trim().is_empty() {
            return Err(TelemetryError::Configuration(
                "domain name must not be empty".into(),
            ));
        }
        let metrics = MetricSet::new(config.metrics).map_err(|e| scoped(&config.name, e))?;
        config
            .thresholds
            .validate(&metrics)
            .map_err(|e| scoped(&config.name, e))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        debug!(
            domain = %config.name,
            metrics = metrics.len(),
            gates = config.thresholds.gates.len(),
            "domain simulator created"
        );

        Ok(Self {
            name: config.name,
            metrics,
            thresholds: config.thresholds,
            labels: config.labels,
            state: Mutex::new(DomainState { last: None, rng }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    /// Advances every metric one step and stores the result as the new anchor.
    pub fn snapshot(&self) -> DomainReading {
        let (previous, next) = {
            let mut state = self.lock();
            let DomainState { last, rng } = &mut *state;
            let next = next_snapshot(last.as_ref(), &self.metrics, rng, now_millis());
            let previous = last.replace(next.clone());
            (previous, next)
        };

        let reading = self.read(next);
        if let Some(previous) = previous {
            self.log_transition(self.thresholds.classify(&previous), reading.status);
        }
        reading
    }

    /// The stored snapshot, generating the initial one if none exists yet.
    pub fn current(&self) -> MetricSnapshot {
        let mut state = self.lock();
        Self::ensure_current(&mut state, &self.metrics).clone()
    }

    pub fn current_reading(&self) -> DomainReading {
        self.read(self.current())
    }

    pub fn classify(&self, snapshot: &MetricSnapshot) -> SystemStatus {
        self.thresholds.classify(snapshot)
    }

    /// Judges `delta` against the stored snapshot without committing anything.
    pub fn evaluate(&self, delta: &BTreeMap<String, f64>) -> TelemetryResult<OperationEvaluation> {
        validate_delta(&self.metrics, delta)?;
        let current = self.current();
        let evaluation = self
            .thresholds
            .evaluate_operation(&self.metrics, &current, delta)?;
        self.log_verdict(&evaluation, false);
        Ok(evaluation)
    }

    /// Judges `delta` and, when approved, commits the projection as the new
    /// anchor in the same critical section. The committed snapshot is
    /// clamped back into each metric's bounds and its derived metrics are
    /// recomputed.
    pub fn apply(&self, delta: &BTreeMap<String, f64>) -> TelemetryResult<AppliedOperation> {
        validate_delta(&self.metrics, delta)?;
        let applied = {
            let mut state = self.lock();
            let current = Self::ensure_current(&mut state, &self.metrics).clone();
            let evaluation = self
                .thresholds
                .evaluate_operation(&self.metrics, &current, delta)?;
            let committed = evaluation.approved;
            if committed {
                state.last = Some(self.commit_projection(&evaluation.projected));
            }
            AppliedOperation {
                evaluation,
                committed,
            }
        };
        self.log_verdict(&applied.evaluation, applied.committed);
        Ok(applied)
    }

    /// Forgets the stored snapshot; the next call starts again from baseline.
    pub fn reset(&self) {
        self.lock().last = None;
        info!(domain = %self.name, "domain state reset");
    }

    /// Clamps the projected independent values and re-derives the rest, so
    /// the stored anchor always satisfies its formulas.
    fn commit_projection(&self, projected: &MetricSnapshot) -> MetricSnapshot {
        let mut values: BTreeMap<String, f64> = self
            .metrics
            .independent()
            .filter_map(|(name, _)| {
                projected
                    .get(name)
                    .map(|value| (name.to_string(), self.metrics.clamp(name, value)))
            })
            .collect();
        derive_into(&mut values, &self.metrics);
        MetricSnapshot::new(values, projected.timestamp.max(now_millis()))
    }

    fn ensure_current<'a>(state: &'a mut DomainState, metrics: &MetricSet) -> &'a MetricSnapshot {
        let DomainState { last, rng } = state;
        last.get_or_insert_with(|| next_snapshot(None, metrics, rng, now_millis()))
    }

    fn read(&self, snapshot: MetricSnapshot) -> DomainReading {
        let gates = self.thresholds.evaluate(&snapshot);
        let status = SystemStatus::from_outcomes(&gates);
        DomainReading {
            domain: self.name.clone(),
            label: self.labels.label(status).to_string(),
            snapshot,
            status,
            gates,
        }
    }

    fn log_transition(&self, from: SystemStatus, to: SystemStatus) {
        if from == to {
            return;
        }
        if to == SystemStatus::Critical {
            warn!(domain = %self.name, %from, %to, "status transition");
        } else {
            info!(domain = %self.name, %from, %to, "status transition");
        }
    }

    fn log_verdict(&self, evaluation: &OperationEvaluation, committed: bool) {
        if evaluation.approved {
            debug!(domain = %self.name, committed, "operation approved");
        } else {
            info!(domain = %self.name, reason = %evaluation.reason, "operation rejected");
        }
    }

    fn lock(&self) -> MutexGuard<'_, DomainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn scoped(domain: &str, err: TelemetryError) -> TelemetryError {
    match err {
        TelemetryError::Configuration(msg) => {
            TelemetryError::Configuration(format!("domain `{domain}`: {msg}"))
        }
        other => other,
    }
}
