//! Declarative YAML scenarios that drive an [`LruMap`] and check the results.
//!
//! A scenario names a capacity and a list of steps. Each step is one map
//! operation, optionally with the result it is expected to produce:
//!
//! ```yaml
//! name: promotion
//! capacity: 3
//! steps:
//!   - { op: put, key: A, value: 1 }
//!   - { op: put, key: B, value: 2 }
//!   - { op: get, key: A, returns: 1 }
//!   - { op: contains_key, key: Z, expect: false }
//!   - { op: check, order: [A, B] }
//! ```
//!
//! Keys and values are strings; YAML numbers and booleans are accepted and
//! kept in their textual form. A step without a `key` models an absent key:
//! `put` fails with `InvalidArgument`, `get`/`remove` report missing and
//! `contains_key` reports false, none of them touching the map.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScenarioError;
use crate::lru_map::{CacheStats, LruMap};
use crate::{Error, Result};

/// The walkthrough used by `lrumap demo`.
pub const DEMO_SCENARIO: &str = r#"
name: demo
description: "Fill, promote, evict, update"
capacity: 3
steps:
  - { op: put, key: A, value: 1, missing: true }
  - { op: put, key: B, value: 2, missing: true }
  - { op: put, key: C, value: 3, missing: true }
  - { op: check, order: [C, B, A] }
  - { op: get, key: A, returns: 1 }
  - { op: check, order: [A, C, B] }
  - { op: put, key: D, value: 4, missing: true }
  - { op: check, order: [D, A, C] }
  - { op: contains_key, key: B, expect: false }
  - { op: put, key: A, value: 99, returns: 1 }
  - { op: check, order: [A, D, C], render: "[{3/3}{A : 99}, {D : 4}, {C : 3}]" }
"#;

/// A key or value as written in the scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scalar(pub String);

impl Scalar {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(s) => Ok(Self(s)),
            serde_yaml::Value::Number(n) => Ok(Self(n.to_string())),
            serde_yaml::Value::Bool(b) => Ok(Self(b.to_string())),
            other => Err(D::Error::custom(format!(
                "expected a string, number or bool, got {other:?}"
            ))),
        }
    }
}

/// A scenario loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Map capacity; the caller's default applies when omitted.
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One operation against the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Put {
        #[serde(default)]
        key: Option<Scalar>,
        value: Scalar,
        /// Expected previous value.
        #[serde(default)]
        returns: Option<Scalar>,
        /// Expect no previous value.
        #[serde(default)]
        missing: bool,
    },
    Get {
        #[serde(default)]
        key: Option<Scalar>,
        #[serde(default)]
        returns: Option<Scalar>,
        #[serde(default)]
        missing: bool,
    },
    Remove {
        #[serde(default)]
        key: Option<Scalar>,
        #[serde(default)]
        returns: Option<Scalar>,
        #[serde(default)]
        missing: bool,
    },
    ContainsKey {
        #[serde(default)]
        key: Option<Scalar>,
        #[serde(default)]
        expect: Option<bool>,
    },
    ContainsValue {
        value: Scalar,
        #[serde(default)]
        expect: Option<bool>,
    },
    PutAll {
        entries: Vec<(Scalar, Scalar)>,
    },
    Clear,
    /// Assertions on the whole map; every given field must hold.
    Check {
        /// Keys, most-recently used first.
        #[serde(default)]
        order: Option<Vec<Scalar>>,
        /// Values, most-recently used first.
        #[serde(default)]
        values: Option<Vec<Scalar>>,
        /// Pairs, least-recently used first.
        #[serde(default)]
        entries: Option<Vec<(Scalar, Scalar)>>,
        #[serde(default)]
        size: Option<usize>,
        #[serde(default)]
        empty: Option<bool>,
        #[serde(default)]
        render: Option<String>,
    },
}

impl Step {
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Get { .. } => "get",
            Self::Remove { .. } => "remove",
            Self::ContainsKey { .. } => "contains_key",
            Self::ContainsValue { .. } => "contains_value",
            Self::PutAll { .. } => "put_all",
            Self::Clear => "clear",
            Self::Check { .. } => "check",
        }
    }

    fn without_expectations(self) -> Self {
        match self {
            Self::Put { key, value, .. } => Self::Put {
                key,
                value,
                returns: None,
                missing: false,
            },
            Self::Get { key, .. } => Self::Get {
                key,
                returns: None,
                missing: false,
            },
            Self::Remove { key, .. } => Self::Remove {
                key,
                returns: None,
                missing: false,
            },
            Self::ContainsKey { key, .. } => Self::ContainsKey { key, expect: None },
            Self::ContainsValue { value, .. } => Self::ContainsValue {
                value,
                expect: None,
            },
            other => other,
        }
    }

    fn value_expectation(&self) -> Option<(&Option<Scalar>, bool)> {
        match self {
            Self::Put {
                returns, missing, ..
            }
            | Self::Get {
                returns, missing, ..
            }
            | Self::Remove {
                returns, missing, ..
            } => Some((returns, *missing)),
            _ => None,
        }
    }
}

/// An expectation that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// 1-based step number
    pub step: usize,
    pub op: String,
    pub message: String,
}

/// Outcome of running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub capacity: usize,
    pub steps_run: usize,
    pub failures: Vec<StepFailure>,
    /// Final keys, most-recently used first
    pub order: Vec<String>,
    pub rendered: String,
    pub stats: CacheStats,
    pub elapsed_ms: u64,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Scenario {
    /// Load a scenario from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a scenario from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(yaml).map_err(ScenarioError::Parse)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// The built-in walkthrough.
    pub fn demo() -> Result<Self> {
        Self::from_yaml(DEMO_SCENARIO)
    }

    /// The same operations with every expectation removed and `check` steps
    /// dropped, for replaying a scenario at a capacity it was not written for.
    #[must_use]
    pub fn without_expectations(&self) -> Self {
        let steps = self
            .steps
            .iter()
            .filter(|step| !matches!(step, Step::Check { .. }))
            .cloned()
            .map(Step::without_expectations)
            .collect();
        Self {
            steps,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Error {
            ScenarioError::Invalid {
                name: self.name.clone(),
                reason,
            }
            .into()
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.capacity == Some(0) {
            return Err(invalid("capacity must be greater than zero".to_string()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if let Some((Some(_), true)) = step.value_expectation() {
                return Err(invalid(format!(
                    "step {} ({}) sets both `returns` and `missing`",
                    i + 1,
                    step.op_name()
                )));
            }
        }
        Ok(())
    }

    /// Run every step against a fresh map.
    pub fn run(&self, default_capacity: usize) -> Result<ScenarioReport> {
        self.run_with(default_capacity, |_, _, _| {})
    }

    /// Like [`run`](Self::run), calling `observe` after each step with the
    /// 1-based step number, the step, and the map.
    pub fn run_with<F>(&self, default_capacity: usize, mut observe: F) -> Result<ScenarioReport>
    where
        F: FnMut(usize, &Step, &LruMap<String, String>),
    {
        let capacity = self.capacity.unwrap_or(default_capacity);
        let span = tracing::info_span!("scenario", scenario = %self.name, capacity);
        let _guard = span.enter();
        let started = Instant::now();

        let mut map = LruMap::new(capacity)?;
        let mut failures = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            let number = i + 1;
            tracing::debug!(step = number, op = step.op_name(), "executing step");
            if let Some(message) = apply(&mut map, number, step)? {
                tracing::warn!(
                    step = number,
                    op = step.op_name(),
                    message = %message,
                    "expectation failed"
                );
                failures.push(StepFailure {
                    step: number,
                    op: step.op_name().to_string(),
                    message,
                });
            }
            observe(number, step, &map);
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            steps = self.steps.len(),
            failures = failures.len(),
            elapsed_ms,
            "scenario finished"
        );

        Ok(ScenarioReport {
            name: self.name.clone(),
            capacity,
            steps_run: self.steps.len(),
            failures,
            order: map.keys().cloned().collect(),
            rendered: map.to_string(),
            stats: map.stats().clone(),
            elapsed_ms,
        })
    }
}

/// Execute one step. `Ok(Some(_))` describes an unmet expectation.
fn apply(map: &mut LruMap<String, String>, number: usize, step: &Step) -> Result<Option<String>> {
    let outcome = match step {
        Step::Put {
            key,
            value,
            returns,
            missing,
        } => {
            let key = key.as_ref().ok_or_else(|| {
                Error::InvalidArgument(format!("step {number}: put requires a key"))
            })?;
            let previous = map.put(key.0.clone(), value.0.clone());
            check_value(previous.as_deref(), returns.as_ref(), *missing)
        }
        Step::Get {
            key,
            returns,
            missing,
        } => {
            let found = match key {
                Some(k) => map.get(k.as_str()).cloned(),
                None => None,
            };
            check_value(found.as_deref(), returns.as_ref(), *missing)
        }
        Step::Remove {
            key,
            returns,
            missing,
        } => {
            let removed = key.as_ref().and_then(|k| map.remove(k.as_str()));
            check_value(removed.as_deref(), returns.as_ref(), *missing)
        }
        Step::ContainsKey { key, expect } => {
            let found = key.as_ref().is_some_and(|k| map.contains_key(k.as_str()));
            check_bool(found, *expect)
        }
        Step::ContainsValue { value, expect } => {
            let found = map.contains_value(&value.0);
            check_bool(found, *expect)
        }
        Step::PutAll { entries } => {
            map.put_all(entries.iter().map(|(k, v)| (k.0.clone(), v.0.clone())));
            None
        }
        Step::Clear => {
            map.clear();
            None
        }
        Step::Check {
            order,
            values,
            entries,
            size,
            empty,
            render,
        } => check_map(
            map,
            order.as_deref(),
            values.as_deref(),
            entries.as_deref(),
            *size,
            *empty,
            render.as_deref(),
        ),
    };
    Ok(outcome)
}

fn describe(value: Option<&str>) -> String {
    value.map_or_else(|| "missing".to_string(), |v| format!("{v:?}"))
}

fn check_value(actual: Option<&str>, returns: Option<&Scalar>, missing: bool) -> Option<String> {
    match (returns, actual) {
        (Some(want), Some(got)) if want.as_str() == got => None,
        (Some(want), got) => Some(format!(
            "expected {:?}, got {}",
            want.as_str(),
            describe(got)
        )),
        (None, Some(got)) if missing => Some(format!("expected missing, got {got:?}")),
        (None, _) => None,
    }
}

fn check_bool(actual: bool, expect: Option<bool>) -> Option<String> {
    match expect {
        Some(want) if want != actual => Some(format!("expected {want}, got {actual}")),
        _ => None,
    }
}

fn scalars(items: &[Scalar]) -> Vec<&str> {
    items.iter().map(Scalar::as_str).collect()
}

fn check_map(
    map: &LruMap<String, String>,
    order: Option<&[Scalar]>,
    values: Option<&[Scalar]>,
    entries: Option<&[(Scalar, Scalar)]>,
    size: Option<usize>,
    empty: Option<bool>,
    render: Option<&str>,
) -> Option<String> {
    let mut problems = Vec::new();

    if let Some(want) = order {
        let got: Vec<&str> = map.keys().map(String::as_str).collect();
        if got != scalars(want) {
            problems.push(format!("order: expected {:?}, got {got:?}", scalars(want)));
        }
    }
    if let Some(want) = values {
        let got: Vec<&str> = map.values().map(String::as_str).collect();
        if got != scalars(want) {
            problems.push(format!("values: expected {:?}, got {got:?}", scalars(want)));
        }
    }
    if let Some(want) = entries {
        let want: Vec<(&str, &str)> = want.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let got: Vec<(&str, &str)> = map
            .entries()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if got != want {
            problems.push(format!("entries: expected {want:?}, got {got:?}"));
        }
    }
    if let Some(want) = size {
        if map.len() != want {
            problems.push(format!("size: expected {want}, got {}", map.len()));
        }
    }
    if let Some(want) = empty {
        if map.is_empty() != want {
            problems.push(format!("empty: expected {want}, got {}", map.is_empty()));
        }
    }
    if let Some(want) = render {
        let got = map.to_string();
        if got != want {
            problems.push(format!("render: expected {want:?}, got {got:?}"));
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}
