// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Supporting data attached to a step verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Evidence {
    None,
    List(Vec<String>),
    Text(String),
    Verdict(bool),
    Comparison {
        observed: u64,
        expected: u64,
        variance: f64,
    },
}

impl Evidence {
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Evidence::List(items.into_iter().map(|item| item.to_string()).collect())
    }
}

/// The outcome of one numbered provisioning step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub number: u32,
    pub description: String,
    pub verdict: bool,
    pub evidence: Evidence,

    /// Error text of the command or check that failed the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Boot count of the reboot whose state this step read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot: Option<u64>,

    /// Not executed because an earlier step failed under fail-fast
    #[serde(default)]
    pub skipped: bool,
}

impl StepResult {
    pub fn new(number: u32, description: impl Into<String>, verdict: bool, evidence: Evidence) -> Self {
        Self {
            number,
            description: description.into(),
            verdict,
            evidence,
            error: None,
            boot: None,
            skipped: false,
        }
    }

    pub fn failed(number: u32, description: impl Into<String>, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(number, description, false, Evidence::None)
        }
    }

    pub fn skipped(number: u32, description: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(number, description, false, Evidence::None)
        }
    }
}
