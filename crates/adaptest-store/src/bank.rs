//! JSON question bank import and validation.
//!
//! A bank file is a JSON list of questions. Each file holds one assignment;
//! the file stem is the assignment id.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use adaptest_core::error::StoreError;
use adaptest_core::model::{Choice, Item, ItemRecord};
use adaptest_core::traits::ItemPool;

/// Question ids appear as integers in generated banks and as strings elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BankId {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for BankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankId::Int(i) => write!(f, "{i}"),
            BankId::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One question as written in a bank file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankEntry {
    pub id: BankId,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub param_a: Option<f64>,
    #[serde(default)]
    pub param_b: Option<f64>,
    #[serde(default)]
    pub param_c: Option<f64>,
}

impl BankEntry {
    /// Options become choices labelled `A`, `B`, ... The answer key is dropped.
    pub fn to_record(&self) -> ItemRecord {
        let choices = self
            .options
            .iter()
            .enumerate()
            .map(|(i, text)| Choice {
                id: choice_label(i),
                content: text.clone(),
            })
            .collect();
        ItemRecord {
            id: self.id.to_string(),
            content: self.question.clone(),
            choices,
            param_a: self.param_a,
            param_b: self.param_b,
            param_c: self.param_c,
        }
    }
}

fn choice_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        format!("O{}", index + 1)
    }
}

/// All questions of one assignment.
#[derive(Debug, Clone)]
pub struct AssignmentBank {
    pub assignment_id: String,
    pub entries: Vec<BankEntry>,
}

impl AssignmentBank {
    /// Items with a complete, valid parameter set.
    pub fn eligible_items(&self) -> Vec<Item> {
        self.entries
            .iter()
            .filter_map(|e| Item::from_record(e.to_record(), &self.assignment_id))
            .collect()
    }
}

/// Parse a bank file. The assignment id is the file stem.
pub fn parse_bank(path: &Path) -> Result<AssignmentBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bank file: {}", path.display()))?;
    let assignment_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("bank file has no usable name: {}", path.display()))?;
    parse_bank_str(&content, assignment_id)
        .with_context(|| format!("failed to parse bank: {}", path.display()))
}

/// Parse bank JSON for a given assignment.
pub fn parse_bank_str(content: &str, assignment_id: &str) -> Result<AssignmentBank> {
    let value: serde_json::Value = serde_json::from_str(content).context("invalid JSON")?;
    anyhow::ensure!(value.is_array(), "top-level JSON is not a list");
    let entries: Vec<BankEntry> =
        serde_json::from_value(value).context("bank entries do not match the question schema")?;
    Ok(AssignmentBank {
        assignment_id: assignment_id.to_string(),
        entries,
    })
}

/// Recursively load all `.json` bank files from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<AssignmentBank>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut banks = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
            }
        }
    }
    Ok(banks)
}

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The question is usable but will not be selected adaptively.
    Warning,
    /// The question is malformed.
    Error,
}

/// A finding from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub item_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

/// Validate a bank for common authoring problems.
pub fn validate_bank(bank: &AssignmentBank) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let error = |id: &BankId, message: String| ValidationIssue {
        item_id: Some(id.to_string()),
        severity: Severity::Error,
        message,
    };

    if bank.entries.is_empty() {
        issues.push(ValidationIssue {
            item_id: None,
            severity: Severity::Warning,
            message: "bank has no questions".into(),
        });
    }

    let mut seen = HashSet::new();
    for e in &bank.entries {
        if !seen.insert(&e.id) {
            issues.push(error(&e.id, format!("duplicate id: {}", e.id)));
        }
        if e.question.trim().is_empty() {
            issues.push(error(&e.id, "question is empty".into()));
        }
        if e.options.len() < 2 {
            issues.push(error(&e.id, format!("{} option(s), need at least 2", e.options.len())));
        }
        if !e.options.iter().any(|o| o == &e.answer) {
            issues.push(error(&e.id, "answer is not one of the options".into()));
        }
        if let Some(d) = &e.difficulty {
            if !matches!(d.to_lowercase().as_str(), "easy" | "medium" | "hard") {
                issues.push(error(
                    &e.id,
                    format!("difficulty should be Easy/Medium/Hard, got {d:?}"),
                ));
            }
        }
        if let Some(a) = e.param_a {
            if !(a > 0.0) {
                issues.push(error(&e.id, format!("param_a must be positive, got {a}")));
            }
        }
        if let Some(c) = e.param_c {
            if !(0.0..1.0).contains(&c) {
                issues.push(error(&e.id, format!("param_c must be in [0, 1), got {c}")));
            }
        }

        let missing: Vec<&str> = [
            ("param_a", e.param_a),
            ("param_b", e.param_b),
            ("param_c", e.param_c),
        ]
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            issues.push(ValidationIssue {
                item_id: Some(e.id.to_string()),
                severity: Severity::Warning,
                message: format!(
                    "missing {}; excluded from adaptive selection",
                    missing.join(", ")
                ),
            });
        }
    }

    issues
}

/// Item pool backed by banks loaded into memory.
#[derive(Debug, Default)]
pub struct JsonItemBank {
    assignments: HashMap<String, Vec<Item>>,
}

impl JsonItemBank {
    pub fn from_banks(banks: impl IntoIterator<Item = AssignmentBank>) -> Self {
        let assignments = banks
            .into_iter()
            .map(|bank| {
                let items = bank.eligible_items();
                tracing::debug!(
                    assignment = %bank.assignment_id,
                    eligible = items.len(),
                    total = bank.entries.len(),
                    "loaded bank"
                );
                (bank.assignment_id, items)
            })
            .collect();
        Self { assignments }
    }

    /// Load every bank under `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        Ok(Self::from_banks(load_bank_directory(dir)?))
    }

    /// Assignment ids known to this bank.
    pub fn assignments(&self) -> impl Iterator<Item = &str> {
        self.assignments.keys().map(String::as_str)
    }
}

#[async_trait]
impl ItemPool for JsonItemBank {
    async fn items_for(&self, assignment_id: &str) -> Result<Vec<Item>, StoreError> {
        Ok(self
            .assignments
            .get(assignment_id)
            .cloned()
            .unwrap_or_default())
    }
}
