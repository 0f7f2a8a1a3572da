//! Accessibility report model.
//!
//! Reports are parsed from the JSON that `axe.run()` resolves with in the
//! page and kept in an append-only list for the lifetime of the panel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw result object resolved by `axe.run()`.
///
/// Field names follow axe-core's camelCase JSON. Only the fields the panel
/// surfaces are modeled; anything else axe adds is ignored on deserialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxeResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub violations: Vec<RuleResult>,

    /// Absent when axe was configured without the `passes` result group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passes: Option<Vec<RuleResult>>,

    /// Absent when axe was configured without the `inapplicable` group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inapplicable: Option<Vec<RuleResult>>,
}

/// Outcome of a single axe rule (violation, pass, or inapplicable).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub help: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub nodes: Vec<CheckedNode>,
}

/// A DOM node inspected by a rule.
///
/// `target` entries are usually CSS selector strings but can be nested
/// arrays for shadow-DOM paths, so they stay as raw JSON values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedNode {
    #[serde(default)]
    pub html: String,

    #[serde(default)]
    pub target: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
}

/// A finished audit, appended to the report list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub violations: Vec<RuleResult>,
    pub passes: Vec<RuleResult>,
    pub inapplicable: Vec<RuleResult>,
}

impl Report {
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            id: self.id,
            timestamp: self.timestamp,
            url: self.url.clone(),
            violation_count: self.violations.len(),
            pass_count: self.passes.len(),
            inapplicable_count: self.inapplicable.len(),
        }
    }
}

/// Lightweight report row for list views and the hello snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub violation_count: usize,
    pub pass_count: usize,
    pub inapplicable_count: usize,
}

/// Ordered, append-only store of audit reports with an optional selection.
///
/// Reports are never removed or reordered. Each audit result appends
/// exactly one entry, which becomes the current selection.
#[derive(Debug, Default)]
pub struct ReportList {
    reports: Vec<Report>,
    selected: Option<u64>,
    next_id: u64,
}

impl ReportList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the outcome of one audit run and select it.
    ///
    /// `fallback_url` is used when axe did not record a URL itself.
    pub fn append(&mut self, fallback_url: &str, results: AxeResults) -> &Report {
        self.next_id += 1;
        let report = Report {
            id: self.next_id,
            timestamp: Utc::now(),
            url: results
                .url
                .unwrap_or_else(|| fallback_url.to_string()),
            violations: results.violations,
            passes: results.passes.unwrap_or_default(),
            inapplicable: results.inapplicable.unwrap_or_default(),
        };
        self.selected = Some(report.id);
        self.reports.push(report);
        &self.reports[self.reports.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Report> {
        self.reports.iter()
    }

    /// Select a report by id. Returns false when no such report exists.
    pub fn select(&mut self, id: u64) -> bool {
        if self.reports.iter().any(|r| r.id == id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn unselect(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<u64> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Report> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Violations of the selected report, pretty-printed for the detail pane.
    pub fn detail(&self) -> Option<String> {
        self.selected()
            .map(|r| serde_json::to_string_pretty(&r.violations).unwrap_or_default())
    }

    pub fn snapshot(&self) -> Vec<ReportSummary> {
        self.reports.iter().map(Report::summary).collect()
    }
}
