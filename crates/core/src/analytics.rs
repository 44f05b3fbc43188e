//! Dashboard aggregates computed over retained verdicts.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::signal::SignalCategory;
use crate::verdict::{Severity, Verdict};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    /// Verdicts ever stored, including evicted ones.
    pub total_verdicts: u64,
    /// Verdicts currently retained and covered by the figures below.
    pub retained_verdicts: usize,
    pub subjects_affected: usize,
    pub average_processing_time_ms: f64,
    pub verdicts_requiring_review: usize,
    pub verdicts_by_category: BTreeMap<SignalCategory, usize>,
    pub verdicts_by_severity: BTreeMap<Severity, usize>,
}

impl DashboardMetrics {
    pub fn from_verdicts(total_verdicts: u64, verdicts: &[Verdict]) -> Self {
        let mut by_category: BTreeMap<SignalCategory, usize> =
            SignalCategory::ALL.into_iter().map(|c| (c, 0)).collect();
        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut subjects = HashSet::new();
        let mut review = 0;
        let mut elapsed_sum = 0u64;

        for v in verdicts {
            *by_category.entry(v.signal.category).or_default() += 1;
            *by_severity.entry(v.severity).or_default() += 1;
            subjects.insert(v.signal.subject.as_str());
            if v.needs_review {
                review += 1;
            }
            elapsed_sum += v.total_elapsed_ms;
        }

        let average = if verdicts.is_empty() {
            0.0
        } else {
            elapsed_sum as f64 / verdicts.len() as f64
        };

        Self {
            // The counter can lag the list when verdicts were written while degraded.
            total_verdicts: total_verdicts.max(verdicts.len() as u64),
            retained_verdicts: verdicts.len(),
            subjects_affected: subjects.len(),
            average_processing_time_ms: average,
            verdicts_requiring_review: review,
            verdicts_by_category: by_category,
            verdicts_by_severity: by_severity,
        }
    }
}
