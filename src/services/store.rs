//! Dashboard document store.
//!
//! Holds the single document of one editing session. Every replacement goes
//! through [`reconcile`], which carries forward the fields the AI gateway
//! never produces.

use crate::domain::DashboardDocument;

/// Merge an AI-proposed replacement into the current document.
///
/// Carry-over rules:
/// - `plan_image`: kept from `current` when the candidate has none.
/// - `three_d_analysis`: kept from `current` when the candidate has none.
///
/// Every other field comes from the candidate.
pub fn reconcile(current: &DashboardDocument, mut candidate: DashboardDocument) -> DashboardDocument {
    if candidate.plan_image.is_none() {
        candidate.plan_image = current.plan_image.clone();
    }
    if candidate.three_d_analysis.is_none() {
        candidate.three_d_analysis = current.three_d_analysis.clone();
    }
    candidate
}

#[derive(Debug, Clone, Default)]
pub struct DashboardStore {
    document: Option<DashboardDocument>,
}

impl DashboardStore {
    pub fn new(document: Option<DashboardDocument>) -> Self {
        Self { document }
    }

    pub fn document(&self) -> Option<&DashboardDocument> {
        self.document.as_ref()
    }

    /// Direct mutable access for local, non-AI edits (task updates).
    pub fn document_mut(&mut self) -> Option<&mut DashboardDocument> {
        self.document.as_mut()
    }

    /// Accept a replacement document under the carry-over rules.
    pub fn replace(&mut self, candidate: DashboardDocument) -> &DashboardDocument {
        let merged = match &self.document {
            Some(current) => reconcile(current, candidate),
            None => candidate,
        };
        self.document.insert(merged)
    }

    pub fn clear(&mut self) {
        self.document = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, ThreeDAnalysis};
    use pretty_assertions::assert_eq;

    fn analysis() -> ThreeDAnalysis {
        ThreeDAnalysis {
            structure_description: "G+3 RCC frame".into(),
            estimated_height: "13.5 m".into(),
            ..Default::default()
        }
    }

    #[test]
    fn plan_image_and_analysis_survive_replacement() {
        let mut store = DashboardStore::new(Some(DashboardDocument {
            plan_image: Some("data:image/png;base64,PLAN".into()),
            three_d_analysis: Some(analysis()),
            ..Default::default()
        }));

        let candidate = DashboardDocument {
            tasks: vec![Task {
                id: "T1".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let merged = store.replace(candidate).clone();

        assert_eq!(merged.plan_image.as_deref(), Some("data:image/png;base64,PLAN"));
        assert_eq!(merged.three_d_analysis, Some(analysis()));
        assert_eq!(merged.tasks.len(), 1);
    }

    #[test]
    fn candidate_values_win_when_present() {
        let current = DashboardDocument {
            plan_image: Some("old".into()),
            ..Default::default()
        };
        let candidate = DashboardDocument {
            plan_image: Some("new".into()),
            three_d_analysis: Some(analysis()),
            ..Default::default()
        };

        let merged = reconcile(&current, candidate);

        assert_eq!(merged.plan_image.as_deref(), Some("new"));
        assert!(merged.three_d_analysis.is_some());
    }

    #[test]
    fn other_fields_are_replaced_wholesale() {
        let current = DashboardDocument {
            risk_log: vec!["Monsoon delay".into()],
            ..Default::default()
        };

        let merged = reconcile(&current, DashboardDocument::default());

        assert!(merged.risk_log.is_empty());
    }

    #[test]
    fn replace_on_empty_store_takes_candidate() {
        let mut store = DashboardStore::default();
        assert!(store.document().is_none());

        store.replace(DashboardDocument::default());
        assert!(store.document().is_some());

        store.clear();
        assert!(store.document().is_none());
    }
}
