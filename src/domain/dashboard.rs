//! Dashboard document domain types
//!
//! The project dashboard is the unit of reconciliation: one document per
//! editing session, replaced wholesale by AI responses and mutated in place by
//! task updates. Field names follow the JSON the AI gateway produces and that
//! stored projects already use, so every optional or list field defaults when
//! absent.

use serde::{Deserialize, Deserializer, Serialize};

/// Full structured project-plan record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardDocument {
    #[serde(rename = "project_summary", default)]
    pub summary: ProjectSummary,

    /// Embedded plan image as a `data:` URL. Only set from the uploaded file.
    #[serde(rename = "plan_base64", default, skip_serializing_if = "Option::is_none")]
    pub plan_image: Option<String>,

    #[serde(default)]
    pub kpis: Vec<Kpi>,

    #[serde(rename = "wbs", default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub boq_items: Vec<BoqItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mep_checklist: Option<Vec<MepItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_checklist: Option<Vec<SafetyItem>>,

    #[serde(default)]
    pub risk_log: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub three_d_analysis: Option<ThreeDAnalysis>,
}

impl DashboardDocument {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Display name used when the document is saved.
    pub fn display_name(&self) -> &str {
        let title = self.summary.title.trim();
        if title.is_empty() {
            "Untitled Project"
        } else {
            title
        }
    }

    /// The KPI that carries overall progress.
    ///
    /// Prefers the explicit `progress` kind; stored documents without the tag
    /// fall back to a case-insensitive "progress" match on the label.
    pub fn progress_kpi_mut(&mut self) -> Option<&mut Kpi> {
        if let Some(idx) = self
            .kpis
            .iter()
            .position(|k| k.kind == Some(KpiKind::Progress))
        {
            return self.kpis.get_mut(idx);
        }
        self.kpis
            .iter_mut()
            .find(|k| k.label.to_lowercase().contains("progress"))
    }

    pub fn progress_kpi(&self) -> Option<&Kpi> {
        self.kpis
            .iter()
            .find(|k| k.kind == Some(KpiKind::Progress))
            .or_else(|| {
                self.kpis
                    .iter()
                    .find(|k| k.label.to_lowercase().contains("progress"))
            })
    }

    /// Rounded mean of every task's progress, `None` without tasks.
    pub fn mean_task_progress(&self) -> Option<u8> {
        if self.tasks.is_empty() {
            return None;
        }
        let sum: u32 = self.tasks.iter().map(|t| u32::from(t.progress)).sum();
        let mean = f64::from(sum) / self.tasks.len() as f64;
        Some(mean.round().clamp(0.0, 100.0) as u8)
    }
}

/// Headline project information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_variance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_score: Option<f64>,
}

impl ProjectSummary {
    pub fn has_location(&self) -> bool {
        self.location
            .as_deref()
            .map(|l| !l.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiStatus {
    Good,
    Warning,
    Critical,
    #[default]
    Neutral,
}

/// Stable identity for KPIs the backend recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiKind {
    Progress,
}

/// KPI values arrive either as numbers or as display text ("45%", "₹12 Cr").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Text(String),
}

impl Default for KpiValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl KpiValue {
    pub fn percent(value: u8) -> Self {
        Self::Text(format!("{}%", value))
    }

    /// Integer percentage, parsing text like `"45%"`.
    pub fn as_percent(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(n.round() as i64),
            Self::Text(s) => s
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .ok()
                .map(|n| n.round() as i64),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: KpiValue,
    #[serde(default)]
    pub status: KpiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<KpiKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Delayed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceState {
    Compliant,
    #[serde(rename = "Non-Compliant")]
    NonCompliant,
    #[default]
    #[serde(rename = "Pending Review")]
    PendingReview,
}

/// One entry in a task's append-only update log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdateLog {
    pub id: String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub quantity_added: f64,
    #[serde(rename = "photo_base64", default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(rename = "user_name", default)]
    pub author: String,
}

/// Schedulable unit of work (WBS task).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phase: String,
    #[serde(rename = "startDate", default)]
    pub start_date: String,
    #[serde(rename = "endDate", default)]
    pub end_date: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,

    #[serde(rename = "is_code_reference", default)]
    pub code_reference: String,
    #[serde(rename = "compliance_check", default)]
    pub compliance: ComplianceState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_quantity: Option<f64>,

    #[serde(rename = "updates", default)]
    pub update_log: Vec<TaskUpdateLog>,
}

impl Task {
    /// Quantity-derived progress, `None` when the task has no usable total.
    pub fn quantity_progress(&self) -> Option<u8> {
        let total = self.total_quantity.filter(|t| *t > 0.0)?;
        let executed = self.executed_quantity.unwrap_or(0.0);
        Some((100.0 * executed / total).round().clamp(0.0, 100.0) as u8)
    }
}

/// Accepts fractional or out-of-range percentages from the gateway.
fn lenient_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

/// Bill-of-quantities line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoqItem {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "estimated_qty", default)]
    pub estimated_quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub location_reference: String,
    #[serde(rename = "is_code_measurement", default)]
    pub measurement_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MepSystem {
    Plumbing,
    Electrical,
    #[serde(rename = "HVAC")]
    Hvac,
    Fire,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MepStatus {
    #[default]
    Design,
    Installed,
    Tested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MepItem {
    pub system: MepSystem,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_code: String,
    #[serde(default)]
    pub status: MepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyStatus {
    Compliant,
    Missing,
    #[serde(rename = "N/A")]
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyItem {
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub is_code: String,
    pub status: SafetyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraType {
    Dome,
    Bullet,
    #[serde(rename = "PTZ")]
    Ptz,
    #[serde(rename = "360")]
    Panoramic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecommendation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub coverage_area: String,
}

/// Result of the one-shot 3D / camera-placement enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreeDAnalysis {
    #[serde(default)]
    pub structure_description: String,
    #[serde(default)]
    pub estimated_height: String,
    #[serde(default)]
    pub key_volumes: Vec<String>,
    #[serde(default)]
    pub camera_recommendations: Vec<CameraRecommendation>,
    #[serde(default)]
    pub questions_to_ask: Vec<String>,
}
