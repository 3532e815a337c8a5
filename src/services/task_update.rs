//! Task update flow.
//!
//! A purely local edit of one task: quantity, status, note and optional photo.
//! It never calls the AI gateway.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::domain::{DashboardDocument, Kpi, KpiKind, KpiStatus, KpiValue, TaskStatus, TaskUpdateLog};
use crate::error::FlowError;
use crate::services::session::EditingSession;

/// User-entered update for one task.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    /// Signed; negative values are corrections and are clamped by the
    /// progress rules.
    pub quantity_delta: f64,
    pub comment: String,
    pub photo: Option<String>,
    pub author: String,
}

/// Apply `update` to the task `task_id`, then recompute the aggregate
/// progress KPI.
pub fn apply_update(
    document: &mut DashboardDocument,
    task_id: &str,
    update: TaskUpdate,
) -> Result<(), FlowError> {
    if !update.quantity_delta.is_finite() {
        return Err(FlowError::Validation(
            "quantity_delta must be a finite number".to_string(),
        ));
    }

    let task = document
        .task_mut(task_id)
        .ok_or_else(|| FlowError::TaskNotFound(task_id.to_string()))?;

    let executed = task.executed_quantity.unwrap_or(0.0) + update.quantity_delta;
    if task.executed_quantity.is_some() || update.quantity_delta != 0.0 {
        task.executed_quantity = Some(executed);
    }

    task.status = update.status;
    task.progress = match task.quantity_progress() {
        Some(progress) => progress,
        None => match update.status {
            TaskStatus::Completed => 100,
            TaskStatus::NotStarted => 0,
            TaskStatus::InProgress | TaskStatus::Delayed => task.progress,
        },
    };

    task.update_log.push(TaskUpdateLog {
        id: Uuid::new_v4().to_string(),
        date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        comment: update.comment,
        quantity_added: update.quantity_delta,
        photo: update.photo,
        author: update.author,
    });

    tracing::debug!(
        task_id = task_id,
        progress = task.progress,
        executed = ?task.executed_quantity,
        "Task updated"
    );

    refresh_progress_kpi(document);
    Ok(())
}

/// Apply `update` to the session's document under the session lock.
pub fn update_task(
    session: &EditingSession,
    task_id: &str,
    update: TaskUpdate,
) -> Result<DashboardDocument, FlowError> {
    let mut state = session.lock_open()?;
    // Checked under the state lock so a replacement cannot snapshot around us.
    if let Some(kind) = session.pending_replacement() {
        return Err(FlowError::Busy(kind));
    }
    let document = state.store.document_mut().ok_or(FlowError::NoDocument)?;
    apply_update(document, task_id, update)?;
    tracing::info!(
        session_id = %session.id(),
        task_id = task_id,
        overall_progress = ?document.progress_kpi().and_then(|k| k.value.as_percent()),
        "Task update applied"
    );
    Ok(document.clone())
}

/// Write the rounded mean task progress into the progress KPI, appending one
/// when the document has none.
pub fn refresh_progress_kpi(document: &mut DashboardDocument) {
    let Some(mean) = document.mean_task_progress() else {
        return;
    };

    match document.progress_kpi_mut() {
        Some(kpi) => kpi.value = KpiValue::percent(mean),
        None => document.kpis.push(Kpi {
            label: "Overall Progress".to_string(),
            value: KpiValue::percent(mean),
            status: KpiStatus::Neutral,
            trend: None,
            kind: Some(KpiKind::Progress),
        }),
    }
}
