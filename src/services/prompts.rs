//! Prompt builders for every request shape sent to the AI gateway.

use crate::domain::DashboardDocument;
use crate::services::ai_client::{GatewayRequest, ModelTier};

pub const ENGINEER_INSTRUCTION: &str = r#"You are an expert civil engineer specializing in Indian Standard (IS) codes and BOQ (Bill of Quantities) extraction for construction. Provide detailed, accurate, and practical information on construction processes, material specifications, testing procedures, and auditing codes for civil engineering structures in India.

[CITATION MODE]
1. Every engineering claim MUST be backed by an IS Code or NBC 2016 clause, e.g. "Concrete cover should be 20mm (IS 456, Cl. 26.4.2)."
2. If you cannot find the specific text, say: "I cannot find a specific clause for this in the standard codes."
3. For structural advice, append: "Consult a licensed structural engineer."

[BOQ EXTRACTION]
Identify materials, dimensions and specifications; group items by WBS phase (Substructure, Superstructure, MEP); reference IS 1200 for measurement.

[FORMAT]
Answer with Markdown. Use tables for lists, BoQs and schedules. If a question is ambiguous, ask for clarification. End every answer with 3 numbered follow-up options."#;

const DASHBOARD_SCHEMA: &str = r#"{
  "project_summary": {"title": string, "description": string, "type": string, "location"?: string, "total_budget"?: string, "cost_variance"?: string, "safety_score"?: number},
  "kpis": [{"label": string, "value": string|number, "status": "good"|"warning"|"critical"|"neutral", "trend"?: string, "kind"?: "progress"}],
  "wbs": [{"id": string, "name": string, "phase": string, "startDate": string, "endDate": string,
           "status": "Not Started"|"In Progress"|"Completed"|"Delayed", "progress": number,
           "dependencies"?: [string], "is_code_reference": string,
           "compliance_check": "Compliant"|"Non-Compliant"|"Pending Review",
           "quantity_unit"?: string, "total_quantity"?: number, "executed_quantity"?: number,
           "updates"?: [{"id": string, "date": string, "comment": string, "quantity_added": number, "user_name": string}]}],
  "boq_items": [{"item_id": string, "description": string, "unit": string, "estimated_qty": number, "rate"?: number, "amount"?: number, "location_reference": string, "is_code_measurement": string, "notes"?: string}],
  "mep_checklist"?: [{"system": "Plumbing"|"Electrical"|"HVAC"|"Fire", "description": string, "is_code": string, "status": "Design"|"Installed"|"Tested"}],
  "safety_checklist"?: [{"item": string, "is_code": string, "status": "Compliant"|"Missing"|"N/A"}],
  "risk_log": [string]
}"#;

const THREE_D_SCHEMA: &str = r#"{
  "structure_description": string, "estimated_height": string, "key_volumes": [string],
  "camera_recommendations": [{"id": string, "location": string, "type": "Dome"|"Bullet"|"PTZ"|"360", "reason": string, "coverage_area": string}],
  "questions_to_ask": [string]
}"#;

/// Serialize the document for a prompt, without the embedded plan image.
fn document_context(document: &DashboardDocument) -> String {
    let mut context = document.clone();
    context.plan_image = None;
    serde_json::to_string(&context).unwrap_or_else(|_| "{}".to_string())
}

/// (a) Plain-text construction question.
pub fn construction_question(query: &str) -> GatewayRequest {
    GatewayRequest::text(ModelTier::Text)
        .system(ENGINEER_INSTRUCTION)
        .temperature(0.3)
        .prompt(query)
}

/// (b) Full dashboard from an uploaded plan or tender document.
pub fn dashboard_from_file(mime_type: &str, data_base64: &str) -> GatewayRequest {
    GatewayRequest::json(ModelTier::Vision)
        .system(format!(
            "Analyze 2D plans and tenders for structural elements (IS 456, IS 800), finishing, MEP, and safety. \
             Assign every WBS task a unique, stable id. Return valid JSON matching this schema:\n{}",
            DASHBOARD_SCHEMA
        ))
        .prompt("Analyze this plan/tender and generate the IS CODE COMPLIANT project dashboard.")
        .inline(mime_type, data_base64)
}

/// (c) One chat turn against the current dashboard.
pub fn chat_turn(document: &DashboardDocument, message: &str) -> GatewayRequest {
    let location_note = match document.summary.location.as_deref() {
        Some(location) if document.summary.has_location() => {
            format!("The project location is {}.", location.trim())
        }
        _ => "The project location is NOT known. If the request depends on location \
              (seismic zone, wind zone, climate, local bye-laws), ask the user for the location \
              instead of changing the dashboard."
            .to_string(),
    };

    GatewayRequest::json(ModelTier::Text)
        .system(format!(
            "You are the project assistant for a construction dashboard governed by IS codes.\n\
             1. Answer the user conversationally in `responseText`.\n\
             2. If the request changes the plan, return the COMPLETE updated dashboard in `updatedDashboard`; \
                otherwise omit it. Keep every existing task id unchanged and never drop update logs.\n\
             3. If the change would violate a referenced IS code, refuse, cite the clause, and omit `updatedDashboard`.\n\
             4. {}\n\
             Return JSON: {{\"responseText\": string, \"updatedDashboard\"?: dashboard}} where dashboard follows:\n{}",
            location_note, DASHBOARD_SCHEMA
        ))
        .prompt(format!(
            "Current dashboard: {}\n\nUser request: \"{}\"",
            document_context(document),
            message
        ))
}

/// (d) Progress reconciliation from a site photo.
pub fn progress_from_photo(
    document: &DashboardDocument,
    mime_type: &str,
    data_base64: &str,
) -> GatewayRequest {
    GatewayRequest::json(ModelTier::Vision)
        .system(format!(
            "You are an AI construction progress monitor. Compare the site photo with the WBS and update \
             task status and progress. Keep task ids unchanged. Return the complete dashboard as JSON:\n{}",
            DASHBOARD_SCHEMA
        ))
        .prompt(format!(
            "Update progress based on the photo. Current dashboard: {}",
            document_context(document)
        ))
        .inline(mime_type, data_base64)
}

/// (e) 3D massing and camera placement plan.
pub fn three_d_plan(mime_type: &str, data_base64: &str) -> GatewayRequest {
    GatewayRequest::json(ModelTier::Vision)
        .system(format!(
            "Analyze the plan for 3D heights, volumes and CCTV camera placement. Return JSON:\n{}",
            THREE_D_SCHEMA
        ))
        .prompt("Analyze plan for 3D heights and camera placements.")
        .inline(mime_type, data_base64)
}

/// Free-text progress report from a site photo.
pub fn site_photo_report(prompt: &str, mime_type: &str, data_base64: &str) -> GatewayRequest {
    GatewayRequest::text(ModelTier::Vision)
        .system("You are an expert civil engineer analyzing a construction site photo. Provide a concise, professional progress report.")
        .prompt(prompt)
        .inline(mime_type, data_base64)
}

/// Free-text quantity survey of a BOQ or drawing.
pub fn boq_analysis(prompt: &str, mime_type: &str, data_base64: &str) -> GatewayRequest {
    GatewayRequest::text(ModelTier::Vision)
        .system("You are an expert quantity surveyor specializing in Indian construction projects.")
        .prompt(prompt)
        .inline(mime_type, data_base64)
}
