//! Approval decision and pending-request handlers.

use axum::extract::{Path, State};
use axum::Json;

use llmos_protocol::now_epoch;

use crate::approval::{ApprovalDecision, ApprovalRequest, ApprovalResponse};
use crate::error::ApiError;
use crate::schema::approvals::{ApprovalDecisionResponse, ApproveActionRequest};
use crate::state::AppState;

/// Resolves a pending approval request.
///
/// `POST /plans/{plan_id}/actions/{action_id}/approve`
pub async fn approve_action(
    State(state): State<AppState>,
    Path((plan_id, action_id)): Path<(String, String)>,
    Json(body): Json<ApproveActionRequest>,
) -> Result<Json<ApprovalDecisionResponse>, ApiError> {
    // Legacy boolean form maps onto approve/reject when no explicit
    // decision string is supplied.
    let decision_str = match (&body.decision, body.approved) {
        (Some(decision), _) => decision.clone(),
        (None, Some(true)) => "approve".to_string(),
        (None, Some(false)) => "reject".to_string(),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "request must carry either 'decision' or 'approved'".to_string(),
            ))
        }
    };

    let decision: ApprovalDecision = decision_str.parse().map_err(|_| {
        ApiError::BadRequest(format!(
            "invalid decision '{decision_str}'; must be one of: approve, reject, skip, \
             modify, approve_always"
        ))
    })?;

    let response = ApprovalResponse {
        decision,
        modified_params: body.modified_params,
        reason: body.reason,
        approved_by: body.approved_by,
        timestamp: now_epoch(),
    };

    let applied = state.gate.submit_decision(&plan_id, &action_id, response);
    if !applied {
        return Err(ApiError::Conflict(format!(
            "action '{action_id}' in plan '{plan_id}' is not pending approval"
        )));
    }

    tracing::info!(
        plan_id = %plan_id,
        action_id = %action_id,
        decision = %decision_str,
        "approval decision submitted"
    );
    Ok(Json(ApprovalDecisionResponse {
        plan_id,
        action_id,
        decision: decision_str,
        applied: true,
    }))
}

/// Lists pending approval requests for one plan.
///
/// `GET /plans/{plan_id}/pending-approvals`
pub async fn pending_approvals(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Json<Vec<ApprovalRequest>> {
    Json(state.gate.get_pending(Some(&plan_id)))
}
