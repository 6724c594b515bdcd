//! Plan submission, query, and cancellation handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use llmos_protocol::{Plan, PlanParser, PlanStatus};

use crate::error::ApiError;
use crate::schema::plans::{
    ListPlansQuery, PlanListResponse, PlanResponse, SubmitPlanRequest, SubmitPlanResponse,
};
use crate::state::AppState;

fn parse_submission(raw: &Value) -> Result<Plan, ApiError> {
    let parser = PlanParser::new();
    let plan = match raw {
        Value::String(text) => parser.parse_str(text)?,
        other => parser.parse_value(other.clone())?,
    };
    Ok(plan)
}

/// Submits a plan for execution.
///
/// `POST /plans`
///
/// Async mode returns immediately with `pending`; sync mode blocks up to
/// the configured timeout and returns the terminal projection.
pub async fn submit_plan(
    State(state): State<AppState>,
    Json(body): Json<SubmitPlanRequest>,
) -> Result<(StatusCode, Json<SubmitPlanResponse>), ApiError> {
    if !state.admission.try_admit() {
        return Err(llmos_security::SecurityError::RateLimitExceeded {
            key: "plans.submit".to_string(),
            limit: state.admission.limit(),
            window: "minute".to_string(),
        }
        .into());
    }

    let mut plan = parse_submission(&body.plan)?;
    if plan.plan_id.is_empty() {
        plan.plan_id = uuid::Uuid::new_v4().to_string();
    }

    // Plan ids are unique across the daemon's stored history.
    if state.store.lock().await.get_plan(&plan.plan_id)?.is_some() {
        return Err(ApiError::Conflict(format!(
            "plan '{}' was already submitted",
            plan.plan_id
        )));
    }

    let plan_id = plan.plan_id.clone();
    let token = CancellationToken::new();
    state.running.insert(plan_id.clone(), token.clone());

    let run = {
        let state = state.clone();
        let plan_id = plan_id.clone();
        tokio::spawn(async move {
            let exec_state = state.executor.run(plan, token).await;
            state.running.remove(&plan_id);
            exec_state
        })
    };

    if body.async_execution {
        return Ok((
            StatusCode::ACCEPTED,
            Json(SubmitPlanResponse {
                plan_id: plan_id.clone(),
                status: PlanStatus::Pending,
                message: format!("Plan accepted. Poll GET /plans/{plan_id} for status."),
                actions: None,
                rejection_details: None,
            }),
        ));
    }

    let timeout = state.config.sync_plan_timeout;
    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(exec_state)) => Ok((
            StatusCode::OK,
            Json(SubmitPlanResponse {
                plan_id: exec_state.plan_id.clone(),
                status: exec_state.plan_status,
                message: format!(
                    "Plan finished with status: {}",
                    exec_state.plan_status.as_str()
                ),
                actions: Some(exec_state.actions.into_values().collect()),
                rejection_details: exec_state.rejection_details,
            }),
        )),
        Ok(Err(join_err)) => Err(ApiError::InternalError(format!(
            "plan supervisor task failed: {join_err}"
        ))),
        // The supervisor keeps running; only the wait is abandoned.
        Err(_) => Err(ApiError::GatewayTimeout(format!(
            "synchronous execution timed out after {}s; use async_execution=true",
            timeout.as_secs()
        ))),
    }
}

/// Lists stored plans, newest first.
///
/// `GET /plans`
pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<ListPlansQuery>,
) -> Result<Json<PlanListResponse>, ApiError> {
    let plans = state
        .store
        .lock()
        .await
        .list_plans(query.status, query.limit.clamp(1, 500))?;
    let total = plans.len();
    Ok(Json(PlanListResponse { plans, total }))
}

/// Returns the durable execution-state projection of one plan.
///
/// `GET /plans/{plan_id}`
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanResponse>, ApiError> {
    let exec_state = state
        .store
        .lock()
        .await
        .get_plan(&plan_id)?
        .ok_or_else(|| ApiError::NotFound(format!("plan '{plan_id}' not found")))?;

    Ok(Json(PlanResponse {
        plan_id: exec_state.plan_id,
        status: exec_state.plan_status,
        created_at: exec_state.created_at,
        updated_at: exec_state.updated_at,
        actions: exec_state.actions.into_values().collect(),
        rejection_details: exec_state.rejection_details,
    }))
}

/// Cancels a running plan.
///
/// `DELETE /plans/{plan_id}`
pub async fn cancel_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let stored = state
        .store
        .lock()
        .await
        .get_plan(&plan_id)?
        .ok_or_else(|| ApiError::NotFound(format!("plan '{plan_id}' not found")))?;

    if let Some(entry) = state.running.get(&plan_id) {
        entry.value().cancel();
        tracing::info!(plan_id = %plan_id, "plan cancellation requested");
        return Ok(Json(serde_json::json!({
            "success": true,
            "plan_id": plan_id,
            "cancelling": true,
        })));
    }

    if stored.plan_status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "plan '{plan_id}' already finished with status '{}'",
            stored.plan_status.as_str()
        )));
    }

    // No live supervisor (e.g. daemon restarted mid-plan): settle the
    // stored record directly.
    state
        .store
        .lock()
        .await
        .update_plan_status(&plan_id, PlanStatus::Cancelled)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "plan_id": plan_id,
        "cancelling": false,
    })))
}
