//! SQLite implementation of [`StateStore`].
//!
//! [`SqliteStore`] persists execution state in a SQLite database with WAL
//! mode, transactions on every multi-row write, and automatic schema
//! migrations. Complex values (results, approval metadata, rejection
//! details) are stored as JSON TEXT columns via serde_json.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use llmos_protocol::{now_epoch, ActionState, ExecutionState, PlanStatus};
use llmos_security::{PermissionGrant, PermissionScope};

use crate::error::StateError;
use crate::traits::StateStore;
use crate::types::PlanSummary;

/// SQLite-backed implementation of [`StateStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StateError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StateError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn parse_plan_status(s: &str) -> Result<PlanStatus, StateError> {
        s.parse().map_err(|reason| StateError::Integrity { reason })
    }

    fn row_to_action(row: &rusqlite::Row<'_>) -> Result<ActionState, rusqlite::Error> {
        let status: String = row.get(1)?;
        let result: Option<String> = row.get(6)?;
        let approval: Option<String> = row.get(9)?;
        Ok(ActionState {
            action_id: row.get(0)?,
            status: status.parse().unwrap_or(llmos_protocol::ActionStatus::Pending),
            module: row.get(2)?,
            action: row.get(3)?,
            started_at: row.get(4)?,
            finished_at: row.get(5)?,
            result: result.and_then(|text| serde_json::from_str(&text).ok()),
            error: row.get(7)?,
            attempt: row.get(8)?,
            approval_metadata: approval.and_then(|text| serde_json::from_str(&text).ok()),
        })
    }

    fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<(String, String, f64, f64), rusqlite::Error> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn row_to_grant(row: &rusqlite::Row<'_>) -> Result<PermissionGrant, rusqlite::Error> {
        let scope: String = row.get(2)?;
        Ok(PermissionGrant {
            permission: row.get(0)?,
            module_id: row.get(1)?,
            scope: scope.parse().unwrap_or(PermissionScope::Session),
            granted_at: row.get(3)?,
            granted_by: row.get(4)?,
            reason: row.get(5)?,
            expires_at: row.get(6)?,
        })
    }
}

impl StateStore for SqliteStore {
    fn create_plan(&mut self, state: &ExecutionState) -> Result<(), StateError> {
        let data = match &state.rejection_details {
            Some(details) => serde_json::to_string(&serde_json::json!({
                "rejection_details": details
            }))?,
            None => "{}".to_string(),
        };

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO plans (plan_id, status, created_at, updated_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                state.plan_id,
                state.plan_status.as_str(),
                state.created_at,
                state.updated_at,
                data
            ],
        )?;
        for action in state.actions.values() {
            tx.execute(
                "INSERT INTO actions (plan_id, action_id, status, module, action, attempt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    state.plan_id,
                    action.action_id,
                    action.status.as_str(),
                    action.module,
                    action.action,
                    action.attempt
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_plan_status(&mut self, plan_id: &str, status: PlanStatus) -> Result<(), StateError> {
        let changed = self.conn.execute(
            "UPDATE plans SET status = ?1, updated_at = ?2 WHERE plan_id = ?3",
            params![status.as_str(), now_epoch(), plan_id],
        )?;
        if changed == 0 {
            return Err(StateError::PlanNotFound(plan_id.to_string()));
        }
        Ok(())
    }

    fn set_rejection_details(&mut self, plan_id: &str, details: &Value) -> Result<(), StateError> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM plans WHERE plan_id = ?1",
                params![plan_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Err(StateError::PlanNotFound(plan_id.to_string()));
        };

        let mut data: Value =
            serde_json::from_str(&current).unwrap_or_else(|_| serde_json::json!({}));
        data["rejection_details"] = details.clone();

        self.conn.execute(
            "UPDATE plans SET data = ?1, updated_at = ?2 WHERE plan_id = ?3",
            params![serde_json::to_string(&data)?, now_epoch(), plan_id],
        )?;
        Ok(())
    }

    fn update_action(&mut self, plan_id: &str, action: &ActionState) -> Result<(), StateError> {
        let result = action
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let approval = action
            .approval_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let changed = self.conn.execute(
            "UPDATE actions
             SET status = ?1, started_at = ?2, finished_at = ?3, result = ?4,
                 error = ?5, attempt = ?6, approval_metadata = ?7
             WHERE plan_id = ?8 AND action_id = ?9",
            params![
                action.status.as_str(),
                action.started_at,
                action.finished_at,
                result,
                action.error,
                action.attempt,
                approval,
                plan_id,
                action.action_id
            ],
        )?;
        if changed == 0 {
            return Err(StateError::ActionNotFound {
                plan_id: plan_id.to_string(),
                action_id: action.action_id.clone(),
            });
        }

        self.conn.execute(
            "UPDATE plans SET updated_at = ?1 WHERE plan_id = ?2",
            params![now_epoch(), plan_id],
        )?;
        Ok(())
    }

    fn get_plan(&self, plan_id: &str) -> Result<Option<ExecutionState>, StateError> {
        let plan_row: Option<(String, f64, f64, String)> = self
            .conn
            .query_row(
                "SELECT status, created_at, updated_at, data FROM plans WHERE plan_id = ?1",
                params![plan_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((status, created_at, updated_at, data)) = plan_row else {
            return Ok(None);
        };

        let rejection_details = serde_json::from_str::<Value>(&data)
            .ok()
            .and_then(|d| d.get("rejection_details").cloned())
            .filter(|d| !d.is_null());

        let mut state = ExecutionState {
            plan_id: plan_id.to_string(),
            plan_status: Self::parse_plan_status(&status)?,
            created_at,
            updated_at,
            actions: Default::default(),
            rejection_details,
        };

        let mut stmt = self.conn.prepare(
            "SELECT action_id, status, module, action, started_at, finished_at,
                    result, error, attempt, approval_metadata
             FROM actions WHERE plan_id = ?1 ORDER BY rowid",
        )?;
        let actions = stmt.query_map(params![plan_id], Self::row_to_action)?;
        for action in actions {
            let action = action?;
            state.actions.insert(action.action_id.clone(), action);
        }

        Ok(Some(state))
    }

    fn list_plans(
        &self,
        status: Option<PlanStatus>,
        limit: usize,
    ) -> Result<Vec<PlanSummary>, StateError> {
        let rows: Vec<(String, String, f64, f64)> = match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(
                    "SELECT plan_id, status, created_at, updated_at FROM plans
                     WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
                )?;
                let mapped =
                    stmt.query_map(params![status.as_str(), limit as i64], Self::row_to_summary)?;
                mapped.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT plan_id, status, created_at, updated_at FROM plans
                     ORDER BY created_at DESC LIMIT ?1",
                )?;
                let mapped = stmt.query_map(params![limit as i64], Self::row_to_summary)?;
                mapped.collect::<Result<_, _>>()?
            }
        };

        rows.into_iter()
            .map(|(plan_id, status, created_at, updated_at)| {
                Ok(PlanSummary {
                    plan_id,
                    status: Self::parse_plan_status(&status)?,
                    created_at,
                    updated_at,
                })
            })
            .collect()
    }

    fn purge_terminal_older_than(&mut self, max_age_seconds: f64) -> Result<usize, StateError> {
        let cutoff = now_epoch() - max_age_seconds;
        let tx = self.conn.transaction()?;
        // Child rows first; ON DELETE CASCADE would handle this but
        // explicit deletes keep the ordering visible.
        tx.execute(
            "DELETE FROM actions WHERE plan_id IN (
                 SELECT plan_id FROM plans
                 WHERE status IN ('completed', 'failed', 'cancelled') AND updated_at < ?1
             )",
            params![cutoff],
        )?;
        let purged = tx.execute(
            "DELETE FROM plans
             WHERE status IN ('completed', 'failed', 'cancelled') AND updated_at < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        Ok(purged)
    }

    // -----------------------------------------------------------------------
    // Permission grants
    // -----------------------------------------------------------------------

    fn upsert_grant(&mut self, grant: &PermissionGrant) -> Result<(), StateError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO permission_grants
             (permission, module_id, scope, granted_at, granted_by, reason, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                grant.permission,
                grant.module_id,
                grant.scope.as_str(),
                grant.granted_at,
                grant.granted_by,
                grant.reason,
                grant.expires_at
            ],
        )?;
        Ok(())
    }

    fn revoke_grant(&mut self, permission: &str, module_id: &str) -> Result<bool, StateError> {
        let deleted = self.conn.execute(
            "DELETE FROM permission_grants WHERE permission = ?1 AND module_id = ?2",
            params![permission, module_id],
        )?;
        Ok(deleted > 0)
    }

    fn revoke_all_for_module(&mut self, module_id: &str) -> Result<usize, StateError> {
        let deleted = self.conn.execute(
            "DELETE FROM permission_grants WHERE module_id = ?1",
            params![module_id],
        )?;
        Ok(deleted)
    }

    fn clear_session_grants(&mut self) -> Result<usize, StateError> {
        let cleared = self.conn.execute(
            "DELETE FROM permission_grants WHERE scope = ?1",
            params![PermissionScope::Session.as_str()],
        )?;
        Ok(cleared)
    }

    fn get_grant(
        &mut self,
        permission: &str,
        module_id: &str,
    ) -> Result<Option<PermissionGrant>, StateError> {
        let grant = self
            .conn
            .query_row(
                "SELECT permission, module_id, scope, granted_at, granted_by, reason, expires_at
                 FROM permission_grants WHERE permission = ?1 AND module_id = ?2",
                params![permission, module_id],
                Self::row_to_grant,
            )
            .optional()?;

        match grant {
            Some(grant) if grant.is_expired() => {
                // Lazy cleanup.
                self.revoke_grant(permission, module_id)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn list_grants(&mut self, module_id: Option<&str>) -> Result<Vec<PermissionGrant>, StateError> {
        let all: Vec<PermissionGrant> = match module_id {
            Some(module_id) => {
                let mut stmt = self.conn.prepare(
                    "SELECT permission, module_id, scope, granted_at, granted_by, reason, expires_at
                     FROM permission_grants WHERE module_id = ?1 ORDER BY granted_at DESC",
                )?;
                let mapped = stmt.query_map(params![module_id], Self::row_to_grant)?;
                mapped.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT permission, module_id, scope, granted_at, granted_by, reason, expires_at
                     FROM permission_grants ORDER BY granted_at DESC",
                )?;
                let mapped = stmt.query_map([], Self::row_to_grant)?;
                mapped.collect::<Result<_, _>>()?
            }
        };

        let (expired, live): (Vec<_>, Vec<_>) = all.into_iter().partition(|g| g.is_expired());
        for grant in &expired {
            self.revoke_grant(&grant.permission, &grant.module_id)?;
        }
        Ok(live)
    }
}
