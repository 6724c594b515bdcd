//! Filesystem capability: read, write, delete, list.
//!
//! All I/O goes through tokio::fs under a select on the cancellation
//! token, so a cancelled plan abandons the operation promptly.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use llmos_security::RiskLevel;

use crate::capability::{
    ActionSpec, Capability, CapabilityContext, CapabilityError, ModuleManifest, ParamKind,
    ParamSpec,
};

/// Builtin file I/O module.
#[derive(Default)]
pub struct FilesystemCapability;

impl FilesystemCapability {
    fn error(action: &str, message: impl Into<String>) -> CapabilityError {
        CapabilityError::ExecutionFailed {
            module: "filesystem".to_string(),
            action: action.to_string(),
            message: message.into(),
        }
    }

    fn param_str<'a>(
        params: &'a Map<String, Value>,
        name: &str,
        action: &str,
    ) -> Result<&'a str, CapabilityError> {
        params
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| Self::error(action, format!("param '{name}' must be a string")))
    }

    async fn read_file(&self, path: &str) -> Result<Value, CapabilityError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Self::error("read_file", err.to_string()))?;
        Ok(json!({"path": path, "content": content, "size": content.len()}))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<Value, CapabilityError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| Self::error("write_file", err.to_string()))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|err| Self::error("write_file", err.to_string()))?;
        Ok(json!({"path": path, "bytes_written": content.len()}))
    }

    async fn delete_file(&self, path: &str) -> Result<Value, CapabilityError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|err| Self::error("delete_file", err.to_string()))?;
        Ok(json!({"path": path, "deleted": true}))
    }

    async fn list_dir(&self, path: &str) -> Result<Value, CapabilityError> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|err| Self::error("list_dir", err.to_string()))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|err| Self::error("list_dir", err.to_string()))?
        {
            entries.push(entry.file_name().to_string_lossy().to_string());
        }
        entries.sort();
        let count = entries.len();
        Ok(json!({"path": path, "entries": entries, "count": count}))
    }
}

#[async_trait]
impl Capability for FilesystemCapability {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            module_id: "filesystem".to_string(),
            version: "1.0.0".to_string(),
            description: "Local file I/O: read, write, delete, list".to_string(),
            actions: vec![
                ActionSpec {
                    name: "read_file".to_string(),
                    description: "Read a text file".to_string(),
                    params: vec![ParamSpec::required("path", ParamKind::String)],
                    permission: Some("filesystem.read".to_string()),
                    risk_level: RiskLevel::Low,
                },
                ActionSpec {
                    name: "write_file".to_string(),
                    description: "Write a text file, creating parent directories".to_string(),
                    params: vec![
                        ParamSpec::required("path", ParamKind::String),
                        ParamSpec::required("content", ParamKind::String),
                    ],
                    permission: Some("filesystem.write".to_string()),
                    risk_level: RiskLevel::Medium,
                },
                ActionSpec {
                    name: "delete_file".to_string(),
                    description: "Delete a file".to_string(),
                    params: vec![ParamSpec::required("path", ParamKind::String)],
                    permission: Some("filesystem.delete".to_string()),
                    risk_level: RiskLevel::High,
                },
                ActionSpec {
                    name: "list_dir".to_string(),
                    description: "List directory entries".to_string(),
                    params: vec![ParamSpec::required("path", ParamKind::String)],
                    permission: Some("filesystem.read".to_string()),
                    risk_level: RiskLevel::Low,
                },
            ],
            permissions: vec![
                "filesystem.read".to_string(),
                "filesystem.write".to_string(),
                "filesystem.delete".to_string(),
            ],
            risk_level: RiskLevel::Medium,
            platforms: Vec::new(),
        }
    }

    async fn execute(
        &self,
        action: &str,
        params: &Map<String, Value>,
        ctx: &CapabilityContext,
    ) -> Result<Value, CapabilityError> {
        let work = async {
            match action {
                "read_file" => {
                    let path = Self::param_str(params, "path", action)?;
                    self.read_file(path).await
                }
                "write_file" => {
                    let path = Self::param_str(params, "path", action)?;
                    let content = Self::param_str(params, "content", action)?;
                    self.write_file(path, content).await
                }
                "delete_file" => {
                    let path = Self::param_str(params, "path", action)?;
                    self.delete_file(path).await
                }
                "list_dir" => {
                    let path = Self::param_str(params, "path", action)?;
                    self.list_dir(path).await
                }
                other => Err(CapabilityError::ActionNotFound {
                    module: "filesystem".to_string(),
                    action: other.to_string(),
                }),
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(CapabilityError::Cancelled {
                reason: "filesystem operation cancelled".to_string(),
            }),
            result = work => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> CapabilityContext {
        CapabilityContext::new("p", "a", CancellationToken::new())
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn write_read_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/notes.txt");
        let path_str = path.to_str().unwrap();
        let capability = FilesystemCapability;

        let written = capability
            .execute(
                "write_file",
                &params(json!({"path": path_str, "content": "hello"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(written["bytes_written"], json!(5));

        let read = capability
            .execute("read_file", &params(json!({"path": path_str})), &ctx())
            .await
            .unwrap();
        assert_eq!(read["content"], json!("hello"));

        let deleted = capability
            .execute("delete_file", &params(json!({"path": path_str})), &ctx())
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], json!(true));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn read_missing_file_is_an_execution_failure() {
        let err = FilesystemCapability
            .execute(
                "read_file",
                &params(json!({"path": "/nonexistent/llmos-test"})),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CapabilityContext::new("p", "a", token);

        let err = FilesystemCapability
            .execute("read_file", &params(json!({"path": "/tmp/x"})), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn unknown_action_is_reported() {
        let err = FilesystemCapability
            .execute("format_disk", &Map::new(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::ActionNotFound { .. }));
    }
}
