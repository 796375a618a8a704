use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use genu_llm::ToolResultContent;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{Tool, ToolError};
use crate::session::SessionId;
use crate::storage::ObjectStore;

pub const UPLOAD_TOOL_NAME: &str = "upload_file_to_s3_and_retrieve_s3_url";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadFileParams {
    /// The path to the uploading file
    pub filepath: String,
}

/// Bucket the tool uploads into and the region used to build public URLs
#[derive(Clone)]
pub struct UploadTarget {
    pub store: Arc<dyn ObjectStore>,
    pub region: String,
}

/// Copies a file out of the invocation workspace into object storage
pub struct UploadFileTool {
    target: Option<UploadTarget>,
    session_id: SessionId,
    workspace: PathBuf,
}

impl UploadFileTool {
    pub fn new(target: Option<UploadTarget>, session_id: SessionId, workspace: PathBuf) -> Self {
        Self {
            target,
            session_id,
            workspace,
        }
    }

    fn outside_workspace(&self, filepath: &str) -> ToolError {
        let ws = self.workspace.display();
        ToolError::InvalidInput(format!(
            "{} does not appear to be a file under the {} directory. Files to be uploaded must exist under {}.",
            filepath, ws, ws
        ))
    }

    pub fn object_key(&self, filename: &str) -> String {
        format!("agentcore/{}/{}", self.session_id, filename)
    }

    async fn upload(&self, target: &UploadTarget, path: &Path) -> Result<String, String> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| e.to_string())?;
        let filename = canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| format!("{} has no file name", canonical.display()))?;

        let key = self.object_key(&filename);
        target
            .store
            .put_file(&key, &canonical)
            .await
            .map_err(|e| e.to_string())?;

        Ok(format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            target.store.bucket(),
            target.region,
            key
        ))
    }

    /// `path` must sit under the workspace both lexically and once symlinks and `..` are resolved
    async fn check_in_workspace(&self, filepath: &str) -> Result<PathBuf, ToolError> {
        let path = PathBuf::from(filepath);
        if !path.starts_with(&self.workspace) {
            return Err(self.outside_workspace(filepath));
        }

        if let (Ok(resolved), Ok(root)) = (
            tokio::fs::canonicalize(&path).await,
            tokio::fs::canonicalize(&self.workspace).await,
        ) {
            if !resolved.starts_with(&root) {
                return Err(self.outside_workspace(filepath));
            }
        }
        Ok(path)
    }
}

#[async_trait]
impl Tool for UploadFileTool {
    fn name(&self) -> String {
        UPLOAD_TOOL_NAME.to_string()
    }

    fn description(&self) -> String {
        format!(
            "Upload the file at {}/* and retrieve the s3 path",
            self.workspace.display()
        )
    }

    fn input_schema(&self) -> Value {
        let mut schema = schemars::schema_for!(UploadFileParams).to_value();
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
        }
        schema
    }

    async fn invoke(&self, input: Value) -> Result<Vec<ToolResultContent>, ToolError> {
        let params: UploadFileParams =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        let Some(target) = &self.target else {
            warn!("[{}] no file bucket configured, skipping upload", self.session_id);
            return Ok(vec![ToolResultContent::Text(format!(
                "Local file path (S3 upload skipped): {}",
                params.filepath
            ))]);
        };

        let path = self.check_in_workspace(&params.filepath).await?;

        let text = match self.upload(target, &path).await {
            Ok(url) => {
                info!("[{}] uploaded {} to {}", self.session_id, params.filepath, url);
                url
            }
            Err(e) => {
                error!("[{}] Error uploading file to S3: {}", self.session_id, e);
                format!(
                    "Error uploading to S3: {}. Local file path: {}",
                    e, params.filepath
                )
            }
        };
        Ok(vec![ToolResultContent::Text(text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use serde_json::json;

    fn session() -> SessionId {
        SessionId::parse("session-42").unwrap()
    }

    fn text(content: &[ToolResultContent]) -> &str {
        match &content[0] {
            ToolResultContent::Text(text) => text,
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[tokio::test]
    async fn uploads_under_session_prefix() {
        let ws = tempfile::tempdir().unwrap();
        let file = ws.path().join("chart.png");
        std::fs::write(&file, b"png-bytes").unwrap();

        let store = Arc::new(MemoryObjectStore::new("files"));
        let tool = UploadFileTool::new(
            Some(UploadTarget {
                store: store.clone(),
                region: "us-west-2".to_string(),
            }),
            session(),
            ws.path().to_path_buf(),
        );

        let content = tool
            .invoke(json!({"filepath": file.display().to_string()}))
            .await
            .unwrap();

        assert_eq!(
            text(&content),
            "https://files.s3.us-west-2.amazonaws.com/agentcore/session-42/chart.png"
        );
        assert_eq!(
            store.object("agentcore/session-42/chart.png").await.unwrap().as_ref(),
            b"png-bytes"
        );
    }

    #[tokio::test]
    async fn skips_upload_without_bucket() {
        let ws = tempfile::tempdir().unwrap();
        let tool = UploadFileTool::new(None, session(), ws.path().to_path_buf());

        let content = tool.invoke(json!({"filepath": "/etc/hosts"})).await.unwrap();
        assert_eq!(
            text(&content),
            "Local file path (S3 upload skipped): /etc/hosts"
        );
    }

    #[tokio::test]
    async fn rejects_files_outside_workspace() {
        let ws = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new("files"));
        let tool = UploadFileTool::new(
            Some(UploadTarget {
                store: store.clone(),
                region: "us-east-1".to_string(),
            }),
            session(),
            ws.path().to_path_buf(),
        );

        let err = tool.invoke(json!({"filepath": "/etc/hosts"})).await.unwrap_err();
        assert!(err.to_string().contains("does not appear to be a file under"));

        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
        let escape = ws
            .path()
            .join("..")
            .join(outside.path().file_name().unwrap())
            .join("secret.txt");
        let escape = escape.display().to_string();
        assert!(tool.invoke(json!({ "filepath": escape })).await.is_err());
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn missing_file_reports_upload_error() {
        let ws = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new("files"));
        let tool = UploadFileTool::new(
            Some(UploadTarget {
                store,
                region: "us-east-1".to_string(),
            }),
            session(),
            ws.path().to_path_buf(),
        );

        let missing = ws.path().join("nope.txt").display().to_string();
        let content = tool.invoke(json!({ "filepath": missing })).await.unwrap();
        assert!(text(&content).starts_with("Error uploading to S3: "));
        assert!(text(&content).ends_with(&format!("Local file path: {}", missing)));
    }

    #[test]
    fn schema_requires_filepath() {
        let ws = tempfile::tempdir().unwrap();
        let tool = UploadFileTool::new(None, session(), ws.path().to_path_buf());
        let schema = tool.input_schema();
        assert_eq!(schema["required"], json!(["filepath"]));
        assert!(schema.get("$schema").is_none());
    }
}
