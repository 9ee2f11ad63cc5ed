//! Invocation of the external schema-dump tool.

use crate::error::SnapshotError;
use dbslice_catalog_postgres::{ConnectionParams, ServerVersion};
use tokio::process::Command;
use tracing::debug;

/// Wrapper around the external `pg_dump` binary.
pub struct SchemaDumpTool {
    program: String,
}

impl SchemaDumpTool {
    /// Use the `pg_dump` found on `PATH`.
    pub fn new() -> Self {
        SchemaDumpTool {
            program: "pg_dump".to_string(),
        }
    }

    /// Use a specific binary (tests, non-standard installations).
    pub fn with_program(program: impl Into<String>) -> Self {
        SchemaDumpTool {
            program: program.into(),
        }
    }

    /// The tool's version, for the driver's major-version check.
    pub async fn version(&self) -> Result<ServerVersion, SnapshotError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| SnapshotError::DumpToolFailed(format!("{}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(SnapshotError::DumpToolFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(ServerVersion::parse_tool_output(&String::from_utf8_lossy(
            &output.stdout,
        ))?)
    }

    /// Run a schema-only dump and capture its full stdout. The password
    /// travels through `PGPASSWORD`, never the argument list.
    pub async fn dump_schema(&self, params: &ConnectionParams) -> Result<String, SnapshotError> {
        debug!(program = %self.program, database = %params.database, "running schema dump");
        let output = Command::new(&self.program)
            .args(params.tool_args())
            .arg("--schema-only")
            .env("PGPASSWORD", &params.password)
            .output()
            .await
            .map_err(|e| SnapshotError::DumpToolFailed(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(SnapshotError::DumpToolFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for SchemaDumpTool {
    fn default() -> Self {
        SchemaDumpTool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_reports_tool_failure() {
        let tool = SchemaDumpTool::with_program("definitely-not-pg-dump");
        let err = tool.version().await.unwrap_err();
        assert!(matches!(err, SnapshotError::DumpToolFailed(_)));
    }

    #[tokio::test]
    async fn unparsable_banner_is_an_error() {
        // `echo --version` prints "--version", which is not a version.
        let tool = SchemaDumpTool::with_program("echo");
        assert!(tool.version().await.is_err());
    }
}
