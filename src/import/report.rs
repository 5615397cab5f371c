use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub name: String,
    pub role: String,
    pub default_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    #[serde(default)]
    pub data: Value,
    pub error: String,
}

/// Outcome of one bulk-create call. Partial failure is normal: accepted rows
/// land in `created`, rejected rows in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default)]
    pub created: Vec<CreatedUser>,
    #[serde(default)]
    pub errors: Vec<RowError>,
}

impl ImportResult {
    pub fn to_report_json(&self) -> Value {
        serde_json::json!({
            "createdCount": self.created.len(),
            "errorCount": self.errors.len(),
            "created": self.created,
            "errors": self.errors,
        })
    }

    /// Default passwords are printed in plain text; the operator hands them
    /// out manually.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Created {} user(s)", self.created.len());
        for c in &self.created {
            let _ = writeln!(
                out,
                "  {} ({}) default password: {}",
                c.name, c.role, c.default_password
            );
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "Failed {} row(s)", self.errors.len());
            for e in &self.errors {
                let _ = writeln!(out, "  Row {}: {} {}", e.row, e.error, e.data);
            }
        }
        out
    }
}
