//! JSON renderer. Section order follows the model's field order
//! (cover → summary → swaps → districts → verification → screen → diagnostics → integrity).

use crate::{ReportError, ReportModel};

pub fn render_json(model: &ReportModel) -> Result<String, ReportError> {
    serde_json::to_string_pretty(model).map_err(|e| ReportError::Serialize(e.to_string()))
}
