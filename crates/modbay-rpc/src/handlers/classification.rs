//! Classification tree handlers.

use super::require_str_param;
use crate::server::AppState;
use modbay_core::Result;
use serde_json::{json, Value};

pub async fn get_classification_tree(state: &AppState, _params: &Value) -> Result<Value> {
    let tree = state.api.classification_tree()?;
    Ok(json!({
        "success": true,
        "tree": tree
    }))
}

/// Recategorize a mod. An empty `category` unassigns it.
pub async fn move_mod_category(state: &AppState, params: &Value) -> Result<Value> {
    let sha = require_str_param(params, "sha", "sha")?;
    let category = require_str_param(params, "category", "category")?;
    let tree = state.api.move_mod_category(&sha, &category)?;
    Ok(json!({
        "success": true,
        "tree": tree
    }))
}
