//! Migration handlers.

use super::{get_str_param, require_str_param};
use crate::server::AppState;
use modbay_core::{MigrationOptions, ModbayError, Result};
use serde_json::{json, Value};

pub async fn analyze_source(state: &AppState, params: &Value) -> Result<Value> {
    let source = require_str_param(params, "source_path", "sourcePath")?;
    let environment = get_str_param(params, "environment_name", "environmentName");
    let analysis = state.api.analyze_source(source, environment).await?;
    Ok(json!({
        "success": true,
        "analysis": analysis
    }))
}

pub async fn start_migration(state: &AppState, params: &Value) -> Result<Value> {
    let options: MigrationOptions =
        serde_json::from_value(params.clone()).map_err(|e| ModbayError::InvalidParams {
            message: format!("Invalid migration options: {}", e),
        })?;
    let migration_id = state.api.start_migration(options)?;
    Ok(json!({
        "success": true,
        "migration_id": migration_id
    }))
}

pub async fn get_migration_progress(state: &AppState, params: &Value) -> Result<Value> {
    let migration_id = require_str_param(params, "migration_id", "migrationId")?;
    let record = state.api.get_migration(&migration_id)?;
    Ok(json!({
        "success": true,
        "status": record.status,
        "progress": record.progress
    }))
}

pub async fn get_migration_result(state: &AppState, params: &Value) -> Result<Value> {
    let migration_id = require_str_param(params, "migration_id", "migrationId")?;
    let record = state.api.get_migration(&migration_id)?;
    Ok(json!({
        "success": true,
        "status": record.status,
        "result": record.result,
        "error": record.error
    }))
}

pub async fn cancel_migration(state: &AppState, params: &Value) -> Result<Value> {
    let migration_id = require_str_param(params, "migration_id", "migrationId")?;
    state.api.cancel_migration(&migration_id)?;
    Ok(json!({
        "success": true
    }))
}

pub async fn list_migrations(state: &AppState, _params: &Value) -> Result<Value> {
    Ok(json!({
        "success": true,
        "migrations": state.api.list_migrations()
    }))
}

pub async fn validate_archives(state: &AppState, _params: &Value) -> Result<Value> {
    let validation = state.api.validate_archives()?;
    Ok(json!({
        "success": true,
        "consistent": validation.is_consistent(),
        "validation": validation
    }))
}
