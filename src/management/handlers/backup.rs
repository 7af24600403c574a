//! # 备份接口

use crate::backup::{CreateSchedule, RestoreResult, UpdateSchedule};
use crate::error::Result;
use crate::management::middleware::AuthContext;
use crate::management::response::{ApiResponse, success, success_with_message, success_without_data};
use crate::management::server::AppState;
use crate::snapshot::BackupSnapshot;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use entity::{backup_files, backup_schedules};
use serde_json::Value;

pub async fn list_schedules(State(state): State<AppState>) -> Result<ApiResponse<Vec<backup_schedules::Model>>> {
    Ok(success(state.backup.list_schedules().await?))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<backup_schedules::Model>> {
    Ok(success(state.backup.get_schedule(id).await?))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateSchedule>,
) -> Result<ApiResponse<backup_schedules::Model>> {
    auth.require_admin()?;
    Ok(success(state.backup.create_schedule(request).await?))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateSchedule>,
) -> Result<ApiResponse<backup_schedules::Model>> {
    auth.require_admin()?;
    Ok(success(state.backup.update_schedule(id, request).await?))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    auth.require_admin()?;
    state.backup.delete_schedule(id).await?;
    Ok(success_without_data("备份计划已删除"))
}

/// 手动执行
pub async fn run_schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<backup_files::Model>> {
    auth.require_admin()?;
    Ok(success(state.backup.run_now(id).await?))
}

pub async fn list_files(State(state): State<AppState>) -> Result<ApiResponse<Vec<backup_files::Model>>> {
    Ok(success(state.backup.list_files().await?))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    auth.require_admin()?;
    state.backup.delete_file(id).await?;
    Ok(success_without_data("备份文件已删除"))
}

pub async fn restore_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<RestoreResult>> {
    auth.require_admin()?;
    Ok(restored(state.backup.restore_file(id).await?))
}

pub async fn export_backup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<ApiResponse<BackupSnapshot>> {
    auth.require_admin()?;
    Ok(success(state.backup.export().await?))
}

pub async fn import_backup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<Value>,
) -> Result<ApiResponse<RestoreResult>> {
    auth.require_admin()?;
    Ok(restored(state.backup.import(&body).await?))
}

fn restored(result: RestoreResult) -> ApiResponse<RestoreResult> {
    let message = if result.reloaded {
        "备份已恢复"
    } else {
        "备份已恢复，但 nginx 未能重载，需要手动重载"
    };
    success_with_message(result, message)
}
