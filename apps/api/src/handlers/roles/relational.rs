use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
    Query(query): Query<ListRolesQuery>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let user = subject.identity_in(&domain)?;
    let roles = state
        .role_sync_service
        .list_roles(&user, query.include_archived)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn save_role_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
    Json(payload): Json<SaveRoleRequest>,
) -> ApiResult<(StatusCode, Json<SyncedRoleResponse>)> {
    let user = subject.identity_in(&domain)?;
    let status = if payload.role_id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    let role = state
        .role_sync_service
        .save_relational_role(&user, SaveRoleInput::try_from(payload)?)
        .await?;

    Ok((status, Json(SyncedRoleResponse::from(role))))
}

pub async fn archive_role_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, role_id)): Path<(String, i64)>,
) -> ApiResult<Json<SyncedRoleResponse>> {
    let user = subject.identity_in(&domain)?;
    let role = state.role_sync_service.archive_role(&user, role_id).await?;

    Ok(Json(SyncedRoleResponse::from(role)))
}

pub async fn sync_roles_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
) -> ApiResult<Json<RoleSyncReportResponse>> {
    let user = subject.identity_in(&domain)?;
    let report = state.role_sync_service.reconcile_for_actor(&user).await?;

    Ok(Json(RoleSyncReportResponse::from(report)))
}
