use super::*;

pub async fn save_role_document_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, document_id)): Path<(String, String)>,
    Json(payload): Json<SaveRoleDocumentRequest>,
) -> ApiResult<Json<SyncedRoleResponse>> {
    let user = subject.identity_in(&domain)?;
    let document = payload.into_document(document_id, user.domain().clone())?;

    let role = state
        .role_sync_service
        .save_document_role(&user, document)
        .await?;

    Ok(Json(SyncedRoleResponse::from(role)))
}
