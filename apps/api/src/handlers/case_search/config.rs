use super::*;

pub async fn case_search_config_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
) -> ApiResult<Json<CaseSearchConfigPayload>> {
    let user = subject.identity_in(&domain)?;
    let config = state.case_search_service.get_config(&user).await?;

    Ok(Json(CaseSearchConfigPayload::from(config)))
}

pub async fn save_case_search_config_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
    Json(payload): Json<CaseSearchConfigPayload>,
) -> ApiResult<Json<CaseSearchConfigPayload>> {
    let user = subject.identity_in(&domain)?;
    let config = payload.into_config(user.domain().clone());

    let saved = state.case_search_service.save_config(&user, config).await?;

    Ok(Json(CaseSearchConfigPayload::from(saved)))
}
