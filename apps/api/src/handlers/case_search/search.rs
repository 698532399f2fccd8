use casewell_core::UserIdentity;

use super::*;

fn criteria_from_payload(
    user: &UserIdentity,
    payload: CaseSearchRequestBody,
) -> (CaseSearchCriteria, Vec<DetailColumn>, bool) {
    let criteria: BTreeMap<String, CriteriaValue> = payload
        .criteria
        .into_iter()
        .map(|(key, value)| (key, CriteriaValue::from(value)))
        .collect();

    (
        CaseSearchCriteria::new(user.domain().clone(), payload.case_types, criteria),
        payload
            .detail_columns
            .into_iter()
            .map(DetailColumn::from)
            .collect(),
        payload.include_score,
    )
}

pub async fn search_cases_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
    Json(payload): Json<CaseSearchRequestBody>,
) -> ApiResult<Json<CaseSearchResponse>> {
    let user = subject.identity_in(&domain)?;
    let (criteria, detail_columns, include_score) = criteria_from_payload(&user, payload);

    let results = state
        .case_search_service
        .search(
            &user,
            &CaseSearchRequest {
                criteria,
                detail_columns,
                include_score,
            },
        )
        .await?;

    Ok(Json(CaseSearchResponse::from(results)))
}

pub async fn compile_case_search_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
    Json(payload): Json<CaseSearchRequestBody>,
) -> ApiResult<Json<CompiledCaseSearchResponse>> {
    let user = subject.identity_in(&domain)?;
    let (criteria, _, _) = criteria_from_payload(&user, payload);

    let compiled = state.case_search_service.compile(&user, &criteria).await?;

    Ok(Json(CompiledCaseSearchResponse::from(compiled)))
}
