use super::*;

pub async fn visible_domains_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug)): Path<(String, String)>,
) -> ApiResult<Json<VisibleDomainsResponse>> {
    let user = subject.identity_in(&domain)?;
    let domains = state
        .registry_service
        .visible_domains(&user, slug.as_str())
        .await?
        .into_iter()
        .map(|domain| domain.as_str().to_owned())
        .collect();

    Ok(Json(VisibleDomainsResponse { domains }))
}

pub async fn registry_case_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug, case_id)): Path<(String, String, String)>,
    Query(query): Query<RegistryCaseQuery>,
) -> ApiResult<Json<Vec<CaseResponse>>> {
    let user = subject.identity_in(&domain)?;

    let cases = if query.include_descendants {
        state
            .registry_service
            .get_case_hierarchy(&user, slug.as_str(), case_id.as_str(), &query.case_type)
            .await?
    } else {
        vec![
            state
                .registry_service
                .get_case(&user, slug.as_str(), case_id.as_str(), &query.case_type)
                .await?,
        ]
    };

    Ok(Json(cases.into_iter().map(CaseResponse::from).collect()))
}
