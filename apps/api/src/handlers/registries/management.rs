use super::*;

pub async fn list_registries_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
) -> ApiResult<Json<Vec<RegistryResponse>>> {
    let user = subject.identity_in(&domain)?;
    let registries = state
        .registry_service
        .list_owned(&user)
        .await?
        .into_iter()
        .map(RegistryResponse::from)
        .collect();

    Ok(Json(registries))
}

pub async fn create_registry_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path(domain): Path<String>,
    Json(payload): Json<CreateRegistryRequest>,
) -> ApiResult<(StatusCode, Json<RegistryResponse>)> {
    let user = subject.identity_in(&domain)?;
    let registry = state
        .registry_service
        .create_registry(&user, payload.name.as_str(), payload.case_types)
        .await?;

    Ok((StatusCode::CREATED, Json(RegistryResponse::from(registry))))
}

pub async fn invite_domain_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug)): Path<(String, String)>,
    Json(payload): Json<InviteDomainRequest>,
) -> ApiResult<Json<RegistryResponse>> {
    let user = subject.identity_in(&domain)?;
    let invited = DomainName::new(payload.domain)?;
    let registry = state
        .registry_service
        .invite_domain(&user, slug.as_str(), invited)
        .await?;

    Ok(Json(RegistryResponse::from(registry)))
}

pub async fn accept_invitation_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug)): Path<(String, String)>,
) -> ApiResult<Json<RegistryResponse>> {
    let user = subject.identity_in(&domain)?;
    let registry = state
        .registry_service
        .accept_invitation(&user, slug.as_str())
        .await?;

    Ok(Json(RegistryResponse::from(registry)))
}

pub async fn reject_invitation_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug)): Path<(String, String)>,
) -> ApiResult<Json<RegistryResponse>> {
    let user = subject.identity_in(&domain)?;
    let registry = state
        .registry_service
        .reject_invitation(&user, slug.as_str())
        .await?;

    Ok(Json(RegistryResponse::from(registry)))
}

pub async fn grant_access_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug)): Path<(String, String)>,
    Json(payload): Json<GrantAccessRequest>,
) -> ApiResult<Json<RegistryResponse>> {
    let user = subject.identity_in(&domain)?;
    let to_domains = payload
        .to_domains
        .into_iter()
        .map(DomainName::new)
        .collect::<Result<BTreeSet<_>, _>>()?;

    let registry = state
        .registry_service
        .grant_access(&user, slug.as_str(), to_domains)
        .await?;

    Ok(Json(RegistryResponse::from(registry)))
}

pub async fn deactivate_registry_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Path((domain, slug)): Path<(String, String)>,
) -> ApiResult<Json<RegistryResponse>> {
    let user = subject.identity_in(&domain)?;
    let registry = state
        .registry_service
        .deactivate(&user, slug.as_str())
        .await?;

    Ok(Json(RegistryResponse::from(registry)))
}
