use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use casewell_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let domain_routes = Router::new()
        .route(
            "/api/domains/{domain}/case-search",
            post(handlers::case_search::search_cases_handler),
        )
        .route(
            "/api/domains/{domain}/case-search/compile",
            post(handlers::case_search::compile_case_search_handler),
        )
        .route(
            "/api/domains/{domain}/case-search/config",
            get(handlers::case_search::case_search_config_handler)
                .put(handlers::case_search::save_case_search_config_handler),
        )
        .route(
            "/api/domains/{domain}/roles",
            get(handlers::roles::list_roles_handler).post(handlers::roles::save_role_handler),
        )
        .route(
            "/api/domains/{domain}/roles/sync",
            post(handlers::roles::sync_roles_handler),
        )
        .route(
            "/api/domains/{domain}/roles/{role_id}/archive",
            post(handlers::roles::archive_role_handler),
        )
        .route(
            "/api/domains/{domain}/role-documents/{document_id}",
            put(handlers::roles::save_role_document_handler),
        )
        .route(
            "/api/domains/{domain}/registries",
            get(handlers::registries::list_registries_handler)
                .post(handlers::registries::create_registry_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/invitations",
            post(handlers::registries::invite_domain_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/accept",
            post(handlers::registries::accept_invitation_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/reject",
            post(handlers::registries::reject_invitation_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/grants",
            post(handlers::registries::grant_access_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/deactivate",
            post(handlers::registries::deactivate_registry_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/visible-domains",
            get(handlers::registries::visible_domains_handler),
        )
        .route(
            "/api/domains/{domain}/registries/{slug}/cases/{case_id}",
            get(handlers::registries::registry_case_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_service_auth,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(domain_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
