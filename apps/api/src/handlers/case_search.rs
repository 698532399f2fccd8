use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Extension, Path, State};

use casewell_application::{CaseSearchCriteria, CaseSearchRequest};
use casewell_domain::{CriteriaValue, DetailColumn};

use crate::dto::{
    CaseSearchConfigPayload, CaseSearchRequestBody, CaseSearchResponse,
    CompiledCaseSearchResponse,
};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedSubject;
use crate::state::AppState;

mod config;
mod search;

pub use config::{case_search_config_handler, save_case_search_config_handler};
pub use search::{compile_case_search_handler, search_cases_handler};
