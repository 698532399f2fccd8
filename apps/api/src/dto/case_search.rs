mod conversions;
mod types;

pub use types::{
    AncestorFilterResponse, CaseSearchConfigPayload, CaseSearchRequestBody, CaseSearchResponse,
    CompiledCaseSearchResponse, CriteriaValueRequest, DetailColumnRequest, FuzzyPropertiesPayload,
    IgnorePatternPayload,
};
