pub mod case_search;
pub mod health;
pub mod registries;
pub mod roles;
