pub mod context;
pub mod profile_model;
