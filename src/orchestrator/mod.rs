pub mod field_fill;
pub mod orchestrator;
