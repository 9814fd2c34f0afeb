pub mod llm_backend;
pub mod mapper;
