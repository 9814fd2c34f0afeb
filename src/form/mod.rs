pub mod diff;
pub mod form_model;
pub mod section;
