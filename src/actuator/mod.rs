pub mod actuator;
pub mod bridge;
