pub mod channel;
pub mod envelope;
pub mod registry;
pub mod server;
