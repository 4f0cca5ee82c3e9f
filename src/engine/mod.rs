pub mod audit;
pub mod server;
