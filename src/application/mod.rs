// Application layer - Use cases and collaborator seams
pub mod battery_gateway;
pub mod energy_monitor;
pub mod sampler;
pub mod state_store;
