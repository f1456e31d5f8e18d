// Domain layer - Energy accounting values and algorithms
pub mod accumulator;
pub mod energy;
pub mod error;
pub mod metrics;
pub mod persisted;
pub mod ring_buffer;
