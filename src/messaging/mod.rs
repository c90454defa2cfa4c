pub mod redpanda;

pub use redpanda::RedpandaDispatcher;
