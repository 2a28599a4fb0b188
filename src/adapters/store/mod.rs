pub mod memory;

pub use memory::RingBuffer;
