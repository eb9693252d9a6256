pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryStorage;
pub use traits::RecordStore;
