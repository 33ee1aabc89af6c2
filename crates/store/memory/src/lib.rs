mod eval;
mod store;

pub use store::MemoryDocumentStore;
