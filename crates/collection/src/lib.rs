pub mod accessor;
pub mod state;

pub use accessor::{CollectionAccessor, Scope};
pub use state::{QueryState, QueryStatus};
