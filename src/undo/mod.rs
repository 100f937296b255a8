pub mod snapshot;
pub mod store;

pub use snapshot::{DEFAULT_TTL_DAYS, OperationSnapshot};
pub use store::{ReversibleOperationStore, UndoOutcome};
