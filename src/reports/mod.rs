// Reports module - point-in-time snapshots and period reviews

pub mod period;
pub mod review;
pub mod snapshot;

pub use period::Period;
pub use review::Review;
pub use snapshot::{CounterpartyInfo, Holding, SecurityInfo, Snapshot};
