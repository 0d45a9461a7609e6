mod aggregation;
mod delete;
mod insert;
mod projection;
mod seq_scan;
mod topn;
mod update;
mod values;

pub use aggregation::{AggregateKey, AggregationExecutor, AggregationHashTable};
pub use delete::DeleteExecutor;
pub use insert::InsertExecutor;
pub use projection::ProjectionExecutor;
pub use seq_scan::SeqScanExecutor;
pub use topn::TopNExecutor;
pub use update::UpdateExecutor;
pub use values::ValuesExecutor;
