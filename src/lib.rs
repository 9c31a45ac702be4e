pub mod contracts;
pub mod metrics;
pub mod numeral;
pub mod service;
pub mod storage;

pub use contracts::{SequenceConfig, SequenceDefinition, SequenceError, SequenceId, SequenceStore};
pub use numeral::{NumeralSystem, Step};
pub use service::{SequenceService, ServiceConfig};
