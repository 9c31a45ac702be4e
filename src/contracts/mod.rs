pub mod error;
pub mod sequence;
pub mod store;

pub use error::{CodecError, SequenceError, StoreError};
pub use sequence::{SequenceConfig, SequenceDefinition, SequenceId};
pub use store::SequenceStore;
