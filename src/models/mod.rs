pub mod checkpoint;
pub mod outcome;
pub mod result;
pub mod sample;

pub use checkpoint::CheckpointRecord;
pub use outcome::TestOutcome;
pub use result::{ContextInfo, SampleSummary, TestCaseResult};
pub use sample::SampleRecord;
