//! Collaborator trait for the upstream consumer of normalized light records.

use crate::types::LightRecord;

/// Identifies a tracked object. The caller's own object/device identity
/// space is expected to fit in a `u64`; wider identities can be mapped down
/// by the embedding application.
pub type ObjectId = u64;

/// The upstream pose solver's ingestion point. Infallible: nothing in this
/// crate's state machine can turn emission into an error condition, so
/// there is no `Result` here.
#[cfg_attr(test, mockall::automock)]
pub trait LightSink {
    fn emit_light(&mut self, object: ObjectId, record: LightRecord);
}