pub mod acode;
pub mod context;
pub mod discover;
pub mod pulse;
pub mod sync;
pub mod tracked;
pub mod traits;
pub mod types;

pub use context::GlobalContext;
pub use tracked::{Disambiguator, PerObjectState};
pub use traits::{LightSink, ObjectId};
pub use types::{
    Axis, CoalescedSync, LightEvent, LightRecord, Lighthouse, Mode, Regime, SYNC_INDEX,
};
