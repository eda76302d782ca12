// ── Domain model ──

pub mod event;
pub mod mode;
pub mod tag;

pub use event::{FeedbackEvent, ScanToggle};
pub use mode::{ReadingMode, ScanPolicy, Workflow};
pub use tag::{
    ClassificationDecision, Product, RawRead, RegisteredItem, Registration, TagObservation,
    UNREGISTERED_LABEL,
};
