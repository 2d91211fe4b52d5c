pub mod engine;
pub mod states;

pub use engine::transition;
pub use states::{EditAuthority, QuoteEvent, TransitionOutcome};
