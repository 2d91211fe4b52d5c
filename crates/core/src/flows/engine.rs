use crate::domain::quote::QuoteStatus;
use crate::errors::CoreError;
use crate::flows::states::{EditAuthority, QuoteEvent, TransitionOutcome};

/// Quote status table.
///
/// `Amend` never moves the source quote; it only checks that the source may
/// spawn an amendment. Elevated edits keep the current status, except that a
/// rejected quote always returns to draft once its lines change.
pub fn transition(current: QuoteStatus, event: QuoteEvent) -> Result<TransitionOutcome, CoreError> {
    use QuoteStatus::{Accepted, Approved, Draft, Pending, Rejected};

    let to = match (current, event) {
        (Draft | Rejected, QuoteEvent::Submit { requires_approval: true }) => Pending,
        (Draft | Rejected, QuoteEvent::Submit { requires_approval: false }) => Approved,
        (Pending, QuoteEvent::Approve) => Approved,
        (Pending, QuoteEvent::Reject) => Rejected,
        (Draft | Rejected, QuoteEvent::Edit { .. }) => Draft,
        (status, QuoteEvent::Edit { authority: EditAuthority::Elevated }) => status,
        (Approved | Accepted, QuoteEvent::Amend) => current,
        (Approved, QuoteEvent::Accept) => Accepted,
        _ => {
            return Err(CoreError::InvalidState { operation: event.operation(), current });
        }
    };

    Ok(TransitionOutcome { from: current, to, event })
}
