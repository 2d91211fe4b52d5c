//! Quote approval workflow: submission with smart auto-approval, human
//! decisions, edits, clones, amendments and client acceptance.
//!
//! The engine checks status validity only. Callers are expected to have
//! authorized the actor and to serialize mutations of the same quote.

pub mod deletion;
pub mod notify;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::cpq::{calculate_lines, format_percent, MarginHealth};
use crate::domain::customer::CustomerId;
use crate::domain::quote::{
    AcceptanceRecord, ApprovalDecision, ApprovalRecord, LineInput, Quote, QuoteStatus,
    SubmissionRecord, UserId,
};
use crate::domain::revision::QuoteRevision;
use crate::errors::CoreError;
use crate::flows::{transition, EditAuthority, QuoteEvent, TransitionOutcome};
use crate::rates::RateResolver;

pub use deletion::{deletion_plan, DeletionPlan, DeletionStep};
pub use notify::{InMemoryNotifier, Notification, NotificationKind, Notifier, Recipient};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub transition: TransitionOutcome,
    pub requires_approval: bool,
    pub gm_percent: Decimal,
    pub margin_health: MarginHealth,
}

pub struct ApprovalEngine<R, N, S> {
    rates: R,
    notifier: N,
    audit: S,
}

impl<R, N, S> ApprovalEngine<R, N, S>
where
    R: RateResolver,
    N: Notifier,
    S: AuditSink,
{
    pub fn new(rates: R, notifier: N, audit: S) -> Self {
        Self { rates, notifier, audit }
    }

    /// Prices `inputs` with the VAT rate in force and opens a draft.
    pub fn create_draft(
        &self,
        creator: UserId,
        customer: Option<CustomerId>,
        inputs: &[LineInput],
        now: DateTime<Utc>,
    ) -> Result<Quote, CoreError> {
        let rates = self.rates.resolve();
        let lines = calculate_lines(inputs, rates.vat_rate)?;
        let quote = Quote::new_draft(creator, customer, lines, rates.quote_validity_days, now)?;

        info!(
            event_name = "quote.created",
            quote_id = %quote.id,
            line_count = quote.totals().line_count,
            gm_percent = %quote.overall_gm_percent(),
            "draft quote created"
        );
        self.audit.emit(
            AuditEvent::new(
                quote.id.clone(),
                "quote.created",
                AuditCategory::Pricing,
                quote.creator_id.0.clone(),
                AuditOutcome::Success,
                now,
            )
            .with_metadata("vat_rate", rates.vat_rate.to_string())
            .with_metadata("total_selling_ex_vat", quote.totals().total_selling_ex_vat.to_string()),
        );

        Ok(quote)
    }

    /// Submits a draft or rejected quote.
    ///
    /// Quotes whose gross margin is at or above the smart approval floor are
    /// approved on the spot with the submitter recorded as approver; the rest
    /// wait in `pending` for a human decision.
    pub fn submit(
        &self,
        quote: &mut Quote,
        submitter: &UserId,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, CoreError> {
        let thresholds = self.rates.margin_thresholds();
        let gm_percent = quote.overall_gm_percent();
        let requires_approval = gm_percent < thresholds.smart_approval_floor;

        let outcome =
            self.check(quote, QuoteEvent::Submit { requires_approval }, &submitter.0, now)?;
        if quote.lines().is_empty() {
            self.emit_rejection(quote, "quote.submit_rejected", &submitter.0, "empty quote", now);
            return Err(CoreError::EmptyQuote { quote_id: quote.id.clone() });
        }

        let margin_health = quote.totals().margin_health(&thresholds);
        quote.submission = Some(SubmissionRecord {
            submitted_by: submitter.clone(),
            submitted_at: now,
            requires_approval,
            gm_percent,
        });

        if requires_approval {
            quote.approval = None;
            self.notifier.notify(Notification {
                quote_id: quote.id.clone(),
                recipient: Recipient::ApproverPool,
                kind: NotificationKind::ApprovalRequested,
                message: format!(
                    "Quote {} needs approval: gross margin {} is below the {} floor",
                    quote.id,
                    format_percent(gm_percent),
                    format_percent(thresholds.smart_approval_floor)
                ),
                comments: None,
                created_at: now,
            });
        } else {
            quote.approval = Some(ApprovalRecord {
                decision: ApprovalDecision::AutoApproved,
                approver_id: submitter.clone(),
                comments: format!(
                    "Auto-approved: gross margin {} meets the smart approval floor of {}",
                    format_percent(gm_percent),
                    format_percent(thresholds.smart_approval_floor)
                ),
                decided_at: now,
            });
        }
        quote.status = outcome.to;
        quote.updated_at = now;

        let event_name =
            if requires_approval { "quote.submitted_for_approval" } else { "quote.auto_approved" };
        info!(
            event_name,
            quote_id = %quote.id,
            gm_percent = %gm_percent,
            margin_health = ?margin_health,
            "quote submitted"
        );
        self.emit_success(quote, &outcome, event_name, &submitter.0, now, |event| {
            event
                .with_metadata("gm_percent", gm_percent.to_string())
                .with_metadata("requires_approval", requires_approval.to_string())
        });

        Ok(SubmitOutcome { transition: outcome, requires_approval, gm_percent, margin_health })
    }

    pub fn approve(
        &self,
        quote: &mut Quote,
        approver_id: &UserId,
        comments: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, CoreError> {
        self.decide(quote, approver_id, comments.into(), ApprovalDecision::Approved, now)
    }

    pub fn reject(
        &self,
        quote: &mut Quote,
        approver_id: &UserId,
        comments: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, CoreError> {
        self.decide(quote, approver_id, comments.into(), ApprovalDecision::Rejected, now)
    }

    fn decide(
        &self,
        quote: &mut Quote,
        approver_id: &UserId,
        comments: String,
        decision: ApprovalDecision,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, CoreError> {
        let (event, kind, verb) = match decision {
            ApprovalDecision::Rejected => {
                (QuoteEvent::Reject, NotificationKind::QuoteRejected, "rejected")
            }
            _ => (QuoteEvent::Approve, NotificationKind::QuoteApproved, "approved"),
        };
        let outcome = self.check(quote, event, &approver_id.0, now)?;

        quote.approval = Some(ApprovalRecord {
            decision,
            approver_id: approver_id.clone(),
            comments: comments.clone(),
            decided_at: now,
        });
        quote.status = outcome.to;
        quote.updated_at = now;

        self.notifier.notify(Notification {
            quote_id: quote.id.clone(),
            recipient: Recipient::User(quote.creator_id.clone()),
            kind,
            message: format!("Quote {} was {verb} by {}", quote.id, approver_id),
            comments: (!comments.trim().is_empty()).then_some(comments),
            created_at: now,
        });

        let event_name = format!("quote.{verb}");
        info!(event_name = %event_name, quote_id = %quote.id, approver_id = %approver_id, "approval decision recorded");
        self.emit_success(quote, &outcome, &event_name, &approver_id.0, now, |event| event);

        Ok(outcome)
    }

    /// Replaces the full line set and recalculates it.
    ///
    /// Owners may edit draft and rejected quotes; an edited rejected quote
    /// goes back to draft and loses its previous decision. Returns the
    /// snapshot of the lines that were replaced.
    pub fn edit(
        &self,
        quote: &mut Quote,
        inputs: &[LineInput],
        editor: &UserId,
        authority: EditAuthority,
        now: DateTime<Utc>,
    ) -> Result<QuoteRevision, CoreError> {
        let outcome = self.check(quote, QuoteEvent::Edit { authority }, &editor.0, now)?;
        let vat_rate = self.rates.vat_rate();
        let lines = calculate_lines(inputs, vat_rate)?;

        let status_before = quote.status;
        let (previous_lines, previous_totals) = quote.replace_lines(lines)?;
        if status_before == QuoteStatus::Rejected {
            quote.submission = None;
            quote.approval = None;
        }
        quote.clear_win_analysis();
        quote.status = outcome.to;
        quote.updated_at = now;

        if !matches!(status_before, QuoteStatus::Draft | QuoteStatus::Rejected) {
            warn!(
                event_name = "quote.elevated_edit",
                quote_id = %quote.id,
                editor = %editor,
                status = %status_before,
                "lines replaced on a locked quote through elevated access"
            );
        }
        self.emit_success(quote, &outcome, "quote.edited", &editor.0, now, |event| {
            event
                .with_metadata("previous_line_count", previous_totals.line_count.to_string())
                .with_metadata("line_count", inputs.len().to_string())
        });

        Ok(QuoteRevision {
            quote_id: quote.id.clone(),
            revision_number: quote.revision_number,
            status_before,
            lines: previous_lines,
            totals: previous_totals,
            edited_by: editor.clone(),
            recorded_at: now,
        })
    }

    /// Copies `source` into an unrelated draft. Lines and totals are carried
    /// as stored, without recalculation, whatever the source status.
    pub fn clone_quote(&self, source: &Quote, creator: UserId, now: DateTime<Utc>) -> Quote {
        let validity_days = self.rates.quote_validity_days();
        let copy = Quote::derived_draft(source, creator, validity_days, now);

        info!(
            event_name = "quote.cloned",
            quote_id = %copy.id,
            source_quote_id = %source.id,
            "quote cloned into new draft"
        );
        self.audit.emit(
            AuditEvent::new(
                copy.id.clone(),
                "quote.cloned",
                AuditCategory::Revision,
                copy.creator_id.0.clone(),
                AuditOutcome::Success,
                now,
            )
            .with_metadata("source_quote_id", source.id.0.clone()),
        );

        copy
    }

    /// Opens the next revision of an approved or accepted quote. The source
    /// stays untouched as the record of what was approved or signed.
    pub fn amend(&self, source: &Quote, now: DateTime<Utc>) -> Result<Quote, CoreError> {
        self.check(source, QuoteEvent::Amend, &source.creator_id.0, now)?;

        let validity_days = self.rates.quote_validity_days();
        let mut amendment =
            Quote::derived_draft(source, source.creator_id.clone(), validity_days, now);
        amendment.revision_number = source.revision_number.saturating_add(1);
        amendment.parent_quote_id = Some(source.id.clone());

        info!(
            event_name = "quote.amended",
            quote_id = %amendment.id,
            parent_quote_id = %source.id,
            revision_number = amendment.revision_number,
            "amendment draft created"
        );
        self.audit.emit(
            AuditEvent::new(
                amendment.id.clone(),
                "quote.amended",
                AuditCategory::Revision,
                amendment.creator_id.0.clone(),
                AuditOutcome::Success,
                now,
            )
            .with_metadata("parent_quote_id", source.id.0.clone())
            .with_metadata("revision_number", amendment.revision_number.to_string()),
        );

        Ok(amendment)
    }

    /// Client sign-off on an approved quote.
    pub fn accept(
        &self,
        quote: &mut Quote,
        signer_name: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, CoreError> {
        let signer_name = signer_name.trim();
        let outcome = self.check(quote, QuoteEvent::Accept, signer_name, now)?;
        if signer_name.is_empty() {
            return Err(CoreError::invalid_input("signer_name", "is required"));
        }

        quote.acceptance =
            Some(AcceptanceRecord { signer_name: signer_name.to_owned(), accepted_at: now });
        quote.status = outcome.to;
        quote.updated_at = now;

        self.notifier.notify(Notification {
            quote_id: quote.id.clone(),
            recipient: Recipient::User(quote.creator_id.clone()),
            kind: NotificationKind::QuoteAccepted,
            message: format!("Quote {} was accepted by {signer_name}", quote.id),
            comments: None,
            created_at: now,
        });

        info!(event_name = "quote.accepted", quote_id = %quote.id, "quote accepted by client");
        self.emit_success(quote, &outcome, "quote.accepted", signer_name, now, |event| event);

        Ok(outcome)
    }

    fn check(
        &self,
        quote: &Quote,
        event: QuoteEvent,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, CoreError> {
        transition(quote.status, event).map_err(|error| {
            warn!(
                event_name = "quote.transition_rejected",
                quote_id = %quote.id,
                operation = %event.operation(),
                status = %quote.status,
                "quote transition rejected"
            );
            self.emit_rejection(quote, "quote.transition_rejected", actor, &error.to_string(), now);
            error
        })
    }

    fn emit_rejection(
        &self,
        quote: &Quote,
        event_type: &str,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        self.audit.emit(
            AuditEvent::new(
                quote.id.clone(),
                event_type,
                AuditCategory::Approval,
                actor,
                AuditOutcome::Rejected,
                now,
            )
            .with_metadata("status", quote.status.to_string())
            .with_metadata("error", reason),
        );
    }

    fn emit_success(
        &self,
        quote: &Quote,
        outcome: &TransitionOutcome,
        event_type: &str,
        actor: &str,
        now: DateTime<Utc>,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let category = match outcome.event {
            QuoteEvent::Edit { .. } | QuoteEvent::Amend => AuditCategory::Revision,
            QuoteEvent::Accept => AuditCategory::Acceptance,
            _ => AuditCategory::Approval,
        };
        let event = AuditEvent::new(
            quote.id.clone(),
            event_type,
            category,
            actor,
            AuditOutcome::Success,
            now,
        )
        .with_metadata("from", outcome.from.to_string())
        .with_metadata("to", outcome.to.to_string());
        self.audit.emit(decorate(event));
    }
}
