use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cpq::totals::{aggregate, QuoteTotals};
use crate::domain::customer::CustomerId;
use crate::domain::win::WinAnalysis;
use crate::errors::CoreError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(format!("Q-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Accepted,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
        }
    }

    /// Approved and accepted quotes carry a sanctioned price.
    pub fn is_sanctioned(&self) -> bool {
        matches!(self, Self::Approved | Self::Accepted)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "accepted" => Ok(Self::Accepted),
            other => Err(format!(
                "unsupported quote status `{other}` (expected draft|pending|approved|rejected|accepted)"
            )),
        }
    }
}

pub const DEFAULT_TARGET_MARKUP: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

fn default_target_markup() -> Decimal {
    DEFAULT_TARGET_MARKUP
}

/// Raw pricing inputs for one line, as entered by the quoting user.
///
/// `exchange_rate` is expressed as base-currency units per 1 unit of the
/// supplier currency and is multiplied directly into the landed cost. A
/// caller holding a "foreign units per base unit" rate must invert it
/// before building the line; an inverted rate is not detectable here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub buy_price: Option<Decimal>,
    pub currency: String,
    pub quantity: u32,
    #[serde(default)]
    pub freight_rate: Decimal,
    #[serde(default)]
    pub duty_rate: Decimal,
    #[serde(default)]
    pub handling_rate: Decimal,
    pub exchange_rate: Decimal,
    #[serde(default = "default_target_markup")]
    pub target_markup_percent: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_markup_percent: Option<Decimal>,
}

impl LineInput {
    pub fn new(
        buy_price: Decimal,
        currency: impl Into<String>,
        quantity: u32,
        exchange_rate: Decimal,
    ) -> Self {
        Self {
            part_number: None,
            description: None,
            buy_price: Some(buy_price),
            currency: currency.into(),
            quantity,
            freight_rate: Decimal::ZERO,
            duty_rate: Decimal::ZERO,
            handling_rate: Decimal::ZERO,
            exchange_rate,
            target_markup_percent: DEFAULT_TARGET_MARKUP,
            override_markup_percent: None,
        }
    }

    pub fn with_part_number(mut self, part_number: impl Into<String>) -> Self {
        self.part_number = Some(part_number.into());
        self
    }

    pub fn with_rates(mut self, freight: Decimal, duty: Decimal, handling: Decimal) -> Self {
        self.freight_rate = freight;
        self.duty_rate = duty;
        self.handling_rate = handling;
        self
    }

    pub fn with_target_markup(mut self, markup: Decimal) -> Self {
        self.target_markup_percent = markup;
        self
    }

    pub fn with_override_markup(mut self, markup: Decimal) -> Self {
        self.override_markup_percent = Some(markup);
        self
    }
}

/// Derived cost and price figures for one line. Only the line calculator
/// produces these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBreakdown {
    pub vat_rate: Decimal,
    pub markup_percent: Decimal,
    /// Supplier currency.
    pub freight_amount: Decimal,
    pub duty_amount: Decimal,
    pub handling_amount: Decimal,
    pub landed_cost: Decimal,
    pub markup_amount: Decimal,
    pub unit_sell_ex_vat: Decimal,
    pub line_total_ex_vat: Decimal,
    pub vat_amount: Decimal,
    pub line_total_inc_vat: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    input: LineInput,
    breakdown: LineBreakdown,
}

impl QuoteLine {
    pub(crate) fn from_parts(input: LineInput, breakdown: LineBreakdown) -> Self {
        Self { input, breakdown }
    }

    pub fn input(&self) -> &LineInput {
        &self.input
    }

    pub fn breakdown(&self) -> &LineBreakdown {
        &self.breakdown
    }

    pub fn quantity(&self) -> u32 {
        self.input.quantity
    }

    pub fn part_number(&self) -> Option<&str> {
        self.input.part_number.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    AutoApproved,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub decision: ApprovalDecision,
    pub approver_id: UserId,
    pub comments: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    pub requires_approval: bool,
    pub gm_percent: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceRecord {
    pub signer_name: String,
    pub accepted_at: DateTime<Utc>,
}

/// Quote record without its line rows, as a header table holds it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteHeader {
    pub id: QuoteId,
    pub creator_id: UserId,
    pub customer_id: Option<CustomerId>,
    pub status: QuoteStatus,
    pub totals: QuoteTotals,
    pub revision_number: u32,
    pub parent_quote_id: Option<QuoteId>,
    pub valid_until: DateTime<Utc>,
    pub submission: Option<SubmissionRecord>,
    pub approval: Option<ApprovalRecord>,
    pub acceptance: Option<AcceptanceRecord>,
    pub win_analysis: Option<WinAnalysis>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub creator_id: UserId,
    pub customer_id: Option<CustomerId>,
    pub status: QuoteStatus,
    lines: Vec<QuoteLine>,
    totals: QuoteTotals,
    pub revision_number: u32,
    pub parent_quote_id: Option<QuoteId>,
    pub valid_until: DateTime<Utc>,
    pub submission: Option<SubmissionRecord>,
    pub approval: Option<ApprovalRecord>,
    pub acceptance: Option<AcceptanceRecord>,
    win_analysis: Option<WinAnalysis>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Builds a first-revision draft from already calculated lines.
    pub fn new_draft(
        creator_id: UserId,
        customer_id: Option<CustomerId>,
        lines: Vec<QuoteLine>,
        validity_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let totals = aggregate(&lines)?;
        Ok(Self {
            id: QuoteId::generate(),
            creator_id,
            customer_id,
            status: QuoteStatus::Draft,
            lines,
            totals,
            revision_number: 1,
            parent_quote_id: None,
            valid_until: now + Duration::days(i64::from(validity_days)),
            submission: None,
            approval: None,
            acceptance: None,
            win_analysis: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Starts a new draft that carries `source`'s lines and totals verbatim.
    pub(crate) fn derived_draft(
        source: &Quote,
        creator_id: UserId,
        validity_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuoteId::generate(),
            creator_id,
            customer_id: source.customer_id.clone(),
            status: QuoteStatus::Draft,
            lines: source.lines.clone(),
            totals: source.totals.clone(),
            revision_number: 1,
            parent_quote_id: None,
            valid_until: now + Duration::days(i64::from(validity_days)),
            submission: None,
            approval: None,
            acceptance: None,
            win_analysis: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn lines(&self) -> &[QuoteLine] {
        &self.lines
    }

    pub fn totals(&self) -> &QuoteTotals {
        &self.totals
    }

    pub fn overall_gm_percent(&self) -> Decimal {
        self.totals.overall_gm_percent
    }

    pub fn is_amendment(&self) -> bool {
        self.parent_quote_id.is_some()
    }

    pub fn win_analysis(&self) -> Option<&WinAnalysis> {
        self.win_analysis.as_ref()
    }

    pub fn win_probability(&self) -> Option<u8> {
        self.win_analysis.as_ref().map(|analysis| analysis.score)
    }

    pub fn record_win_analysis(&mut self, analysis: WinAnalysis) {
        self.win_analysis = Some(analysis);
    }

    /// Splits the quote into its header record and line rows for storage.
    pub fn into_stored(self) -> (QuoteHeader, Vec<QuoteLine>) {
        let header = QuoteHeader {
            id: self.id,
            creator_id: self.creator_id,
            customer_id: self.customer_id,
            status: self.status,
            totals: self.totals,
            revision_number: self.revision_number,
            parent_quote_id: self.parent_quote_id,
            valid_until: self.valid_until,
            submission: self.submission,
            approval: self.approval,
            acceptance: self.acceptance,
            win_analysis: self.win_analysis,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        (header, self.lines)
    }

    /// Reassembles a quote written with [`Quote::into_stored`].
    ///
    /// For persistence adapters only: the stored totals are taken as they
    /// were saved and are not recomputed from `lines`.
    pub fn from_stored(header: QuoteHeader, lines: Vec<QuoteLine>) -> Self {
        Self {
            id: header.id,
            creator_id: header.creator_id,
            customer_id: header.customer_id,
            status: header.status,
            lines,
            totals: header.totals,
            revision_number: header.revision_number,
            parent_quote_id: header.parent_quote_id,
            valid_until: header.valid_until,
            submission: header.submission,
            approval: header.approval,
            acceptance: header.acceptance,
            win_analysis: header.win_analysis,
            created_at: header.created_at,
            updated_at: header.updated_at,
        }
    }

    pub(crate) fn clear_win_analysis(&mut self) {
        self.win_analysis = None;
    }

    /// Swaps the full line set and recomputes totals, returning the old lines.
    /// The quote is untouched when the new totals cannot be computed.
    pub(crate) fn replace_lines(
        &mut self,
        lines: Vec<QuoteLine>,
    ) -> Result<(Vec<QuoteLine>, QuoteTotals), CoreError> {
        let totals = aggregate(&lines)?;
        let previous_lines = std::mem::replace(&mut self.lines, lines);
        let previous_totals = std::mem::replace(&mut self.totals, totals);
        Ok((previous_lines, previous_totals))
    }
}
