pub mod approvals;
pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod rates;
pub mod scoring;

pub use approvals::{ApprovalEngine, Notification, NotificationKind, Notifier, Recipient, SubmitOutcome};
pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink};
pub use cpq::{aggregate, calculate_line, calculate_lines, MarginHealth, QuoteTotals};
pub use domain::customer::{CustomerHistory, CustomerId};
pub use domain::product::{CatalogEntry, ProductCatalog, StockStatus};
pub use domain::quote::{LineInput, Quote, QuoteHeader, QuoteId, QuoteLine, QuoteStatus, UserId};
pub use domain::revision::QuoteRevision;
pub use domain::win::{WinAnalysis, WinFactor, WinFactorKind};
pub use errors::{ApplicationError, CoreError, ErrorKind, InterfaceError};
pub use flows::EditAuthority;
pub use rates::{MarginThresholds, RateResolver, RateSnapshot};
pub use scoring::WinScorer;
