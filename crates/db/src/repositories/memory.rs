use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::info;

use landquote_core::approvals::{deletion_plan, DeletionPlan, DeletionStep};
use landquote_core::domain::customer::{CustomerHistory, CustomerId};
use landquote_core::domain::product::CatalogEntry;
use landquote_core::domain::quote::{Quote, QuoteHeader, QuoteId, QuoteLine};
use landquote_core::domain::revision::QuoteRevision;

use super::{
    CustomerHistoryRepository, ProductRepository, QuoteRepository, RepositoryError,
    RevisionRepository,
};

/// Quote headers, lines and revision history held as separate tables, the
/// way a relational store would keep them.
#[derive(Default)]
struct QuoteTables {
    headers: HashMap<String, QuoteHeader>,
    lines: HashMap<String, Vec<QuoteLine>>,
    revisions: HashMap<String, Vec<QuoteRevision>>,
}

impl QuoteTables {
    fn load(&self, id: &str) -> Option<Quote> {
        let header = self.headers.get(id)?.clone();
        Some(Quote::from_stored(header, self.lines.get(id).cloned().unwrap_or_default()))
    }
}

#[derive(Default)]
pub struct InMemoryQuoteStore {
    tables: RwLock<QuoteTables>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteStore {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.load(&id.0))
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let (header, lines) = quote.into_stored();
        let mut tables = self.tables.write().await;
        tables.lines.insert(header.id.0.clone(), lines);
        tables.headers.insert(header.id.0.clone(), header);
        Ok(())
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut quotes: Vec<Quote> = tables
            .headers
            .values()
            .filter(|header| header.customer_id.as_ref() == Some(customer_id))
            .filter_map(|header| tables.load(&header.id.0))
            .collect();
        quotes.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(quotes)
    }

    async fn delete(&self, id: &QuoteId) -> Result<DeletionPlan, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.headers.contains_key(&id.0) {
            return Err(RepositoryError::NotFound { entity: "quote", id: id.0.clone() });
        }

        let plan = deletion_plan(id);
        for step in &plan.steps {
            match step {
                DeletionStep::Lines => {
                    tables.lines.remove(&id.0);
                }
                DeletionStep::RevisionHistory => {
                    tables.revisions.remove(&id.0);
                }
                DeletionStep::QuoteRecord => {
                    tables.headers.remove(&id.0);
                }
            }
        }

        info!(event_name = "quote.deleted", quote_id = %id, "quote and dependents deleted");
        Ok(plan)
    }

    async fn lineage(&self, id: &QuoteId) -> Result<Vec<QuoteId>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut current = tables
            .headers
            .get(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "quote", id: id.0.clone() })?;

        let mut chain = vec![current.id.clone()];
        let mut seen: HashSet<&str> = HashSet::from([current.id.0.as_str()]);
        while let Some(parent_id) = current.parent_quote_id.as_ref() {
            if !seen.insert(parent_id.0.as_str()) {
                return Err(RepositoryError::Integrity(format!(
                    "quote `{id}` has a cyclic parent chain at `{parent_id}`"
                )));
            }
            // A deleted ancestor ends the walk.
            let Some(parent) = tables.headers.get(&parent_id.0) else {
                break;
            };
            chain.push(parent.id.clone());
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }
}

#[async_trait::async_trait]
impl RevisionRepository for InMemoryQuoteStore {
    async fn append(&self, revision: QuoteRevision) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.headers.contains_key(&revision.quote_id.0) {
            return Err(RepositoryError::NotFound {
                entity: "quote",
                id: revision.quote_id.0.clone(),
            });
        }
        tables.revisions.entry(revision.quote_id.0.clone()).or_default().push(revision);
        Ok(())
    }

    async fn list_for_quote(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<QuoteRevision>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.revisions.get(&quote_id.0).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl CustomerHistoryRepository for InMemoryQuoteStore {
    async fn history_for(
        &self,
        customer_id: &CustomerId,
    ) -> Result<CustomerHistory, RepositoryError> {
        let quotes = self.list_for_customer(customer_id).await?;
        Ok(quotes.into_iter().fold(CustomerHistory::new(customer_id.clone()), |history, quote| {
            history.with_quote(quote.id, quote.status)
        }))
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, CatalogEntry>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_part_number(
        &self,
        part_number: &str,
    ) -> Result<Option<CatalogEntry>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(part_number.trim()).cloned())
    }

    async fn save(&self, entry: CatalogEntry) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(entry.part_number.trim().to_owned(), entry);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<CatalogEntry>, RepositoryError> {
        let products = self.products.read().await;
        let mut entries: Vec<CatalogEntry> = products.values().cloned().collect();
        entries.sort_by(|left, right| left.part_number.cmp(&right.part_number));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use landquote_core::approvals::DeletionStep;
    use landquote_core::cpq::calculate_lines;
    use landquote_core::domain::customer::CustomerId;
    use landquote_core::domain::product::{CatalogEntry, ProductCatalog, StockStatus};
    use landquote_core::domain::quote::{LineInput, Quote, QuoteId, QuoteStatus, UserId};
    use landquote_core::domain::revision::QuoteRevision;

    use crate::repositories::{
        CustomerHistoryRepository, InMemoryProductRepository, InMemoryQuoteStore,
        ProductRepository, QuoteRepository, RepositoryError, RevisionRepository,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 14, 10, 0, 0).single().expect("valid timestamp")
    }

    fn quote_for(customer: &str, created_at: DateTime<Utc>) -> Quote {
        let lines = calculate_lines(
            &[LineInput::new(Decimal::new(4_250, 2), "USD", 4, Decimal::new(1_835, 2))
                .with_part_number("VLV-25")],
            Decimal::new(15, 2),
        )
        .expect("valid line");
        Quote::new_draft(
            UserId("rep-1".to_owned()),
            Some(CustomerId(customer.to_owned())),
            lines,
            30,
            created_at,
        )
        .expect("totals in range")
    }

    fn amendment_of(parent: &Quote) -> Quote {
        let mut child = quote_for("acme", now());
        child.revision_number = parent.revision_number + 1;
        child.parent_quote_id = Some(parent.id.clone());
        child
    }

    fn revision_for(quote: &Quote) -> QuoteRevision {
        QuoteRevision {
            quote_id: quote.id.clone(),
            revision_number: quote.revision_number,
            status_before: QuoteStatus::Draft,
            lines: quote.lines().to_vec(),
            totals: quote.totals().clone(),
            edited_by: UserId("rep-1".to_owned()),
            recorded_at: now(),
        }
    }

    #[tokio::test]
    async fn saved_quote_is_reassembled_with_lines_and_stored_totals() {
        let store = InMemoryQuoteStore::default();
        let quote = quote_for("acme", now());

        store.save(quote.clone()).await.expect("save quote");
        let found = store.find_by_id(&quote.id).await.expect("find quote");

        assert_eq!(found, Some(quote));
        assert_eq!(store.find_by_id(&QuoteId("Q-none".to_owned())).await.expect("find"), None);
    }

    #[tokio::test]
    async fn delete_removes_lines_and_revisions_before_the_quote() {
        let store = InMemoryQuoteStore::default();
        let quote = quote_for("acme", now());
        store.save(quote.clone()).await.expect("save quote");
        store.append(revision_for(&quote)).await.expect("append revision");

        let plan = store.delete(&quote.id).await.expect("delete quote");

        assert_eq!(
            plan.steps,
            vec![DeletionStep::Lines, DeletionStep::RevisionHistory, DeletionStep::QuoteRecord]
        );
        assert_eq!(store.find_by_id(&quote.id).await.expect("find"), None);
        assert!(store.list_for_quote(&quote.id).await.expect("revisions").is_empty());

        let again = store.delete(&quote.id).await.expect_err("already deleted");
        assert!(matches!(again, RepositoryError::NotFound { entity: "quote", .. }));
    }

    #[tokio::test]
    async fn revisions_are_append_only_per_quote() {
        let store = InMemoryQuoteStore::default();
        let quote = quote_for("acme", now());
        let orphan = quote_for("acme", now());
        store.save(quote.clone()).await.expect("save quote");

        store.append(revision_for(&quote)).await.expect("first revision");
        store.append(revision_for(&quote)).await.expect("second revision");
        let error = store.append(revision_for(&orphan)).await.expect_err("unknown quote");

        assert_eq!(store.list_for_quote(&quote.id).await.expect("revisions").len(), 2);
        assert!(matches!(error, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn lineage_walks_parents_to_the_root() {
        let store = InMemoryQuoteStore::default();
        let root = quote_for("acme", now());
        let second = amendment_of(&root);
        let third = amendment_of(&second);
        for quote in [&root, &second, &third] {
            store.save(quote.clone()).await.expect("save quote");
        }

        let chain = store.lineage(&third.id).await.expect("lineage");

        assert_eq!(chain, vec![root.id.clone(), second.id.clone(), third.id.clone()]);
        assert_eq!(store.lineage(&root.id).await.expect("lineage"), vec![root.id.clone()]);
    }

    #[tokio::test]
    async fn lineage_rejects_cycles() {
        let store = InMemoryQuoteStore::default();
        let mut first = quote_for("acme", now());
        let mut second = quote_for("acme", now());
        first.parent_quote_id = Some(second.id.clone());
        second.parent_quote_id = Some(first.id.clone());
        store.save(first.clone()).await.expect("save");
        store.save(second).await.expect("save");

        let error = store.lineage(&first.id).await.expect_err("cycle");

        assert!(matches!(error, RepositoryError::Integrity(_)));
    }

    #[tokio::test]
    async fn customer_history_reflects_stored_statuses() {
        let store = InMemoryQuoteStore::default();
        let mut accepted = quote_for("acme", now() - Duration::days(10));
        accepted.status = QuoteStatus::Accepted;
        let open = quote_for("acme", now());
        store.save(accepted.clone()).await.expect("save");
        store.save(open.clone()).await.expect("save");
        store.save(quote_for("globex", now())).await.expect("save");

        let listed = store.list_for_customer(&CustomerId("acme".to_owned())).await.expect("list");
        let history =
            store.history_for(&CustomerId("acme".to_owned())).await.expect("history");

        assert_eq!(listed.first().map(|quote| &quote.id), Some(&accepted.id));
        assert_eq!(history.quotes.len(), 2);
        assert!(history.has_accepted_quote_other_than(&open.id));
        assert!(!history.has_accepted_quote_other_than(&accepted.id));
    }

    #[tokio::test]
    async fn product_snapshot_serves_catalog_lookups() {
        let repo = InMemoryProductRepository::default();
        repo.save(CatalogEntry {
            part_number: "VLV-25".to_owned(),
            name: "Ball valve 25mm".to_owned(),
            stock_status: StockStatus::InStock,
        })
        .await
        .expect("save product");

        let found = repo.find_by_part_number(" VLV-25 ").await.expect("find product");
        let snapshot = repo.snapshot().await.expect("snapshot");

        assert_eq!(found.map(|entry| entry.stock_status), Some(StockStatus::InStock));
        assert_eq!(snapshot.stock_status("VLV-25"), Some(StockStatus::InStock));
        assert_eq!(snapshot.stock_status("VLV-99"), None);
    }
}
