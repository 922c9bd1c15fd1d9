use super::App;
use super::ui;
use crate::core::filter::{DateFilter, filter_by_date};
use crate::core::ledger::MutationOutcome;
use crate::core::transaction::{Transaction, TransactionDraft, TransactionKind};
use anyhow::{Result, bail};
use chrono::Utc;
use comfy_table::Cell;
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::debug;

/// Fields to change on an existing transaction; `None` keeps the value.
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub kind: Option<TransactionKind>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub date: Option<String>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.amount.is_none() && self.category.is_none() && self.date.is_none()
    }

    pub fn apply_to(self, transaction: &mut Transaction) {
        if let Some(kind) = self.kind {
            transaction.kind = kind;
        }
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }
        if let Some(category) = self.category {
            transaction.category = category.trim().to_string();
        }
        if let Some(date) = self.date {
            transaction.date = date;
        }
    }
}

pub fn render_transactions(transactions: &[&Transaction], symbol: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Type"),
        ui::header_cell("Category"),
        ui::header_cell("Amount"),
        ui::header_cell("ID"),
    ]);

    for tx in transactions {
        let date = tx.date.get(..10).unwrap_or(&tx.date);
        table.add_row(vec![
            Cell::new(date),
            Cell::new(tx.kind),
            Cell::new(&tx.category),
            ui::amount_cell(tx.amount, tx.kind, symbol),
            Cell::new(ui::style_text(&tx.id, ui::StyleType::Subtle)),
        ]);
    }
    table.to_string()
}

pub async fn add(app: &App, draft: TransactionDraft) -> Result<()> {
    draft.validate()?;
    let user = app.current_user().await?;
    let created = app.ledger.create(&user.uid, draft).await?;
    println!(
        "{} {}",
        ui::style_text("Added", ui::StyleType::TotalLabel),
        created.id
    );
    Ok(())
}

pub async fn list(app: &App, filter: DateFilter) -> Result<()> {
    let (user, snapshot) = app.load().await?;
    let visible = filter_by_date(snapshot.transactions(), filter, Utc::now());
    debug!(total = snapshot.transactions().len(), shown = visible.len(), "Listing transactions");

    if visible.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("No transactions for filter '{filter}'"),
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    }
    println!("{}", render_transactions(&visible, &user.currency_symbol));
    Ok(())
}

pub async fn edit(app: &App, id: &str, changes: TransactionChanges) -> Result<()> {
    if changes.is_empty() {
        bail!("Nothing to change; pass at least one of --type, --amount, --category or --date");
    }
    let (_, snapshot) = app.load().await?;
    let Some(mut transaction) = snapshot.find(id).cloned() else {
        bail!("Transaction {} not found", id);
    };
    changes.apply_to(&mut transaction);
    transaction.validate()?;

    match app.ledger.update(transaction).await? {
        MutationOutcome::Applied => Ok(()),
        MutationOutcome::NotFound => bail!("Transaction {} not found", id),
    }
}

/// Deletes every id concurrently and reports each outcome. Fails when any
/// deletion did not happen.
pub async fn delete(app: &App, ids: &[String]) -> Result<()> {
    app.load().await?;

    let outcomes = join_all(ids.iter().map(|id| app.ledger.delete(id))).await;

    let mut missing = Vec::new();
    let mut failed = 0;
    for (id, outcome) in ids.iter().zip(outcomes) {
        match outcome {
            Ok(MutationOutcome::Applied) => debug!(%id, "Deleted"),
            Ok(MutationOutcome::NotFound) => missing.push(id.as_str()),
            Err(_) => failed += 1,
        }
    }

    if !missing.is_empty() {
        bail!("Transaction not found: {}", missing.join(", "));
    }
    if failed > 0 {
        bail!("{} of {} deletions failed", failed, ids.len());
    }
    Ok(())
}
