use super::App;
use super::ui;
use crate::core::analytics::{Summary, summarize};
use crate::core::filter::{DateFilter, filter_by_date};
use anyhow::Result;
use chrono::Utc;

impl Summary {
    pub fn display_as_table(&self, symbol: &str) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Income"), ui::header_cell("Expenses")]);
        table.add_row(vec![
            ui::total_cell(self.income, symbol),
            ui::total_cell(self.expenses, symbol),
        ]);

        let balance_style = if self.balance.is_sign_negative() {
            ui::StyleType::Error
        } else {
            ui::StyleType::TotalValue
        };
        format!(
            "{}\n\n{}: {}",
            table,
            ui::style_text("Balance", ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(self.balance, symbol), balance_style)
        )
    }
}

pub async fn run(app: &App, filter: DateFilter) -> Result<()> {
    let (user, snapshot) = app.load().await?;
    let visible = filter_by_date(snapshot.transactions(), filter, Utc::now());
    let summary = summarize(visible.iter().copied());

    let name = user.display_name.as_deref().unwrap_or(&user.uid);
    println!(
        "Summary for {} ({})\n",
        ui::style_text(name, ui::StyleType::Title),
        filter
    );
    println!("{}", summary.display_as_table(&user.currency_symbol));
    Ok(())
}
