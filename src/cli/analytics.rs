use super::App;
use super::ui;
use crate::core::analytics::{AnalyticsViews, CategoryAggregate};
use crate::core::filter::DateFilter;
use crate::core::selector::AnalyticsSelector;
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;

fn category_table(title: &str, aggregates: &[CategoryAggregate], symbol: &str) -> String {
    if aggregates.is_empty() {
        return format!(
            "{}\n{}",
            ui::style_text(title, ui::StyleType::Title),
            ui::style_text("No data", ui::StyleType::Subtle)
        );
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Category"), ui::header_cell("Total")]);
    for aggregate in aggregates {
        table.add_row(vec![
            Cell::new(&aggregate.name),
            ui::total_cell(aggregate.value, symbol),
        ]);
    }
    format!("{}\n{}", ui::style_text(title, ui::StyleType::Title), table)
}

impl AnalyticsViews {
    pub fn display_as_tables(&self, symbol: &str) -> Vec<String> {
        let mut trends = ui::new_styled_table();
        trends.set_header(vec![
            ui::header_cell("Day"),
            ui::header_cell("Income"),
            ui::header_cell("Expense"),
        ]);
        for point in &self.trends {
            trends.add_row(vec![
                Cell::new(&point.date),
                ui::total_cell(point.income, symbol),
                ui::total_cell(point.expense, symbol),
            ]);
        }
        let trends = if self.trends.is_empty() {
            ui::style_text("No data", ui::StyleType::Subtle)
        } else {
            trends.to_string()
        };

        vec![
            category_table("Income by category", &self.income, symbol),
            category_table("Expenses by category", &self.expense, symbol),
            format!("{}\n{}", ui::style_text("Trends", ui::StyleType::Title), trends),
        ]
    }
}

pub async fn run(app: &App, filter: DateFilter) -> Result<()> {
    let (user, snapshot) = app.load().await?;
    let selector = AnalyticsSelector::new();
    let views = selector.select(&snapshot, filter, Utc::now()).await;

    for (i, section) in views
        .display_as_tables(&user.currency_symbol)
        .iter()
        .enumerate()
    {
        if i > 0 {
            ui::print_separator();
        }
        println!("{section}");
    }
    Ok(())
}
