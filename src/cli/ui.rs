use crate::core::notify::{NotificationKind, NotificationSink};
use crate::core::transaction::TransactionKind;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(Cell::new("N/A").fg(Color::DarkGrey), |v| {
        Cell::new(format_fn(v))
    })
}

pub fn format_amount(amount: Decimal, symbol: &str) -> String {
    format!("{amount:.2} {symbol}")
}

/// Right-aligned amount, green for income and red for expenses.
pub fn amount_cell(amount: Decimal, kind: TransactionKind, symbol: &str) -> Cell {
    let (sign, color) = match kind {
        TransactionKind::Income => ("+", Color::Green),
        TransactionKind::Expense => ("-", Color::Red),
    };
    Cell::new(format!("{sign}{}", format_amount(amount, symbol)))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// Plain right-aligned amount for aggregate tables.
pub fn total_cell(amount: Decimal, symbol: &str) -> Cell {
    Cell::new(format_amount(amount, symbol)).set_alignment(CellAlignment::Right)
}

/// Creates a ticking spinner shown while a request is in flight.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}

/// Shows notifications on stderr. An info notification starts a spinner
/// that the next success or error replaces.
#[derive(Default)]
pub struct ConsoleNotifier {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
        match kind {
            NotificationKind::Info => *spinner = Some(new_spinner(message)),
            NotificationKind::Success => eprintln!("{} {}", style("✔").green(), message),
            NotificationKind::Error => eprintln!("{} {}", style("✘").red(), style(message).red()),
        }
    }
}

impl Drop for ConsoleNotifier {
    fn drop(&mut self) {
        if let Some(pb) = self
            .spinner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_and_clear();
        }
    }
}
