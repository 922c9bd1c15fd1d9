use super::App;
use super::ui;
use crate::core::account::{User, save_profile};
use crate::core::currency;
use crate::core::error::AuthAction;
use anyhow::{Result, anyhow};
use comfy_table::Cell;

impl User {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
        table.add_row(vec![Cell::new("User"), Cell::new(&self.uid)]);
        table.add_row(vec![
            Cell::new("Email"),
            ui::format_optional_cell(self.email.as_deref(), str::to_string),
        ]);
        table.add_row(vec![
            Cell::new("Name"),
            ui::format_optional_cell(self.display_name.as_deref(), str::to_string),
        ]);
        table.add_row(vec![
            Cell::new("Currency"),
            Cell::new(format!("{} ({})", self.currency, self.currency_symbol)),
        ]);
        table.to_string()
    }
}

pub async fn login(app: &App, email: &str, password: &str) -> Result<()> {
    let user = app
        .account_service()?
        .login(email, password)
        .await
        .map_err(|e| anyhow!(e.user_message(AuthAction::Login)))?;
    println!("{}", user.display_as_table());
    Ok(())
}

pub async fn register(app: &App, name: &str, email: &str, password: &str) -> Result<()> {
    let user = app
        .account_service()?
        .register(name, email, password)
        .await
        .map_err(|e| anyhow!(e.user_message(AuthAction::Register)))?;
    println!("{}", user.display_as_table());
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    app.account_service()?
        .logout()
        .await
        .map_err(|e| anyhow!(e.user_message(AuthAction::Logout)))
}

/// Shows the profile, or changes it when a name or currency is given.
pub async fn profile(app: &App, name: Option<String>, currency_code: Option<String>) -> Result<()> {
    let user = app.current_user().await?;
    if name.is_none() && currency_code.is_none() {
        println!("{}", user.display_as_table());
        return Ok(());
    }

    let currency = currency::parse(currency_code.as_deref().unwrap_or(&user.currency))?;
    let name = name.or(user.display_name.clone()).unwrap_or_default();

    let updated = match &app.accounts {
        Some(service) => service
            .update_profile(&name, currency)
            .await
            .map_err(|e| anyhow!(e.user_message(AuthAction::UpdateProfile)))?,
        None => {
            save_profile(app.documents.as_ref(), &user.uid, &name, currency)
                .await
                .map_err(|e| anyhow!("Failed to update profile: {e}"))?;
            User {
                display_name: Some(name),
                currency: currency.code.to_string(),
                currency_symbol: currency.symbol.to_string(),
                ..user
            }
        }
    };
    println!("{}", updated.display_as_table());
    Ok(())
}
