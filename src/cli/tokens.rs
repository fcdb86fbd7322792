//! token list / add / default.

use super::{report_backend, App};
use chrono::{TimeZone, Utc};
use tmcloud::auth::store_token;
use tmcloud::{Error, Result};

pub fn list(app: &App) -> Result<()> {
    let tokens = app.store.list_credentials();
    if tokens.is_empty() {
        println!("No stored tokens");
        return Ok(());
    }

    for (org_id, credential) in &tokens.tokens {
        let marker = if tokens.default_org() == Some(org_id.as_str()) { "*" } else { " " };
        let expiry = match credential.expires_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
            Some(at) if credential.is_expired() => format!("expired {}", at.format("%Y-%m-%d %H:%M")),
            Some(at) => format!("expires {}", at.format("%Y-%m-%d %H:%M")),
            None => String::new(),
        };
        println!("{} {:<24} {:<36} {}", marker, credential.org_name, org_id, expiry);
    }
    Ok(())
}

pub async fn add(app: &App, token: &str, org: Option<&str>) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Auth("token is empty".to_string()));
    }

    let login = store_token(&app.client, &app.store, token, "Bearer", None, org).await?;

    report_backend(&login.backend);
    for org in &login.organizations {
        println!("Stored token for {} ({})", org.name, org.slug);
    }
    Ok(())
}

pub fn default(app: &App, org: Option<&str>) -> Result<()> {
    let Some(org) = org else {
        match app.store.get_default() {
            Some(org_id) => println!("{}", org_id),
            None => println!("No default organization"),
        }
        return Ok(());
    };

    let org_id = app.org_key(org);
    let backend = app.store.set_default(&org_id)?;
    report_backend(&backend);
    println!("Default organization set to {}", org_id);
    Ok(())
}
