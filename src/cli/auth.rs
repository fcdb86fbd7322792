//! login, logout and whoami.

use super::{report_backend, App};
use std::sync::Arc;
use tmcloud::auth::{store_token, DeviceAuthenticator};
use tmcloud::{Error, Result};

pub async fn login(app: &App, org: Option<&str>) -> Result<()> {
    let authenticator = DeviceAuthenticator::new(Arc::clone(&app.transport));
    let session = authenticator.request_authorization().await?;

    println!("To sign in, open {}", session.verification_url);
    println!("and enter the code: {}", session.user_code);
    eprint!("Waiting for approval");

    let token = authenticator.poll_for_credential(&session).await;
    eprintln!();
    let token = token?;

    let login = store_token(
        &app.client,
        &app.store,
        &token.access_token,
        &token.token_type,
        token.expires_in,
        org,
    )
    .await?;

    report_backend(&login.backend);
    println!("Logged in as {}", login.email);
    for org in &login.organizations {
        println!("  {} ({})", org.name, org.slug);
    }
    Ok(())
}

pub fn logout(app: &App, org: Option<&str>, all: bool) -> Result<()> {
    if all {
        let backend = app.store.remove_all()?;
        report_backend(&backend);
        println!("Removed all stored tokens");
        return Ok(());
    }

    let org_id = match org {
        Some(org) => app.org_key(org),
        None => app.store.get_default().ok_or(Error::NoToken { org: None })?,
    };

    let backend = app.store.remove_credential(&org_id)?;
    report_backend(&backend);
    println!("Removed token for {}", org_id);

    if let Some(default) = app.store.get_default() {
        println!("Default organization is now {}", default);
    }
    Ok(())
}

pub async fn whoami(app: &App, org: Option<&str>) -> Result<()> {
    let (org_id, credential) = app.credential(org).await?;

    if credential.is_expired() {
        eprintln!("Stored token for {} has expired, checking with the service", credential.org_name);
    }

    let me = match app.client.whoami(&credential.access_token).await {
        Ok(me) => me,
        Err(Error::Auth(message)) => {
            return Err(Error::Auth(format!("token for {} was rejected: {}", org_id, message)))
        }
        Err(e) => return Err(e),
    };

    if me.user.full_name.is_empty() {
        println!("{}", me.user.email);
    } else {
        println!("{} <{}>", me.user.full_name, me.user.email);
    }
    for membership in &me.organizations {
        let marker = if membership.organization.id == org_id { "*" } else { " " };
        println!(
            "{} {} ({}) {}",
            marker, membership.organization.name, membership.organization.slug, membership.role
        );
    }
    Ok(())
}
