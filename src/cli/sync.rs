//! documents, validate and push.

use super::App;
use std::path::Path;
use tmcloud::sync::{PushAction, PushOptions};
use tmcloud::Result;

pub async fn documents(app: &App, org: Option<&str>) -> Result<()> {
    let (org_id, credential) = app.credential(org).await?;
    let documents = app
        .client
        .list_documents(&credential.access_token, &org_id)
        .await?;

    if documents.is_empty() {
        println!("No documents in {}", credential.org_name);
        return Ok(());
    }
    for document in documents {
        println!("{:<32} {:<32} {}", document.slug, document.name, document.status);
    }
    Ok(())
}

pub async fn validate(app: &App, file: &Path, org: Option<&str>) -> Result<()> {
    let (_, credential) = app.credential(org).await?;
    let outcome = app
        .reconciler()
        .validate_document(&credential, file)
        .await?;

    println!("{} is valid for organization {}", file.display(), outcome.organization_id);
    match (&outcome.document, &outcome.version, &outcome.stale_version) {
        (None, _, _) => println!("No document declared yet, `tmcloud push` will create one"),
        (Some(slug), Some(version), _) => println!("{} is up to date at version {}", slug, version),
        (Some(slug), None, Some(stale)) => println!(
            "{} matches version {} of {}, which is no longer current",
            file.display(),
            stale,
            slug
        ),
        (Some(slug), None, None) => println!("Local changes not yet pushed to {}", slug),
    }
    Ok(())
}

pub async fn push(app: &App, file: &Path, org: Option<&str>, update_local: bool) -> Result<()> {
    let (_, credential) = app.credential(org).await?;
    let report = app
        .reconciler()
        .push(&credential, file, PushOptions { update_local })
        .await?;

    let version = report.version.as_deref().unwrap_or("?");
    match report.action {
        PushAction::Created => {
            println!("Created {} at version {}", report.slug, version);
            if report.rewrote_local {
                println!("Updated {} with document = \"{}\"", file.display(), report.slug);
            } else if !update_local {
                println!(
                    "Add document = \"{}\" to the backend block to push updates",
                    report.slug
                );
            }
        }
        PushAction::Uploaded => {
            if let Some(stale) = &report.stale_version {
                eprintln!("Warning: local content matched superseded version {}", stale);
            }
            println!("Uploaded {} as version {}", report.slug, version);
        }
        PushAction::UpToDate => println!("{} is already up to date at version {}", report.slug, version),
    }
    Ok(())
}
