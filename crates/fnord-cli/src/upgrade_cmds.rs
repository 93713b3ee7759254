//! `upgrade`: checks GitHub releases for a newer version and reports it,
//! without replacing the running binary (grounded on the teacher's
//! self-update check, minus the download/replace step it performs).

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Deserialize)]
struct ReleaseInfo {
    tag_name: String,
}

pub async fn handle_upgrade() -> Result<()> {
    let current_version = env!("CARGO_PKG_VERSION");
    println!("current version: v{current_version}");

    let client = reqwest::Client::new();
    let response = client
        .get("https://api.github.com/repos/fnord-cli/fnord/releases/latest")
        .header("User-Agent", "fnord-cli")
        .send()
        .await
        .context("fetching latest release")?;

    if !response.status().is_success() {
        println!("could not check for updates (GitHub returned {})", response.status());
        return Ok(());
    }

    let release: ReleaseInfo = response.json().await.context("parsing release info")?;
    let latest = release.tag_name.strip_prefix('v').unwrap_or(&release.tag_name);

    if latest == current_version {
        println!("already up to date");
    } else {
        println!("update available: v{current_version} -> v{latest}");
    }
    Ok(())
}
