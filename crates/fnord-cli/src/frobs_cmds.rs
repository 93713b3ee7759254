//! `frobs {list,install}`: discovering and installing external user
//! integrations (§4.3 "frobs").

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::context::AppContext;

pub async fn handle_list(ctx: &AppContext, project: Option<String>) -> Result<()> {
    let frobs_dir = ctx.fnord_home()?.join("frobs");
    let scope = project.unwrap_or_default();
    let frobs = fnord_tools::discover_frobs(&frobs_dir, &scope, &Value::Null);
    if frobs.is_empty() {
        ctx.ui.log("no frobs installed").await;
        return Ok(());
    }
    for frob in &frobs {
        let spec = fnord_tools::Tool::spec(frob);
        println!("{}: {}", spec.name, spec.description);
    }
    Ok(())
}

/// Copies a frob bundle (a local directory carrying `registry.json`,
/// `spec.json`, and an executable `main`) into `~/.fnord/frobs/<name>`.
/// `--global` flips the copied `registry.json`'s `global` field so it is
/// available to every project.
pub async fn handle_install(ctx: &AppContext, source: String, global: bool) -> Result<()> {
    let source_dir = std::path::PathBuf::from(&source);
    let registry_path = source_dir.join("registry.json");
    if !registry_path.exists() || !source_dir.join("spec.json").exists() || !source_dir.join("main").exists() {
        bail!("'{source}' is missing registry.json, spec.json, or main");
    }

    let mut registry: Value = serde_json::from_str(
        &std::fs::read_to_string(&registry_path).context("reading registry.json")?,
    )
    .context("parsing registry.json")?;
    let name = registry
        .get("name")
        .and_then(Value::as_str)
        .context("registry.json missing 'name'")?
        .to_string();
    if global {
        registry["global"] = Value::Bool(true);
    }

    let dest_dir = ctx.fnord_home()?.join("frobs").join(&name);
    copy_dir_recursive(&source_dir, &dest_dir)?;
    std::fs::write(dest_dir.join("registry.json"), serde_json::to_string_pretty(&registry)?)
        .context("writing installed registry.json")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let main_path = dest_dir.join("main");
        let mut perms = std::fs::metadata(&main_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&main_path, perms)?;
    }

    ctx.ui.log(format!("installed frob '{name}'")).await;
    Ok(())
}

fn copy_dir_recursive(src: &std::path::Path, dest: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;
    for entry in std::fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        let dest_path = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)
                .with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}
