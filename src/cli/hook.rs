//! git pre-push hook: gate every push on the pipeline

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First line after the shebang of every hook we write
pub const HOOK_MARKER: &str = "# installed by matrixci";

/// Location of the pre-push hook of `repo`
pub fn hook_path(repo: &Path) -> Result<PathBuf> {
    let git_dir = repo.join(".git");
    if !git_dir.is_dir() {
        bail!("{} is not the root of a git repository", repo.display());
    }
    Ok(git_dir.join("hooks").join("pre-push"))
}

/// The hook body. git feeds one `<local ref> <local sha> <remote ref> <remote sha>`
/// line per pushed ref on stdin; every ref except a deletion gets its own run.
pub fn render_script(run_args: &str) -> String {
    let args = run_args.trim();
    let extra = if args.is_empty() {
        String::new()
    } else {
        format!(" {}", args)
    };
    format!(
        r#"#!/bin/sh
{marker}
# a failing matrix rejects the push
status=0
while read -r local_ref local_sha remote_ref remote_sha; do
    case "$local_sha" in
        *[!0]*) ;;
        *) continue ;;
    esac
    matrixci run --ref "$local_ref" --sha "$local_sha"{extra} </dev/null || status=1
done
exit $status
"#,
        marker = HOOK_MARKER,
        extra = extra
    )
}

fn is_ours(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content.lines().any(|line| line.trim() == HOOK_MARKER))
}

/// Write the hook, refusing to clobber a foreign one unless `force`
pub fn install(repo: &Path, run_args: &str, force: bool) -> Result<PathBuf> {
    let path = hook_path(repo)?;

    if path.exists() && !force && !is_ours(&path)? {
        bail!(
            "{} already exists and was not installed by matrixci (use --force to replace it)",
            path.display()
        );
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(&path, render_script(run_args)).with_context(|| format!("Failed to write {}", path.display()))?;
    make_executable(&path)?;

    info!("Installed pre-push hook at {}", path.display());
    Ok(path)
}

/// Remove our hook. Returns false when there was nothing to remove.
pub fn uninstall(repo: &Path) -> Result<bool> {
    let path = hook_path(repo)?;
    if !path.exists() {
        debug!("No pre-push hook at {}", path.display());
        return Ok(false);
    }
    if !is_ours(&path)? {
        bail!("{} was not installed by matrixci; leaving it alone", path.display());
    }

    fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
    info!("Removed pre-push hook at {}", path.display());
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
