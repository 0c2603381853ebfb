//! Path containment checks.
//!
//! Every filesystem-facing boundary runs [`validate`] against the root as it
//! is configured *right now*; results are never cached because the root may
//! be reloaded between requests.

use std::path::{Component, Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Resolve `requested` against `root` and require the result to be the root
/// itself or a descendant of it.
///
/// Relative paths are joined onto the root. Symlinks in the existing part of
/// the path are followed. A target that does not exist yet is resolved by
/// canonicalizing its longest existing ancestor; the caller decides whether
/// absence is an error.
pub fn validate(root: &Path, requested: &Path) -> Result<PathBuf> {
    let root = canonical_root(root)?;

    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let resolved = resolve(&joined)?;
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        tracing::warn!(
            requested = %requested.display(),
            resolved = %resolved.display(),
            "Path escapes media root"
        );
        Err(Error::outside_sandbox(requested))
    }
}

/// Like [`validate`], with an unset root reported as `MisconfiguredRoot`.
pub fn validate_in(root: Option<&Path>, requested: &Path) -> Result<PathBuf> {
    let root = root.ok_or_else(|| Error::MisconfiguredRoot("media root is not set".into()))?;
    validate(root, requested)
}

/// Canonicalize the sandbox root itself.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = root.canonicalize().map_err(|e| {
        Error::MisconfiguredRoot(format!("media root {} is unusable: {e}", root.display()))
    })?;
    if !canonical.is_dir() {
        return Err(Error::MisconfiguredRoot(format!(
            "media root {} is not a directory",
            root.display()
        )));
    }
    Ok(canonical)
}

/// Canonicalize `path`, tolerating a non-existent tail.
fn resolve(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }

    // Walk up to the deepest ancestor that exists, remembering the tail.
    let mut existing = path.to_path_buf();
    let mut tail: Vec<Component<'_>> = Vec::new();
    let mut components = path.components().collect::<Vec<_>>();
    loop {
        if existing.exists() {
            break;
        }
        match components.pop() {
            Some(c) => {
                tail.push(c);
                existing.pop();
            }
            None => break,
        }
    }
    tail.reverse();

    let mut resolved = existing.canonicalize()?;
    for component in tail {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => resolved.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Ok(resolved)
}
