//! Directory browser.

use std::path::{Path, PathBuf};

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use dr_core::media::has_video_extension;
use dr_core::{sandbox, Error};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    /// Absolute, or relative to the media root. Defaults to the root.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    Video,
}

#[derive(Debug, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub current_path: String,
    pub items: Vec<DirectoryEntry>,
}

/// GET /api/directories?path=
pub async fn list_directory(
    State(ctx): State<AppContext>,
    Query(params): Query<DirectoryQuery>,
) -> Result<Json<DirectoryListing>, AppError> {
    let root = ctx
        .config_store
        .media_root()
        .ok_or_else(|| Error::MisconfiguredRoot("media root is not set".into()))?;

    let requested = params
        .path
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| root.clone());

    let dir = sandbox::validate(&root, &requested)?;
    let canonical_root = sandbox::canonical_root(&root)?;
    let extensions = ctx.config_store.extensions();

    let listing = tokio::task::spawn_blocking(move || read_listing(&canonical_root, &dir, &extensions))
        .await
        .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))??;

    Ok(Json(listing))
}

/// List `dir`: a parent entry unless `dir` is the root, then directories,
/// then videos, each sorted by name. Hidden entries and non-video files are
/// skipped.
pub fn read_listing(root: &Path, dir: &Path, extensions: &[String]) -> dr_core::Result<DirectoryListing> {
    let metadata = std::fs::metadata(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found("directory", dir.display()),
        _ => e.into(),
    })?;
    if !metadata.is_dir() {
        return Err(Error::Validation(format!("'{}' is not a directory", dir.display())));
    }

    let mut directories = Vec::new();
    let mut videos = Vec::new();

    for entry in std::fs::read_dir(dir)?.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        // Follow symlinks; the sandbox rejects escaping targets when opened.
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };

        let item = DirectoryEntry {
            name,
            path: path.to_string_lossy().into_owned(),
            kind: EntryKind::Directory,
        };
        if meta.is_dir() {
            directories.push(item);
        } else if meta.is_file() && has_video_extension(&path, extensions) {
            videos.push(DirectoryEntry {
                kind: EntryKind::Video,
                ..item
            });
        }
    }

    directories.sort_by(|a, b| a.name.cmp(&b.name));
    videos.sort_by(|a, b| a.name.cmp(&b.name));

    let mut items = Vec::with_capacity(directories.len() + videos.len() + 1);
    if dir != root {
        if let Some(parent) = dir.parent() {
            items.push(DirectoryEntry {
                name: "..".into(),
                path: parent.to_string_lossy().into_owned(),
                kind: EntryKind::Directory,
            });
        }
    }
    items.extend(directories);
    items.extend(videos);

    Ok(DirectoryListing {
        current_path: dir.to_string_lossy().into_owned(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::media::DEFAULT_VIDEO_EXTENSIONS;
    use std::fs;

    fn exts() -> Vec<String> {
        DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("shows")).unwrap();
        fs::create_dir_all(root.join("Archive")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("b.mkv"), b"x").unwrap();
        fs::write(root.join("a.MP4"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::write(root.join(".hidden.mp4"), b"x").unwrap();
        (dir, root)
    }

    #[test]
    fn root_listing_orders_directories_before_videos() {
        let (_dir, root) = fixture();
        let listing = read_listing(&root, &root, &exts()).unwrap();

        let names: Vec<&str> = listing.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Archive", "shows", "a.MP4", "b.mkv"]);
        assert_eq!(listing.items[0].kind, EntryKind::Directory);
        assert_eq!(listing.items[3].kind, EntryKind::Video);
    }

    #[test]
    fn subdirectory_gets_parent_entry() {
        let (_dir, root) = fixture();
        let shows = root.join("shows");
        let listing = read_listing(&root, &shows, &exts()).unwrap();

        assert_eq!(listing.items[0].name, "..");
        assert_eq!(listing.items[0].path, root.to_string_lossy());
        assert_eq!(listing.current_path, shows.to_string_lossy());
    }

    #[test]
    fn missing_directory_is_not_found() {
        let (_dir, root) = fixture();
        let err = read_listing(&root, &root.join("nope"), &exts()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn file_is_not_a_directory() {
        let (_dir, root) = fixture();
        let err = read_listing(&root, &root.join("b.mkv"), &exts()).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn entries_serialize_with_type_tag() {
        let entry = DirectoryEntry {
            name: "a.mp4".into(),
            path: "/m/a.mp4".into(),
            kind: EntryKind::Video,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "video");
    }
}
