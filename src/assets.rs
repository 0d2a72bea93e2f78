use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::snapshot::AssetId;

/// Identifier of an album (a subset of the library)
pub type AlbumId = String;

/// One media item as reported by an asset source
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: AssetId,
    pub creation_date: Option<DateTime<Utc>>,
    pub byte_size: i64,
}

/// Inclusive range of creation dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(anyhow!("Date range ends ({end}) before it starts ({start})"));
        }
        Ok(Self { start, end })
    }

    /// Assets without a creation date are never inside a range
    pub fn contains(&self, date: Option<DateTime<Utc>>) -> bool {
        date.is_some_and(|d| d >= self.start && d <= self.end)
    }
}

/// The media library the decisions refer to
pub trait AssetSource {
    /// All assets, or only those in `album`
    fn list_assets(&self, album: Option<&str>) -> Result<Vec<Asset>>;

    /// Remove the given assets; fails without deleting anything if any ID is unknown
    ///
    /// An I/O error partway through can leave earlier IDs removed. Callers
    /// that record each removal pass one ID per call.
    fn delete_assets(&self, ids: &[AssetId]) -> Result<()>;
}

/// Asset source backed by a directory tree
///
/// Every regular, non-hidden file is an asset whose ID is its path relative
/// to the root with `/` separators. Top-level subdirectories are albums.
#[derive(Debug, Clone)]
pub struct DirectoryAssetSource {
    root: PathBuf,
}

impl DirectoryAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the top-level subdirectories
    pub fn list_albums(&self) -> Result<Vec<AlbumId>> {
        let mut albums = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read library: {}", self.root.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_dir() && !name.starts_with('.') {
                albums.push(name);
            }
        }
        albums.sort();
        Ok(albums)
    }

    /// Map an asset ID back to a file path, rejecting anything outside the root
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if id.is_empty() || escapes {
            return Err(anyhow!("Invalid asset ID: {id}"));
        }
        Ok(self.root.join(relative))
    }

    fn asset_for(&self, path: &Path) -> Result<Asset> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read metadata: {}", path.display()))?;

        let id = path
            .strip_prefix(&self.root)
            .with_context(|| format!("Asset outside library root: {}", path.display()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let creation_date = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(Asset {
            id,
            creation_date,
            byte_size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
        })
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

impl AssetSource for DirectoryAssetSource {
    fn list_assets(&self, album: Option<&str>) -> Result<Vec<Asset>> {
        let base = match album {
            Some(album) => self.resolve(album)?,
            None => self.root.clone(),
        };

        if !base.is_dir() {
            return Err(anyhow!("Album not found: {}", base.display()));
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(&base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
            if entry.file_type().is_file() {
                assets.push(self.asset_for(entry.path())?);
            }
        }

        log::debug!("Listed {} asset(s) under {}", assets.len(), base.display());
        Ok(assets)
    }

    fn delete_assets(&self, ids: &[AssetId]) -> Result<()> {
        let paths = ids
            .iter()
            .map(|id| {
                let path = self.resolve(id)?;
                if !path.is_file() {
                    return Err(anyhow!("Asset not found: {id}"));
                }
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;

        for path in paths {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete asset: {}", path.display()))?;
        }

        log::info!("Deleted {} asset(s)", ids.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn library() -> (TempDir, DirectoryAssetSource) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("Holiday")).unwrap();
        fs::create_dir_all(root.join(".thumbnails")).unwrap();
        fs::write(root.join("IMG_0001.jpg"), vec![0u8; 10]).unwrap();
        fs::write(root.join("Holiday").join("IMG_0002.jpg"), vec![0u8; 20]).unwrap();
        fs::write(root.join(".thumbnails").join("t.jpg"), b"x").unwrap();
        fs::write(root.join(".DS_Store"), b"x").unwrap();
        let source = DirectoryAssetSource::new(root);
        (temp, source)
    }

    #[test]
    fn test_lists_visible_files_with_relative_ids() {
        let (_temp, source) = library();

        let mut ids: Vec<_> = source
            .list_assets(None)
            .unwrap()
            .into_iter()
            .map(|a| (a.id, a.byte_size))
            .collect();
        ids.sort();

        assert_eq!(
            ids,
            vec![
                ("Holiday/IMG_0002.jpg".to_string(), 20),
                ("IMG_0001.jpg".to_string(), 10)
            ]
        );
    }

    #[test]
    fn test_album_scope_and_listing() {
        let (_temp, source) = library();

        assert_eq!(source.list_albums().unwrap(), vec!["Holiday".to_string()]);
        let album = source.list_assets(Some("Holiday")).unwrap();
        assert_eq!(album.len(), 1);
        assert_eq!(album[0].id, "Holiday/IMG_0002.jpg");
        assert!(source.list_assets(Some("Missing")).is_err());
    }

    #[test]
    fn test_delete_is_all_or_nothing_on_unknown_ids() {
        let (temp, source) = library();

        let err = source
            .delete_assets(&["IMG_0001.jpg".into(), "nope.jpg".into()])
            .unwrap_err();
        assert!(err.to_string().contains("nope.jpg"));
        assert!(temp.path().join("IMG_0001.jpg").exists());

        source.delete_assets(&["IMG_0001.jpg".into()]).unwrap();
        assert!(!temp.path().join("IMG_0001.jpg").exists());
    }

    #[test]
    fn test_ids_cannot_escape_root() {
        let (_temp, source) = library();
        assert!(source.delete_assets(&["../etc/passwd".into()]).is_err());
        assert!(source.delete_assets(&["/etc/passwd".into()]).is_err());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let range = DateRange::new(start, end).unwrap();

        assert!(range.contains(Some(start)));
        assert!(range.contains(Some(end)));
        assert!(!range.contains(Some(end + chrono::Duration::seconds(1))));
        assert!(!range.contains(None));
        assert!(DateRange::new(end, start).is_err());
    }
}
