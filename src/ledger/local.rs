use std::path::{Path, PathBuf};
use tokio::fs;

use super::{decode_rows, encode_rows, Country, Layout, LocationRow};

/// A ledger kept as a CSV file on disk.
#[derive(Debug)]
pub struct FileStore(PathBuf);

impl FileStore {
    pub async fn open(p: impl AsRef<Path>) -> crate::Result<Self> {
        let p = p.as_ref();
        if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        Ok(Self(p.to_owned()))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// `<stem>_backup.csv` next to the ledger.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.sibling("_backup.csv")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self
            .0
            .file_stem()
            .map_or_else(|| "ledger".into(), |s| s.to_string_lossy());
        self.0.with_file_name(format!("{stem}{suffix}"))
    }

    pub async fn load(
        &self,
        default: Option<Country>,
    ) -> crate::Result<Option<(Layout, Vec<LocationRow>)>> {
        if fs::try_exists(&self.0).await? {
            let bytes = fs::read(&self.0).await?;
            decode_rows(&bytes, default).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Writes to a temporary sibling first so a crash never leaves half a ledger.
    pub async fn save(&self, layout: &Layout, rows: &[LocationRow]) -> crate::Result<()> {
        let bytes = encode_rows(layout, rows)?;
        let tmp = self.sibling(".csv.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &self.0).await?;
        Ok(())
    }

    pub async fn backup(&self, layout: &Layout, rows: &[LocationRow]) -> crate::Result<()> {
        let bytes = encode_rows(layout, rows)?;
        fs::write(self.backup_path(), bytes).await?;
        Ok(())
    }
}
