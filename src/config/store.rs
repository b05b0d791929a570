use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::section::{FieldValue, Section};
use crate::utils::error::{AppError, AppResult};

/// On-disk document shape: the ordered section list
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    sections: Vec<Section>,
}

/// Persisted configuration store organized as named sections with
/// multi-valued fields.
///
/// Mutations (`set`, `unset`, `add`) are staged in memory and committed as a
/// whole by `save`. `load` must precede any read because another actor may
/// have committed changes since the last call; it replaces the in-memory
/// state, discarding anything staged but not saved.
pub struct ConfigStore {
    /// Path of the store file
    path: PathBuf,

    /// In-memory section list, including staged changes
    sections: Vec<Section>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sections: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the store from disk, replacing the in-memory state.
    /// A missing file is an empty store, not an error.
    pub async fn load(&mut self) -> AppResult<()> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let doc: StoreDocument = serde_json::from_slice(&bytes)?;
                self.sections = doc.sections;
                debug!("Loaded {} sections from {}", self.sections.len(), self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file {} not found, starting empty", self.path.display());
                self.sections = Vec::new();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Commit all staged changes since the last save.
    ///
    /// The document is written to a temporary file in the store's directory
    /// and renamed over the target, so a failed save leaves the previous
    /// on-disk state intact.
    pub async fn save(&mut self) -> AppResult<()> {
        let doc = StoreDocument {
            sections: self.sections.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::StoreError(format!("failed to commit {}: {}", self.path.display(), e)))?;

        info!("Saved {} sections to {}", self.sections.len(), self.path.display());
        Ok(())
    }

    /// Sections of a given kind, in store order
    pub fn sections(&self, kind: &str) -> Vec<&Section> {
        self.sections.iter().filter(|s| s.kind == kind).collect()
    }

    /// First section of `kind` whose `name` field equals `name`
    pub fn find_by_name(&self, kind: &str, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.kind == kind && s.get_str("name") == Some(name))
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn get(&self, section_id: &str, field: &str) -> Option<&FieldValue> {
        self.section(section_id).and_then(|s| s.get(field))
    }

    pub fn set(&mut self, section_id: &str, field: &str, value: FieldValue) -> AppResult<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| AppError::UnknownSection(section_id.to_string()))?;
        section.set(field, value);
        Ok(())
    }

    pub fn unset(&mut self, section_id: &str, field: &str) -> AppResult<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| AppError::UnknownSection(section_id.to_string()))?;
        section.unset(field);
        Ok(())
    }

    /// Append a new empty section of `kind` and return its generated id
    pub fn add(&mut self, kind: &str) -> String {
        let id = Self::generate_id();
        self.sections.push(Section::new(id.clone(), kind));
        id
    }

    fn generate_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("cfg{}", &hex[..6])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("geomate.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.load().await.expect("load");
        assert!(store.sections("geo_filter").is_empty());
    }

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.load().await.expect("load");

        let id = store.add("geo_filter");
        store.set(&id, "name", FieldValue::single("EU")).expect("set");
        store
            .set(&id, "allowed_region", FieldValue::list(vec!["r1:poly1".into()]))
            .expect("set");
        store.save().await.expect("save");

        let mut reread = store_in(&dir);
        reread.load().await.expect("reload");
        let section = reread.find_by_name("geo_filter", "EU").expect("section");
        assert_eq!(section.id, id);
        assert_eq!(section.get_list("allowed_region"), vec!["r1:poly1".to_string()]);
    }

    #[tokio::test]
    async fn load_discards_staged_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.load().await.expect("load");
        let id = store.add("geo_filter");
        store.set(&id, "name", FieldValue::single("EU")).expect("set");
        store.save().await.expect("save");

        store.set(&id, "name", FieldValue::single("US")).expect("set");
        store.load().await.expect("reload");
        assert!(store.find_by_name("geo_filter", "EU").is_some());
        assert!(store.find_by_name("geo_filter", "US").is_none());
    }

    #[tokio::test]
    async fn unset_removes_the_field_entirely() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.load().await.expect("load");
        let id = store.add("geo_filter");
        store
            .set(&id, "allowed_region", FieldValue::list(vec!["r1:p".into()]))
            .expect("set");
        store.unset(&id, "allowed_region").expect("unset");
        assert!(store.get(&id, "allowed_region").is_none());
    }

    #[tokio::test]
    async fn set_on_unknown_section_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.load().await.expect("load");
        let err = store.set("cfgnope", "name", FieldValue::single("x")).unwrap_err();
        assert!(matches!(err, AppError::UnknownSection(_)));
    }

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let a = ConfigStore::generate_id();
        let b = ConfigStore::generate_id();
        assert!(a.starts_with("cfg") && a.len() == 9);
        assert_ne!(a, b);
    }
}
