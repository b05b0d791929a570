use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::config::global::{read_global, write_global, GlobalSettings};
use crate::config::section::FieldValue;
use crate::config::store::ConfigStore;
use crate::engine::region::RegionToken;
use crate::models::filter::{GeoFilter, FilterSettings, Protocol};
use crate::utils::error::AppResult;

/// Section kind of persisted geo-filters
pub const FILTER_KIND: &str = "geo_filter";

/// Field holding the ordered region list
const REGION_FIELD: &str = "allowed_region";

/// One "draw this region" notification for the map surface, produced by
/// [`Reconciler::load_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionNotice {
    pub name: String,
    pub region: RegionToken,
}

/// How a region edit identifies the shape it replaces.
///
/// The map surface does not always supply the prior token on "region edited"
/// events; both calling conventions are resolved by one lookup
/// ([`resolve_edit`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    /// The prior token was supplied verbatim
    ByExactToken { old: RegionToken, new: RegionToken },

    /// Identity-less update: match on the shape-id prefix
    ByPrefix { new: RegionToken },
}

impl EditRequest {
    /// The token that will be stored
    pub fn replacement(&self) -> &RegionToken {
        match self {
            EditRequest::ByExactToken { new, .. } => new,
            EditRequest::ByPrefix { new } => new,
        }
    }
}

/// Where the replacement token lands in the region list
#[derive(Debug, PartialEq, Eq)]
enum EditOutcome {
    ReplaceAt(usize),
    Append,
}

/// Single lookup resolving both edit calling conventions: exact token match
/// first, then shape-id prefix, else append as a new region.
fn resolve_edit(regions: &[RegionToken], request: &EditRequest) -> EditOutcome {
    if let EditRequest::ByExactToken { old, .. } = request {
        if let Some(index) = regions.iter().position(|r| r == old) {
            return EditOutcome::ReplaceAt(index);
        }
    }
    let replacement = request.replacement();
    match regions.iter().position(|r| r.same_shape(replacement)) {
        Some(index) => EditOutcome::ReplaceAt(index),
        None => EditOutcome::Append,
    }
}

/// The reconciliation engine: keeps the persisted geo-filter sections in
/// step with map-driven intent and owns the in-memory name → filter
/// projection.
///
/// Every mutating operation re-loads the store first — another editor may
/// have committed changes between our suspension points, and the design
/// accepts last-writer-wins over optimistic locking. The projection is only
/// refreshed by a successful [`Reconciler::load_all`], never optimistically.
pub struct Reconciler {
    store: RwLock<ConfigStore>,
    filters: DashMap<String, GeoFilter>,
}

impl Reconciler {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store: RwLock::new(store),
            filters: DashMap::new(),
        }
    }

    /// Record a region for `name`, creating the filter section on first use.
    ///
    /// `is_new` reflects the map surface's claim that this is a freshly drawn
    /// shape. When it is not and the filter already exists, the event is an
    /// identity-less edit and goes through the same resolution as
    /// [`Reconciler::edit_region`].
    pub async fn add_region(&self, name: &str, token: RegionToken, is_new: bool) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.load().await?;

        match store.find_by_name(FILTER_KIND, name).map(|s| s.id.clone()) {
            None => {
                let id = store.add(FILTER_KIND);
                store.set(&id, "name", FieldValue::single(name))?;
                store.set(
                    &id,
                    REGION_FIELD,
                    FieldValue::list(vec![token.as_str().to_string()]),
                )?;
                store.set(&id, "enabled", FieldValue::single("1"))?;
                info!("Created geo-filter '{}' with its first region", name);
            }
            Some(id) if is_new => {
                let mut regions = Self::region_list(&store, &id);
                if regions.iter().any(|r| r == &token) {
                    debug!("Region already present in '{}', re-enabling only", name);
                } else {
                    regions.push(token);
                }
                Self::set_regions(&mut store, &id, regions)?;
                // re-activates a previously disabled filter
                store.set(&id, "enabled", FieldValue::single("1"))?;
            }
            Some(id) => {
                let regions = Self::region_list(&store, &id);
                let request = EditRequest::ByPrefix { new: token };
                let updated = Self::apply_edit(regions, &request, name);
                Self::set_regions(&mut store, &id, updated)?;
            }
        }

        store.save().await
    }

    /// Replace a region's geometry, preserving its position in the display
    /// order. Unknown filters are a logged no-op: the map surface and the
    /// store can legitimately race.
    pub async fn edit_region(&self, name: &str, request: EditRequest) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.load().await?;

        let Some(id) = store.find_by_name(FILTER_KIND, name).map(|s| s.id.clone()) else {
            warn!("Cannot edit region: geo-filter '{}' not found", name);
            return Ok(());
        };

        let regions = Self::region_list(&store, &id);
        let updated = Self::apply_edit(regions, &request, name);
        Self::set_regions(&mut store, &id, updated)?;
        store.save().await
    }

    /// Remove a region by exact match. Removing the last region disables the
    /// filter and clears the region field entirely — the record and its
    /// settings are retained for later re-enabling.
    pub async fn delete_region(&self, name: &str, token: &RegionToken) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.load().await?;

        let Some(id) = store.find_by_name(FILTER_KIND, name).map(|s| s.id.clone()) else {
            warn!("Cannot delete region: geo-filter '{}' not found", name);
            return Ok(());
        };

        let mut regions = Self::region_list(&store, &id);
        let Some(index) = regions.iter().position(|r| r == token) else {
            warn!("Region to delete not present in geo-filter '{}'", name);
            return Ok(());
        };
        regions.remove(index);

        if regions.is_empty() {
            store.set(&id, "enabled", FieldValue::single("0"))?;
            // absent, not an empty list: "has no regions" and "never set"
            // are intentionally indistinguishable
            store.unset(&id, REGION_FIELD)?;
            info!("Disabled geo-filter '{}' after removing its last region", name);
        } else {
            Self::set_regions(&mut store, &id, regions)?;
        }

        store.save().await
    }

    /// Relocate a region to `new_index` (clamped), leaving every other
    /// token's relative order and the enabled flag untouched.
    pub async fn move_region(&self, name: &str, token: &RegionToken, new_index: usize) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.load().await?;

        let Some(id) = store.find_by_name(FILTER_KIND, name).map(|s| s.id.clone()) else {
            warn!("Cannot move region: geo-filter '{}' not found", name);
            return Ok(());
        };

        let mut regions = Self::region_list(&store, &id);
        let Some(index) = regions.iter().position(|r| r == token) else {
            warn!("Region to move not present in geo-filter '{}'", name);
            return Ok(());
        };
        let moved = regions.remove(index);
        let target = new_index.min(regions.len());
        regions.insert(target, moved);

        Self::set_regions(&mut store, &id, regions)?;
        store.save().await
    }

    /// Merge the non-empty fields of `settings` into the filter section.
    /// Absent or empty fields mean "no change"; regions and the enabled flag
    /// are never touched here.
    pub async fn save_settings(&self, name: &str, settings: &FilterSettings) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.load().await?;

        let Some(id) = store.find_by_name(FILTER_KIND, name).map(|s| s.id.clone()) else {
            warn!("Cannot save settings: geo-filter '{}' not found", name);
            return Ok(());
        };

        if let Some(protocol) = settings.protocol {
            store.set(&id, "protocol", FieldValue::single(protocol.as_str()))?;
        }
        let nonempty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(src_ip) = nonempty(&settings.src_ip) {
            store.set(&id, "src_ip", FieldValue::single(src_ip))?;
        }
        if let Some(src_port) = nonempty(&settings.src_port) {
            store.set(&id, "src_port", FieldValue::single(src_port))?;
        }
        if let Some(dest_port) = nonempty(&settings.dest_port) {
            store.set(&id, "dest_port", FieldValue::single(dest_port))?;
        }
        if !settings.allowed_ip.is_empty() {
            store.set(&id, "allowed_ip", FieldValue::list(settings.allowed_ip.clone()))?;
        }
        if let Some(ip_list) = nonempty(&settings.ip_list) {
            store.set(&id, "ip_list", FieldValue::single(ip_list))?;
        }

        store.save().await
    }

    /// Read every geo-filter section, rebuild the projection and return the
    /// map redraw notices: one per region token of every enabled filter, in
    /// section and list order.
    ///
    /// This is the sole recovery path after a sync-channel disconnect and is
    /// safe to call repeatedly.
    pub async fn load_all(&self) -> AppResult<Vec<RegionNotice>> {
        let mut store = self.store.write().await;
        store.load().await?;

        let mut loaded = Vec::new();
        let mut notices = Vec::new();
        for section in store.sections(FILTER_KIND) {
            // sections without a name are unreachable from the map surface
            let Some(name) = section.get_str("name") else {
                continue;
            };

            let regions: Vec<RegionToken> = section
                .get_list(REGION_FIELD)
                .into_iter()
                .map(RegionToken::from)
                .collect();
            let filter = GeoFilter {
                name: name.to_string(),
                enabled: section.flag("enabled"),
                protocol: section
                    .get_str("protocol")
                    .and_then(Protocol::parse)
                    .unwrap_or_default(),
                src_ip: section.get_str("src_ip").map(str::to_string),
                src_port: section.get_str("src_port").map(str::to_string),
                dest_port: section.get_str("dest_port").map(str::to_string),
                allowed_ip: section.get_list("allowed_ip"),
                ip_list: section.get_str("ip_list").map(str::to_string),
                regions: regions.clone(),
            };

            if filter.enabled {
                for region in &regions {
                    notices.push(RegionNotice {
                        name: name.to_string(),
                        region: region.clone(),
                    });
                }
            }
            loaded.push(filter);
        }
        drop(store);

        self.filters.clear();
        for filter in loaded {
            self.filters.insert(filter.name.clone(), filter);
        }
        debug!(
            "Loaded {} geo-filters, {} region notices",
            self.filters.len(),
            notices.len()
        );
        Ok(notices)
    }

    /// Typed view of the singleton global section
    pub async fn global_settings(&self) -> AppResult<GlobalSettings> {
        let mut store = self.store.write().await;
        store.load().await?;
        Ok(read_global(&store))
    }

    /// Persist the global settings
    pub async fn save_global_settings(&self, settings: &GlobalSettings) -> AppResult<()> {
        let mut store = self.store.write().await;
        store.load().await?;
        write_global(&mut store, settings)?;
        store.save().await
    }

    /// Current projection, sorted by filter name
    pub fn filters(&self) -> Vec<GeoFilter> {
        let mut filters: Vec<GeoFilter> = self.filters.iter().map(|e| e.value().clone()).collect();
        filters.sort_by(|a, b| a.name.cmp(&b.name));
        filters
    }

    pub fn filter(&self, name: &str) -> Option<GeoFilter> {
        self.filters.get(name).map(|e| e.value().clone())
    }

    fn region_list(store: &ConfigStore, section_id: &str) -> Vec<RegionToken> {
        store
            .section(section_id)
            .map(|s| s.get_list(REGION_FIELD))
            .unwrap_or_default()
            .into_iter()
            .map(RegionToken::from)
            .collect()
    }

    fn set_regions(store: &mut ConfigStore, section_id: &str, regions: Vec<RegionToken>) -> AppResult<()> {
        store.set(
            section_id,
            REGION_FIELD,
            FieldValue::list(regions.into_iter().map(|r| r.as_str().to_string()).collect()),
        )
    }

    fn apply_edit(mut regions: Vec<RegionToken>, request: &EditRequest, name: &str) -> Vec<RegionToken> {
        match resolve_edit(&regions, request) {
            EditOutcome::ReplaceAt(index) => {
                debug!("Replacing region {} of geo-filter '{}'", index, name);
                regions[index] = request.replacement().clone();
            }
            EditOutcome::Append => {
                debug!("No matching region in geo-filter '{}', appending", name);
                regions.push(request.replacement().clone());
            }
        }
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(regions: &[&str]) -> Vec<RegionToken> {
        regions.iter().map(|r| RegionToken::from(*r)).collect()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        reconciler: Reconciler,
        store_path: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store_path = dir.path().join("geomate.json");
        Fixture {
            reconciler: Reconciler::new(ConfigStore::new(&store_path)),
            store_path,
            _dir: dir,
        }
    }

    /// Raw store view, bypassing the engine
    async fn raw_store(fx: &Fixture) -> ConfigStore {
        let mut store = ConfigStore::new(&fx.store_path);
        store.load().await.expect("load");
        store
    }

    #[test]
    fn resolve_prefers_exact_match() {
        let regions = tokens(&["r1:a", "r2:b"]);
        let request = EditRequest::ByExactToken {
            old: "r2:b".into(),
            new: "r2:c".into(),
        };
        assert_eq!(resolve_edit(&regions, &request), EditOutcome::ReplaceAt(1));
    }

    #[test]
    fn resolve_falls_back_to_prefix_then_append() {
        let regions = tokens(&["r1:a", "r2:b"]);
        let by_prefix = EditRequest::ByPrefix { new: "r1:z".into() };
        assert_eq!(resolve_edit(&regions, &by_prefix), EditOutcome::ReplaceAt(0));

        let unmatched = EditRequest::ByExactToken {
            old: "r9:gone".into(),
            new: "r9:z".into(),
        };
        assert_eq!(resolve_edit(&regions, &unmatched), EditOutcome::Append);
    }

    #[tokio::test]
    async fn first_add_creates_an_enabled_singleton_section() {
        let fx = fixture();
        fx.reconciler
            .add_region("EU", "r1:poly1".into(), true)
            .await
            .expect("add");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(section.get_list("allowed_region"), vec!["r1:poly1".to_string()]);
        assert_eq!(section.get_str("enabled"), Some("1"));
    }

    #[tokio::test]
    async fn deleting_the_last_region_disables_and_clears_the_field() {
        let fx = fixture();
        fx.reconciler
            .add_region("EU", "r1:poly1".into(), true)
            .await
            .expect("add");
        fx.reconciler
            .delete_region("EU", &"r1:poly1".into())
            .await
            .expect("delete");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("record retained");
        assert_eq!(section.get_str("enabled"), Some("0"));
        assert!(section.get("allowed_region").is_none());
    }

    #[tokio::test]
    async fn re_add_after_delete_recreates_the_singleton_and_enables() {
        let fx = fixture();
        let rec = &fx.reconciler;
        rec.add_region("EU", "r1:poly1".into(), true).await.expect("add");
        rec.delete_region("EU", &"r1:poly1".into()).await.expect("delete");
        rec.add_region("EU", "r2:poly2".into(), true).await.expect("re-add");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(section.get_list("allowed_region"), vec!["r2:poly2".to_string()]);
        assert_eq!(section.get_str("enabled"), Some("1"));
    }

    #[tokio::test]
    async fn enabled_always_equals_region_presence() {
        let fx = fixture();
        let rec = &fx.reconciler;
        let steps: &[(&str, bool)] = &[
            ("r1:a", true),
            ("r2:b", true),
            ("r1:a", false),
            ("r2:b", false),
            ("r3:c", true),
        ];
        for (token, add) in steps {
            if *add {
                rec.add_region("EU", (*token).into(), true).await.expect("add");
            } else {
                rec.delete_region("EU", &(*token).into()).await.expect("delete");
            }
            rec.load_all().await.expect("load_all");
            let filter = rec.filter("EU").expect("filter");
            assert_eq!(filter.enabled, !filter.regions.is_empty());
        }
    }

    #[tokio::test]
    async fn duplicate_add_is_idempotent() {
        let fx = fixture();
        fx.reconciler.add_region("EU", "r1:a".into(), true).await.expect("add");
        fx.reconciler.add_region("EU", "r1:a".into(), true).await.expect("re-add");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(section.get_list("allowed_region"), vec!["r1:a".to_string()]);
    }

    #[tokio::test]
    async fn add_of_an_edited_shape_replaces_its_geometry() {
        let fx = fixture();
        fx.reconciler.add_region("EU", "r1:old".into(), true).await.expect("add");
        // the map surface reports an edited shape without the prior token
        fx.reconciler.add_region("EU", "r1:new".into(), false).await.expect("edit");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(section.get_list("allowed_region"), vec!["r1:new".to_string()]);
    }

    #[tokio::test]
    async fn exact_edit_replaces_in_place_at_the_same_index() {
        let fx = fixture();
        let rec = &fx.reconciler;
        for token in ["r1:a", "r2:b", "r3:c"] {
            rec.add_region("EU", token.into(), true).await.expect("add");
        }
        rec.edit_region(
            "EU",
            EditRequest::ByExactToken {
                old: "r2:b".into(),
                new: "r2:edited".into(),
            },
        )
        .await
        .expect("edit");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(
            section.get_list("allowed_region"),
            vec!["r1:a".to_string(), "r2:edited".to_string(), "r3:c".to_string()]
        );
    }

    #[tokio::test]
    async fn edit_without_any_match_appends() {
        let fx = fixture();
        fx.reconciler.add_region("EU", "r1:a".into(), true).await.expect("add");
        fx.reconciler
            .edit_region("EU", EditRequest::ByPrefix { new: "r9:z".into() })
            .await
            .expect("edit");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(
            section.get_list("allowed_region"),
            vec!["r1:a".to_string(), "r9:z".to_string()]
        );
    }

    #[tokio::test]
    async fn edit_of_an_unknown_filter_is_a_no_op() {
        let fx = fixture();
        fx.reconciler
            .edit_region("Ghost", EditRequest::ByPrefix { new: "r1:a".into() })
            .await
            .expect("edit");

        let store = raw_store(&fx).await;
        assert!(store.sections(FILTER_KIND).is_empty());
    }

    #[tokio::test]
    async fn move_clamps_and_preserves_relative_order() {
        let fx = fixture();
        let rec = &fx.reconciler;
        for token in ["r1:a", "r2:b", "r3:c"] {
            rec.add_region("EU", token.into(), true).await.expect("add");
        }

        rec.move_region("EU", &"r1:a".into(), 99).await.expect("move");
        rec.load_all().await.expect("load_all");
        assert_eq!(
            rec.filter("EU").expect("filter").regions,
            tokens(&["r2:b", "r3:c", "r1:a"])
        );

        rec.move_region("EU", &"r3:c".into(), 0).await.expect("move");
        rec.load_all().await.expect("load_all");
        let filter = rec.filter("EU").expect("filter");
        assert_eq!(filter.regions, tokens(&["r3:c", "r2:b", "r1:a"]));
        assert!(filter.enabled);
    }

    #[tokio::test]
    async fn save_settings_merges_without_touching_regions() {
        let fx = fixture();
        let rec = &fx.reconciler;
        rec.add_region("EU", "r1:a".into(), true).await.expect("add");
        rec.save_settings(
            "EU",
            &FilterSettings {
                protocol: Some(Protocol::Tcp),
                dest_port: Some("27015-27020".into()),
                src_ip: Some(String::new()), // empty means "no change"
                ..FilterSettings::default()
            },
        )
        .await
        .expect("save");

        let store = raw_store(&fx).await;
        let section = store.find_by_name(FILTER_KIND, "EU").expect("section");
        assert_eq!(section.get_str("protocol"), Some("tcp"));
        assert_eq!(section.get_str("dest_port"), Some("27015-27020"));
        assert!(section.get("src_ip").is_none());
        assert_eq!(section.get_list("allowed_region"), vec!["r1:a".to_string()]);
        assert_eq!(section.get_str("enabled"), Some("1"));
    }

    #[tokio::test]
    async fn load_all_is_idempotent() {
        let fx = fixture();
        let rec = &fx.reconciler;
        for token in ["r1:a", "r2:b"] {
            rec.add_region("EU", token.into(), true).await.expect("add");
        }
        rec.add_region("US", "r4:d".into(), true).await.expect("add");

        let first = rec.load_all().await.expect("load_all");
        let second = rec.load_all().await.expect("load_all again");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn disabled_filters_emit_no_notices() {
        let fx = fixture();
        let rec = &fx.reconciler;
        rec.add_region("EU", "r1:a".into(), true).await.expect("add");
        rec.delete_region("EU", &"r1:a".into()).await.expect("delete");

        let notices = rec.load_all().await.expect("load_all");
        assert!(notices.is_empty());
        // the record itself survives for re-enabling
        assert!(rec.filter("EU").is_some());
    }

    #[tokio::test]
    async fn scalar_region_field_is_normalized_on_load() {
        let fx = fixture();
        // a store written by another editor may hold a bare scalar where
        // exactly one value is present
        let doc = serde_json::json!({
            "sections": [{
                "id": "cfgaaaaaa",
                "type": "geo_filter",
                "options": {
                    "name": "EU",
                    "allowed_region": "r1:a",
                    "enabled": "1"
                }
            }]
        });
        std::fs::write(&fx.store_path, serde_json::to_vec_pretty(&doc).expect("json"))
            .expect("write");

        let notices = fx.reconciler.load_all().await.expect("load_all");
        assert_eq!(
            notices,
            vec![RegionNotice {
                name: "EU".into(),
                region: "r1:a".into()
            }]
        );
        assert_eq!(fx.reconciler.filter("EU").expect("filter").regions, tokens(&["r1:a"]));
    }
}
