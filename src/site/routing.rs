use crate::url::{route_key, url_to_path};
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Registration held for one generated page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteToken {
    /// Route key (`news/item` for `/news/item/`)
    pub path: String,

    /// When the page was last registered
    #[serde(rename = "registered-at")]
    pub registered_at: DateTime<Utc>,
}

/// Dynamic routing registration for generated pages
pub trait RouteRegistrar: Send + Sync {
    /// Registers the page at `path`, replacing an earlier registration
    fn register(&self, path: &str);

    /// Removes the registration of `path`, and of every path below it when
    /// `include_subpaths` is set
    fn unregister(&self, path: &str, include_subpaths: bool);
}

/// Registrar used by sites without dynamic routing
pub struct NullRegistrar;

impl RouteRegistrar for NullRegistrar {
    fn register(&self, _path: &str) {}

    fn unregister(&self, _path: &str, _include_subpaths: bool) {}
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RouteFile {
    #[serde(default)]
    route: Vec<RouteToken>,
}

/// In-memory route table, persisted as TOML between runs
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Mutex<BTreeMap<String, RouteToken>>,
}

impl RouteTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a table saved by [`RouteTable::save`]
    ///
    /// Routes whose leaf document no longer exists below `output_root` are
    /// dropped. When any route was dropped, the file is copied to
    /// `<file>.bak` and rewritten. A missing file yields an empty table.
    pub fn load(file: &Path, output_root: &Path, leaf_names: &[String]) -> Result<Self> {
        if !file.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(file)?;
        let parsed: RouteFile = toml::from_str(&content)
            .map_err(|e| MirrorError::Routes(format!("{}: {}", file.display(), e)))?;

        let total = parsed.route.len();
        let routes: BTreeMap<String, RouteToken> = parsed
            .route
            .into_iter()
            .filter(|token| {
                let directory = url_to_path(output_root, &token.path);
                leaf_names.iter().any(|name| directory.join(name).is_file())
            })
            .map(|token| (token.path.clone(), token))
            .collect();

        let table = Self {
            routes: Mutex::new(routes),
        };

        let dropped = total - table.len();
        if dropped > 0 {
            tracing::info!(
                "Dropped {} stale routes from {}, keeping a backup",
                dropped,
                file.display()
            );
            let mut backup = file.as_os_str().to_owned();
            backup.push(".bak");
            std::fs::copy(file, &backup)?;
            table.save(file)?;
        }

        Ok(table)
    }

    /// Writes the table to `file`
    pub fn save(&self, file: &Path) -> Result<()> {
        let route_file = RouteFile {
            route: self.lock().values().cloned().collect(),
        };

        let content =
            toml::to_string(&route_file).map_err(|e| MirrorError::Routes(e.to_string()))?;

        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(file, content)?;

        tracing::debug!("Saved {} routes to {}", route_file.route.len(), file.display());
        Ok(())
    }

    /// Returns true if `path` is registered
    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(&route_key(path))
    }

    /// Returns all registered route keys in order
    pub fn routes(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Returns the number of registered routes
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no route is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, RouteToken>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RouteRegistrar for RouteTable {
    fn register(&self, path: &str) {
        let key = route_key(path);
        let token = RouteToken {
            path: key.clone(),
            registered_at: Utc::now(),
        };
        self.lock().insert(key, token);
    }

    fn unregister(&self, path: &str, include_subpaths: bool) {
        let key = route_key(path);
        let mut routes = self.lock();

        if !include_subpaths {
            routes.remove(&key);
            return;
        }

        let prefix = format!("{}/", key);
        routes.retain(|existing, _| {
            !key.is_empty() && existing != &key && !existing.starts_with(&prefix)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leaf_names() -> Vec<String> {
        vec!["index.html".to_string()]
    }

    #[test]
    fn test_register_normalizes_paths() {
        let table = RouteTable::new();
        table.register("/news/item/");
        table.register("\\news\\item\\");

        assert_eq!(table.routes(), vec!["news/item"]);
        assert!(table.contains("news/item"));
    }

    #[test]
    fn test_unregister_removes_subtree() {
        let table = RouteTable::new();
        table.register("/news/");
        table.register("/news/item/");
        table.register("/newsletter/");

        table.unregister("/news/", false);
        assert_eq!(table.routes(), vec!["news/item", "newsletter"]);

        table.register("/news/");
        table.unregister("/news/", true);
        assert_eq!(table.routes(), vec!["newsletter"]);
    }

    #[test]
    fn test_save_and_load_drops_stale_routes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("site");
        std::fs::create_dir_all(root.join("about")).unwrap();
        std::fs::write(root.join("about/index.html"), "x").unwrap();

        let file = dir.path().join("routes.toml");
        let table = RouteTable::new();
        table.register("/about/");
        table.register("/gone/");
        table.save(&file).unwrap();

        let loaded = RouteTable::load(&file, &root, &leaf_names()).unwrap();

        assert_eq!(loaded.routes(), vec!["about"]);
        assert!(dir.path().join("routes.toml.bak").exists());

        let reloaded = RouteTable::load(&file, &root, &leaf_names()).unwrap();
        assert_eq!(reloaded.routes(), vec!["about"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let table =
            RouteTable::load(&dir.path().join("none.toml"), dir.path(), &leaf_names()).unwrap();
        assert!(table.is_empty());
    }
}
