//! Maps an animation identifier to the file that backs it
//!
//! Pools are consulted in `POOL_ORDER`; the first pool holding the id decides
//! the path, and that path must exist.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::ResolveError;
use crate::platform::DataPaths;
use crate::scanner::LocalScan;

/// Identifier namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Downloaded,
    Custom,
    Local,
}

/// Lookup priority, first match wins
pub const POOL_ORDER: [Pool; 3] = [Pool::Downloaded, Pool::Custom, Pool::Local];

pub struct Resolver<'a> {
    config: &'a Config,
    local: &'a LocalScan,
    paths: &'a DataPaths,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a Config, local: &'a LocalScan, paths: &'a DataPaths) -> Self {
        Self { config, local, paths }
    }

    /// Path a pool would give `id`, without checking the filesystem
    pub fn lookup(&self, pool: Pool, id: &str) -> Option<PathBuf> {
        match pool {
            Pool::Downloaded => self.config.is_downloaded(id).then(|| self.paths.download_file(id)),
            Pool::Custom => self
                .config
                .custom_animations
                .iter()
                .find(|anim| anim.id == id)
                .map(|anim| anim.path.clone()),
            Pool::Local => self.local.animation(id).map(|_| self.paths.animations.join(id)),
        }
    }

    /// First pool claiming `id`
    pub fn find(&self, id: &str) -> Option<(Pool, PathBuf)> {
        POOL_ORDER
            .iter()
            .find_map(|pool| self.lookup(*pool, id).map(|path| (*pool, path)))
    }

    pub fn resolve(&self, id: &str) -> Result<PathBuf, ResolveError> {
        let Some((pool, path)) = self.find(id) else {
            return Err(ResolveError::NotFound { id: id.to_string() });
        };
        if !exists(&path) {
            return Err(ResolveError::Stale { id: id.to_string(), path });
        }
        debug!(id, pool = ?pool, path = %path.display(), "Resolved animation");
        Ok(path)
    }
}

fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::catalog_entry;
    use crate::types::{AnimationEntry, CustomAnimation, Source, Target};
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: DataPaths,
        config: Config,
        local: LocalScan,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(&dir.path().join("config"), &dir.path().join("data"));
        fs::create_dir_all(&paths.animations).unwrap();
        fs::create_dir_all(&paths.downloads).unwrap();
        Fixture {
            _dir: dir,
            paths,
            config: Config::default(),
            local: LocalScan::default(),
        }
    }

    fn add_local(f: &mut Fixture, id: &str) {
        let path = f.paths.animations.join(id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"local").unwrap();
        f.local.animations.push(AnimationEntry {
            id: id.to_string(),
            name: id.to_string(),
            target: Target::Boot,
            source: Source::Local { relative_path: id.into() },
        });
    }

    #[test]
    fn test_pool_order_constant() {
        assert_eq!(POOL_ORDER, [Pool::Downloaded, Pool::Custom, Pool::Local]);
    }

    #[test]
    fn test_download_wins_over_custom_and_local() {
        let mut f = fixture();
        add_local(&mut f, "shared");
        let custom_path = f.paths.animations.join("elsewhere.webm");
        fs::write(&custom_path, b"custom").unwrap();
        f.config.custom_animations.push(CustomAnimation {
            id: "shared".to_string(),
            name: "Shared".to_string(),
            path: custom_path.clone(),
            target: Target::Boot,
        });

        let resolver = Resolver::new(&f.config, &f.local, &f.paths);
        assert_eq!(resolver.resolve("shared").unwrap(), custom_path);

        f.config.downloads.push(catalog_entry("shared", Target::Boot));
        fs::write(f.paths.download_file("shared"), b"dl").unwrap();
        let resolver = Resolver::new(&f.config, &f.local, &f.paths);
        assert_eq!(resolver.resolve("shared").unwrap(), f.paths.download_file("shared"));
    }

    #[test]
    fn test_local_resolves_under_animations_root() {
        let mut f = fixture();
        add_local(&mut f, "Retro/deck_startup.webm");
        let resolver = Resolver::new(&f.config, &f.local, &f.paths);
        assert_eq!(
            resolver.resolve("Retro/deck_startup.webm").unwrap(),
            f.paths.animations.join("Retro/deck_startup.webm")
        );
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let f = fixture();
        let resolver = Resolver::new(&f.config, &f.local, &f.paths);
        let err = resolver.resolve("nope").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(err.id(), "nope");
    }

    #[test]
    fn test_stale_record_does_not_fall_through() {
        let mut f = fixture();
        add_local(&mut f, "x");
        // recorded as downloaded but the file is gone
        f.config.downloads.push(catalog_entry("x", Target::Boot));
        let resolver = Resolver::new(&f.config, &f.local, &f.paths);
        assert!(matches!(resolver.resolve("x").unwrap_err(), ResolveError::Stale { .. }));
    }
}
