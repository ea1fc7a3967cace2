use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BundleError, Result};
use crate::layout::{AppLayout, AssetRule, AssetSource};

/// One payload to copy into the bundle: a concrete file or directory
/// and the bundle-relative directory it lands in. Used uniformly for
/// data and binary payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source_path: PathBuf,
    pub destination_dir: String,
}

/// Configuration of the produced executable and its collected bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub executable_name: String,
    pub icon_path: Option<PathBuf>,
    pub console: bool,
    pub compress: bool,
    pub strip_symbols: bool,
}

/// The full declarative description of one packaging run. Built once
/// per invocation, handed to the packager, discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entry_script: PathBuf,
    pub extra_search_paths: Vec<PathBuf>,
    pub binaries: Vec<ManifestEntry>,
    pub datas: Vec<ManifestEntry>,
    pub hidden_imports: Vec<String>,
    pub output: OutputSpec,
}

impl Manifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        info!(path = %path.display(), "wrote bundle manifest");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Manifest> {
        let content = fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Re-checks that everything the manifest references still exists.
    /// Guards the window between resolution and emission.
    pub fn validate(&self) -> Result<()> {
        if !self.entry_script.exists() {
            return Err(BundleError::MissingAsset {
                path: self.entry_script.clone(),
            });
        }

        for entry in self.datas.iter().chain(self.binaries.iter()) {
            if !entry.source_path.exists() {
                return Err(BundleError::MissingAsset {
                    path: entry.source_path.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Resolves the fixed application layout against an app source tree and
/// a dependency root, producing a fully-populated [`Manifest`].
pub struct ManifestBuilder {
    layout: AppLayout,
    app_dir: PathBuf,
    dependency_root: PathBuf,
}

impl ManifestBuilder {
    pub fn new(app_dir: impl AsRef<Path>, dependency_root: impl AsRef<Path>) -> Self {
        Self {
            layout: AppLayout::new(),
            app_dir: app_dir.as_ref().to_path_buf(),
            dependency_root: dependency_root.as_ref().to_path_buf(),
        }
    }

    /// Builds the manifest, failing fast on the first missing asset.
    /// On failure nothing is returned; there is no partially-filled
    /// manifest to observe.
    pub fn build(&self, entry_script: &Path, output: OutputSpec) -> Result<Manifest> {
        let entry_script = self.app_dir.join(entry_script);
        if !entry_script.exists() {
            return Err(BundleError::MissingAsset { path: entry_script });
        }

        if let Some(icon) = &output.icon_path {
            if !icon.exists() {
                return Err(BundleError::MissingAsset { path: icon.clone() });
            }
        }

        let mut datas = Vec::new();
        for rule in self.layout.app_data_rules() {
            datas.extend(self.resolve_rule(&self.app_dir, &rule)?);
        }
        for rule in self.layout.dependency_data_rules() {
            datas.extend(self.resolve_rule(&self.dependency_root, &rule)?);
        }

        let mut binaries = Vec::new();
        for rule in self.layout.dependency_binary_rules() {
            binaries.extend(self.resolve_rule(&self.dependency_root, &rule)?);
        }

        debug!(
            datas = datas.len(),
            binaries = binaries.len(),
            "resolved bundle payloads"
        );

        Ok(Manifest {
            entry_script,
            extra_search_paths: vec![self.app_dir.clone(), self.dependency_root.clone()],
            binaries,
            datas,
            hidden_imports: self.layout.hidden_imports(),
            output,
        })
    }

    fn resolve_rule(&self, root: &Path, rule: &AssetRule) -> Result<Vec<ManifestEntry>> {
        match &rule.source {
            AssetSource::Dir(relative) | AssetSource::File(relative) => {
                let path = root.join(relative);
                if !path.exists() {
                    return Err(BundleError::MissingAsset { path });
                }

                Ok(vec![ManifestEntry {
                    source_path: path,
                    destination_dir: rule.destination.clone(),
                }])
            }
            AssetSource::Pattern(relative) => {
                let pattern = root.join(relative);
                let pattern_str = pattern.to_string_lossy().into_owned();

                let matches =
                    glob::glob(&pattern_str).map_err(|source| BundleError::InvalidPattern {
                        pattern: pattern_str.clone(),
                        source,
                    })?;

                let mut entries = Vec::new();
                for matched in matches {
                    let source_path = matched.map_err(|e| BundleError::Io(e.into_error()))?;
                    entries.push(ManifestEntry {
                        source_path,
                        destination_dir: rule.destination.clone(),
                    });
                }

                if entries.is_empty() {
                    return Err(BundleError::MissingAsset { path: pattern });
                }

                entries.sort_by(|a, b| a.source_path.cmp(&b.source_path));
                Ok(entries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let layout = AppLayout::new();

        let app_dir = tmp.path().join("app");
        fs::create_dir_all(app_dir.join("data")).unwrap();
        fs::create_dir_all(app_dir.join("controller")).unwrap();
        fs::write(app_dir.join("main.py"), "").unwrap();
        fs::write(app_dir.join("debugger.glade"), "").unwrap();
        fs::write(app_dir.join("ssbscript.lang"), "").unwrap();
        fs::write(app_dir.join("controller").join("main.glade"), "").unwrap();

        let deps_root = tmp.path().join("site-packages");
        fs::create_dir_all(deps_root.join("skytemple_files").join("_resources")).unwrap();
        fs::create_dir_all(deps_root.join("desmume")).unwrap();
        fs::write(
            deps_root.join("desmume").join(layout.emulator_library_name()),
            "",
        )
        .unwrap();
        if cfg!(target_os = "windows") {
            fs::create_dir_all(deps_root.join("sdl2dll").join("dll")).unwrap();
            fs::write(deps_root.join("sdl2dll").join("dll").join("SDL2.dll"), "").unwrap();
        }

        (tmp, app_dir, deps_root)
    }

    fn build_fixture_manifest(app_dir: &Path, deps_root: &Path) -> Result<Manifest> {
        let builder = ManifestBuilder::new(app_dir, deps_root);
        let output = AppLayout::new().default_output();
        builder.build(Path::new("main.py"), output)
    }

    #[test]
    fn test_full_app_tree_resolves_five_datas() {
        let (_tmp, app_dir, deps_root) = fixture();

        let manifest = build_fixture_manifest(&app_dir, &deps_root).unwrap();

        assert_eq!(manifest.datas.len(), 5);
        let destinations: Vec<&str> = manifest
            .datas
            .iter()
            .map(|e| e.destination_dir.as_str())
            .collect();
        assert_eq!(
            destinations,
            vec![
                ".",
                "skytemple_ssb_debugger",
                "skytemple_ssb_debugger",
                "skytemple_ssb_debugger/controller",
                "skytemple_files/_resources",
            ]
        );

        assert!(!manifest.binaries.is_empty());
        for entry in manifest.datas.iter().chain(manifest.binaries.iter()) {
            assert!(
                entry.source_path.exists(),
                "resolved source should exist: {}",
                entry.source_path.display()
            );
        }
    }

    #[test]
    fn test_search_paths_and_hidden_imports() {
        let (_tmp, app_dir, deps_root) = fixture();

        let manifest = build_fixture_manifest(&app_dir, &deps_root).unwrap();

        assert_eq!(
            manifest.extra_search_paths,
            vec![app_dir.clone(), deps_root.clone()]
        );
        assert!(manifest
            .hidden_imports
            .contains(&"packaging.version".to_string()));
        assert_eq!(manifest.entry_script, app_dir.join("main.py"));
    }

    #[test]
    fn test_missing_controller_glade_fails() {
        let (_tmp, app_dir, deps_root) = fixture();
        fs::remove_file(app_dir.join("controller").join("main.glade")).unwrap();

        let err = build_fixture_manifest(&app_dir, &deps_root).unwrap_err();

        match err {
            BundleError::MissingAsset { path } => {
                assert!(path.to_string_lossy().contains("controller"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_entry_script_fails() {
        let (_tmp, app_dir, deps_root) = fixture();
        fs::remove_file(app_dir.join("main.py")).unwrap();

        let err = build_fixture_manifest(&app_dir, &deps_root).unwrap_err();
        assert!(matches!(err, BundleError::MissingAsset { .. }));
    }

    #[test]
    fn test_missing_emulator_library_fails() {
        let (_tmp, app_dir, deps_root) = fixture();
        let lib = deps_root
            .join("desmume")
            .join(AppLayout::new().emulator_library_name());
        fs::remove_file(&lib).unwrap();

        let err = build_fixture_manifest(&app_dir, &deps_root).unwrap_err();

        match err {
            BundleError::MissingAsset { path } => assert_eq!(path, lib),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_configured_icon_must_exist() {
        let (_tmp, app_dir, deps_root) = fixture();

        let mut output = AppLayout::new().default_output();
        output.icon_path = Some(app_dir.join("missing.ico"));

        let err = ManifestBuilder::new(&app_dir, &deps_root)
            .build(Path::new("main.py"), output)
            .unwrap_err();
        assert!(matches!(err, BundleError::MissingAsset { .. }));
    }

    #[test]
    fn test_write_and_read_manifest() {
        let (tmp, app_dir, deps_root) = fixture();

        let manifest = build_fixture_manifest(&app_dir, &deps_root).unwrap();
        let path = tmp.path().join("work").join("manifest.json");
        manifest.write(&path).unwrap();

        let reloaded = Manifest::read(&path).unwrap();
        assert_eq!(reloaded, manifest);
    }

    #[test]
    fn test_validate_catches_deleted_source() {
        let (_tmp, app_dir, deps_root) = fixture();

        let manifest = build_fixture_manifest(&app_dir, &deps_root).unwrap();
        manifest.validate().unwrap();

        fs::remove_file(app_dir.join("debugger.glade")).unwrap();
        assert!(matches!(
            manifest.validate().unwrap_err(),
            BundleError::MissingAsset { .. }
        ));
    }
}
