use std::path::{Path, PathBuf};

use crate::manifest::OutputSpec;

/// Where an asset rule's source comes from, relative to its root.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// A directory copied wholesale into the bundle.
    Dir(String),
    /// A glob expanded at manifest-build time; must match at least one file.
    Pattern(String),
    /// A single file.
    File(String),
}

/// One payload rule: a relative source under either the app tree or the
/// dependency root, and the bundle directory it lands in.
#[derive(Debug, Clone)]
pub struct AssetRule {
    pub source: AssetSource,
    pub destination: String,
}

impl AssetRule {
    fn dir(source: &str, destination: &str) -> Self {
        Self {
            source: AssetSource::Dir(source.to_string()),
            destination: destination.to_string(),
        }
    }

    fn pattern(source: &str, destination: &str) -> Self {
        Self {
            source: AssetSource::Pattern(source.to_string()),
            destination: destination.to_string(),
        }
    }

    fn file(source: String, destination: &str) -> Self {
        Self {
            source: AssetSource::File(source),
            destination: destination.to_string(),
        }
    }
}

/// Fixed layout of the debugger source tree and of the installed
/// dependency root. The packager cannot discover any of this on its
/// own, so the relative paths and their bundle destinations are pinned
/// here.
#[derive(Debug, Clone)]
pub struct AppLayout {
    package_name: String,
}

pub const DEFAULT_EXECUTABLE_NAME: &str = "skytemple_ssb_debugger";
pub const DEFAULT_ENTRY_SCRIPT: &str = "main.py";
pub const DEFAULT_ICON_FILE: &str = "skytemple_ssb_debugger.ico";
pub const DEFAULT_DEPS_MARKER: &str = "site-packages";

impl AppLayout {
    pub fn new() -> Self {
        Self {
            package_name: DEFAULT_EXECUTABLE_NAME.to_string(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Data payloads under the app source tree: the data directory, the
    /// UI definitions and syntax files beside the entry script, and the
    /// controller UI definitions.
    pub fn app_data_rules(&self) -> Vec<AssetRule> {
        vec![
            AssetRule::dir("data", "."),
            AssetRule::pattern("*.glade", &self.package_name),
            AssetRule::pattern("*.lang", &self.package_name),
            AssetRule::pattern(
                "controller/*.glade",
                &format!("{}/controller", self.package_name),
            ),
        ]
    }

    /// Data payloads under the dependency root.
    pub fn dependency_data_rules(&self) -> Vec<AssetRule> {
        vec![AssetRule::dir(
            "skytemple_files/_resources",
            "skytemple_files/_resources",
        )]
    }

    /// Native binaries under the dependency root: the emulator library,
    /// plus the SDL runtime it loads on Windows.
    pub fn dependency_binary_rules(&self) -> Vec<AssetRule> {
        let mut rules = vec![AssetRule::file(
            format!("desmume/{}", self.emulator_library_name()),
            ".",
        )];

        if cfg!(target_os = "windows") {
            rules.push(AssetRule::pattern("sdl2dll/dll/*.dll", "."));
        }

        rules
    }

    /// Platform file name of the emulator shared library.
    pub fn emulator_library_name(&self) -> String {
        if cfg!(target_os = "windows") {
            "libdesmume.dll".to_string()
        } else if cfg!(target_os = "macos") {
            "libdesmume.dylib".to_string()
        } else {
            "libdesmume.so".to_string()
        }
    }

    /// Modules the packager's dependency scanner cannot see; passed
    /// through to it unmodified.
    pub fn hidden_imports(&self) -> Vec<String> {
        vec![
            "packaging.version".to_string(),
            "packaging.specifiers".to_string(),
            "packaging.requirements".to_string(),
            "pkg_resources.py2_warn".to_string(),
        ]
    }

    /// Output configuration matching the released bundles: windowed
    /// executable, compressed payload, symbols kept.
    pub fn default_output(&self) -> OutputSpec {
        OutputSpec {
            executable_name: self.package_name.clone(),
            icon_path: None,
            console: false,
            compress: true,
            strip_symbols: false,
        }
    }

    /// Default icon beside the app tree, when it exists.
    pub fn default_icon(&self, app_dir: &Path) -> Option<PathBuf> {
        let icon = app_dir.join(DEFAULT_ICON_FILE);
        icon.exists().then_some(icon)
    }
}

impl Default for AppLayout {
    fn default() -> Self {
        Self::new()
    }
}
