use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::dependency_root::resolve_dependency_root;
use crate::layout::{AppLayout, AssetRule, AssetSource, DEFAULT_DEPS_MARKER, DEFAULT_ENTRY_SCRIPT};
use crate::manifest::ManifestBuilder;
use crate::pipeline::{emit, ProcessPackager};

#[derive(Parser)]
#[command(name = "ssbpack")]
#[command(about = "Bundles the SkyTemple script-engine debugger into a standalone distributable")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve all assets and run the full packaging pipeline
    Build {
        /// Root of the debugger source tree
        #[arg(long, default_value = ".")]
        app_dir: PathBuf,

        /// Entry script, relative to the app dir
        #[arg(long, default_value = DEFAULT_ENTRY_SCRIPT)]
        entry: PathBuf,

        /// Installed-dependencies directory (skips search-path scanning)
        #[arg(long)]
        deps_root: Option<PathBuf>,

        /// Library search path scanned for the dependency root (repeatable)
        #[arg(long = "search-path")]
        search_paths: Vec<PathBuf>,

        /// Substring identifying the dependency root among the search paths
        #[arg(long, default_value = DEFAULT_DEPS_MARKER)]
        deps_marker: String,

        /// Packager executable driving the four build stages
        #[arg(long, default_value = "pybundle")]
        packager: PathBuf,

        /// Executable name (also names the output directory)
        #[arg(long)]
        name: Option<String>,

        /// Icon for the executable
        #[arg(long)]
        icon: Option<PathBuf>,

        /// Keep a console window attached to the executable
        #[arg(long)]
        console: bool,

        /// Disable payload compression
        #[arg(long)]
        no_compress: bool,

        /// Strip symbols from the bundled binaries
        #[arg(long)]
        strip: bool,

        /// Directory for intermediate stage artifacts
        #[arg(long, default_value = ".ssbpack/work")]
        work_dir: PathBuf,

        /// Directory receiving the collected bundle
        #[arg(long, default_value = "dist")]
        dist_dir: PathBuf,
    },

    /// Resolve assets and write the bundle manifest without packaging
    Manifest {
        /// Root of the debugger source tree
        #[arg(long, default_value = ".")]
        app_dir: PathBuf,

        /// Entry script, relative to the app dir
        #[arg(long, default_value = DEFAULT_ENTRY_SCRIPT)]
        entry: PathBuf,

        /// Installed-dependencies directory (skips search-path scanning)
        #[arg(long)]
        deps_root: Option<PathBuf>,

        /// Library search path scanned for the dependency root (repeatable)
        #[arg(long = "search-path")]
        search_paths: Vec<PathBuf>,

        /// Substring identifying the dependency root among the search paths
        #[arg(long, default_value = DEFAULT_DEPS_MARKER)]
        deps_marker: String,

        /// Where to write the manifest
        #[arg(long, default_value = ".ssbpack/work/manifest.json")]
        out: PathBuf,
    },

    /// Check that the packager and the expected assets are reachable
    Doctor {
        /// Packager executable driving the four build stages
        #[arg(long, default_value = "pybundle")]
        packager: PathBuf,

        /// Root of the debugger source tree
        #[arg(long, default_value = ".")]
        app_dir: PathBuf,

        /// Library search path scanned for the dependency root (repeatable)
        #[arg(long = "search-path")]
        search_paths: Vec<PathBuf>,

        /// Substring identifying the dependency root among the search paths
        #[arg(long, default_value = DEFAULT_DEPS_MARKER)]
        deps_marker: String,
    },
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            app_dir,
            entry,
            deps_root,
            search_paths,
            deps_marker,
            packager,
            name,
            icon,
            console,
            no_compress,
            strip,
            work_dir,
            dist_dir,
        } => build_command(
            app_dir,
            entry,
            deps_root,
            search_paths,
            deps_marker,
            packager,
            name,
            icon,
            console,
            no_compress,
            strip,
            work_dir,
            dist_dir,
        ),
        Commands::Manifest {
            app_dir,
            entry,
            deps_root,
            search_paths,
            deps_marker,
            out,
        } => manifest_command(app_dir, entry, deps_root, search_paths, deps_marker, out),
        Commands::Doctor {
            packager,
            app_dir,
            search_paths,
            deps_marker,
        } => doctor_command(packager, app_dir, search_paths, deps_marker),
    }
}

fn build_command(
    app_dir: PathBuf,
    entry: PathBuf,
    deps_root: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
    deps_marker: String,
    packager: PathBuf,
    name: Option<String>,
    icon: Option<PathBuf>,
    console: bool,
    no_compress: bool,
    strip: bool,
    work_dir: PathBuf,
    dist_dir: PathBuf,
) -> Result<()> {
    let dependency_root = locate_dependency_root(deps_root, &search_paths, &deps_marker)?;
    println!("Using dependency root: {}", dependency_root.display());

    let layout = AppLayout::new();
    let mut output = layout.default_output();
    if let Some(name) = name {
        output.executable_name = name;
    }
    output.icon_path = icon.or_else(|| layout.default_icon(&app_dir));
    output.console = console;
    output.compress = !no_compress;
    output.strip_symbols = strip;

    let manifest = ManifestBuilder::new(&app_dir, &dependency_root)
        .build(&entry, output)
        .context("Failed to build bundle manifest")?;

    manifest
        .validate()
        .context("Bundle manifest validation failed")?;

    println!(
        "Resolved {} data and {} binary payload(s)",
        manifest.datas.len(),
        manifest.binaries.len()
    );

    let process_packager = ProcessPackager::new(&packager, &work_dir, &dist_dir);
    let output_dir =
        emit(&manifest, &process_packager).context("Packaging pipeline failed")?;

    println!("\nBundle written to: {}", output_dir.display());

    Ok(())
}

fn manifest_command(
    app_dir: PathBuf,
    entry: PathBuf,
    deps_root: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
    deps_marker: String,
    out: PathBuf,
) -> Result<()> {
    let dependency_root = locate_dependency_root(deps_root, &search_paths, &deps_marker)?;
    println!("Using dependency root: {}", dependency_root.display());

    let layout = AppLayout::new();
    let mut output = layout.default_output();
    output.icon_path = layout.default_icon(&app_dir);

    let manifest = ManifestBuilder::new(&app_dir, &dependency_root)
        .build(&entry, output)
        .context("Failed to build bundle manifest")?;

    manifest
        .write(&out)
        .with_context(|| format!("Failed to write manifest to {}", out.display()))?;

    println!(
        "Resolved {} data and {} binary payload(s)",
        manifest.datas.len(),
        manifest.binaries.len()
    );
    println!("\nManifest path: {}", out.display());

    Ok(())
}

fn doctor_command(
    packager: PathBuf,
    app_dir: PathBuf,
    search_paths: Vec<PathBuf>,
    deps_marker: String,
) -> Result<()> {
    println!("ssbpack doctor - checking packaging prerequisites...\n");

    match which::which(&packager) {
        Ok(path) => println!("✓ packager found at: {}", path.display()),
        Err(_) => {
            println!("✗ packager not found: {}", packager.display());
            println!("  Pass --packager to point at the packaging tool");
        }
    }

    let layout = AppLayout::new();

    println!("\nApp tree ({}):", app_dir.display());
    for rule in layout.app_data_rules() {
        report_rule(&app_dir, &rule);
    }

    match resolve_dependency_root(&search_paths, &deps_marker) {
        Ok(root) => {
            println!("\nDependency root ({}):", root.display());
            for rule in layout
                .dependency_data_rules()
                .into_iter()
                .chain(layout.dependency_binary_rules())
            {
                report_rule(&root, &rule);
            }
        }
        Err(e) => println!("\n✗ {}", e),
    }

    println!("\n✓ ssbpack doctor check complete");

    Ok(())
}

fn locate_dependency_root(
    explicit: Option<PathBuf>,
    search_paths: &[PathBuf],
    marker: &str,
) -> Result<PathBuf> {
    match explicit {
        Some(root) => {
            anyhow::ensure!(
                root.exists(),
                "dependency root does not exist: {}",
                root.display()
            );
            Ok(root)
        }
        None => resolve_dependency_root(search_paths, marker)
            .context("Failed to locate the installed-dependencies directory"),
    }
}

fn report_rule(root: &Path, rule: &AssetRule) {
    let (relative, present) = match &rule.source {
        AssetSource::Dir(rel) | AssetSource::File(rel) => (rel.clone(), root.join(rel).exists()),
        AssetSource::Pattern(rel) => {
            let pattern = root.join(rel).to_string_lossy().into_owned();
            let matched = glob::glob(&pattern)
                .map(|mut paths| paths.next().is_some())
                .unwrap_or(false);
            (rel.clone(), matched)
        }
    };

    let mark = if present { "✓" } else { "✗" };
    println!("  {} {} -> {}", mark, relative, rule.destination);
}
