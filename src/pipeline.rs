use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::{BundleError, Result};
use crate::manifest::Manifest;

/// The four packager stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    Archive,
    Link,
    Collect,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Archive => "archive",
            Stage::Link => "link",
            Stage::Collect => "collect",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the analysis stage: the dependency graph the later stages
/// consume.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub graph_path: PathBuf,
}

/// Output of the archive stage: the application payload.
#[derive(Debug, Clone)]
pub struct ArchivePayload {
    pub archive_path: PathBuf,
}

/// Output of the link stage: the bootstrap executable.
#[derive(Debug, Clone)]
pub struct ExecutableArtifact {
    pub executable_path: PathBuf,
}

/// The downstream packaging tool. Its internals are opaque; the bundle
/// tool only threads artifacts through the four stages in order.
pub trait Packager {
    fn analyze(&self, manifest: &Manifest) -> Result<Analysis>;
    fn archive(&self, manifest: &Manifest, analysis: &Analysis) -> Result<ArchivePayload>;
    fn link(&self, manifest: &Manifest, payload: &ArchivePayload) -> Result<ExecutableArtifact>;
    fn collect(&self, manifest: &Manifest, artifact: &ExecutableArtifact) -> Result<PathBuf>;
}

/// Runs all four stages strictly in order. The first failure aborts the
/// run; later stages are not invoked and nothing is retried, since
/// packaging is deterministic given identical inputs. Returns the
/// collected output directory.
pub fn emit(manifest: &Manifest, packager: &dyn Packager) -> Result<PathBuf> {
    let analysis = packager.analyze(manifest)?;
    info!(graph = %analysis.graph_path.display(), "analysis complete");

    let payload = packager.archive(manifest, &analysis)?;
    info!(archive = %payload.archive_path.display(), "archive complete");

    let artifact = packager.link(manifest, &payload)?;
    info!(executable = %artifact.executable_path.display(), "link complete");

    let output_dir = packager.collect(manifest, &artifact)?;
    info!(output = %output_dir.display(), "collect complete");

    Ok(output_dir)
}

/// Drives an external packager executable, one subcommand per stage.
/// Stage artifacts land in the work directory; the collected bundle
/// lands in `<dist_dir>/<executable_name>`.
pub struct ProcessPackager {
    program: PathBuf,
    work_dir: PathBuf,
    dist_dir: PathBuf,
}

impl ProcessPackager {
    pub fn new(
        program: impl AsRef<Path>,
        work_dir: impl AsRef<Path>,
        dist_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            work_dir: work_dir.as_ref().to_path_buf(),
            dist_dir: dist_dir.as_ref().to_path_buf(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir.join("manifest.json")
    }

    fn run(&self, stage: Stage, cmd: &mut Command) -> Result<()> {
        info!(stage = %stage, program = %self.program.display(), "running packager stage");

        let output = cmd.output().map_err(|e| BundleError::ExternalTool {
            stage,
            message: format!("failed to launch {}: {}", self.program.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BundleError::ExternalTool {
                stage,
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

impl Packager for ProcessPackager {
    fn analyze(&self, manifest: &Manifest) -> Result<Analysis> {
        fs::create_dir_all(&self.work_dir)?;

        // The manifest file written here is referenced in place by the
        // later stages.
        let manifest_path = self.manifest_path();
        manifest.write(&manifest_path)?;

        let graph_path = self.work_dir.join("analysis.json");
        let mut cmd = Command::new(&self.program);
        cmd.arg(Stage::Analyze.as_str())
            .arg("--manifest")
            .arg(&manifest_path)
            .arg("--out")
            .arg(&graph_path);

        self.run(Stage::Analyze, &mut cmd)?;
        Ok(Analysis { graph_path })
    }

    fn archive(&self, _manifest: &Manifest, analysis: &Analysis) -> Result<ArchivePayload> {
        let archive_path = self.work_dir.join("payload.pkg");
        let mut cmd = Command::new(&self.program);
        cmd.arg(Stage::Archive.as_str())
            .arg("--graph")
            .arg(&analysis.graph_path)
            .arg("--out")
            .arg(&archive_path);

        self.run(Stage::Archive, &mut cmd)?;
        Ok(ArchivePayload { archive_path })
    }

    fn link(&self, manifest: &Manifest, payload: &ArchivePayload) -> Result<ExecutableArtifact> {
        let executable_path = self.work_dir.join(format!(
            "{}{}",
            manifest.output.executable_name,
            std::env::consts::EXE_SUFFIX
        ));

        let mut cmd = Command::new(&self.program);
        cmd.arg(Stage::Link.as_str())
            .arg("--archive")
            .arg(&payload.archive_path)
            .arg("--out")
            .arg(&executable_path);

        cmd.arg(if manifest.output.console {
            "--console"
        } else {
            "--windowed"
        });
        if manifest.output.compress {
            cmd.arg("--compress");
        }
        if manifest.output.strip_symbols {
            cmd.arg("--strip");
        }
        if let Some(icon) = &manifest.output.icon_path {
            cmd.arg("--icon").arg(icon);
        }

        self.run(Stage::Link, &mut cmd)?;
        Ok(ExecutableArtifact { executable_path })
    }

    fn collect(&self, manifest: &Manifest, artifact: &ExecutableArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dist_dir)?;

        let output_dir = self.dist_dir.join(&manifest.output.executable_name);
        let mut cmd = Command::new(&self.program);
        cmd.arg(Stage::Collect.as_str())
            .arg("--executable")
            .arg(&artifact.executable_path)
            .arg("--manifest")
            .arg(self.manifest_path())
            .arg("--out")
            .arg(&output_dir);

        self.run(Stage::Collect, &mut cmd)?;
        Ok(output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::OutputSpec;
    use std::cell::RefCell;

    fn sample_manifest() -> Manifest {
        Manifest {
            entry_script: PathBuf::from("app/main.py"),
            extra_search_paths: vec![PathBuf::from("app")],
            binaries: vec![],
            datas: vec![],
            hidden_imports: vec![],
            output: OutputSpec {
                executable_name: "skytemple_ssb_debugger".to_string(),
                icon_path: None,
                console: false,
                compress: true,
                strip_symbols: false,
            },
        }
    }

    struct ScriptedPackager {
        calls: RefCell<Vec<Stage>>,
        fail_at: Option<Stage>,
    }

    impl ScriptedPackager {
        fn new(fail_at: Option<Stage>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_at,
            }
        }

        fn record(&self, stage: Stage) -> Result<()> {
            self.calls.borrow_mut().push(stage);
            if self.fail_at == Some(stage) {
                return Err(BundleError::ExternalTool {
                    stage,
                    message: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }

    impl Packager for ScriptedPackager {
        fn analyze(&self, _manifest: &Manifest) -> Result<Analysis> {
            self.record(Stage::Analyze)?;
            Ok(Analysis {
                graph_path: PathBuf::from("analysis.json"),
            })
        }

        fn archive(&self, _manifest: &Manifest, _analysis: &Analysis) -> Result<ArchivePayload> {
            self.record(Stage::Archive)?;
            Ok(ArchivePayload {
                archive_path: PathBuf::from("payload.pkg"),
            })
        }

        fn link(
            &self,
            _manifest: &Manifest,
            _payload: &ArchivePayload,
        ) -> Result<ExecutableArtifact> {
            self.record(Stage::Link)?;
            Ok(ExecutableArtifact {
                executable_path: PathBuf::from("skytemple_ssb_debugger"),
            })
        }

        fn collect(&self, manifest: &Manifest, _artifact: &ExecutableArtifact) -> Result<PathBuf> {
            self.record(Stage::Collect)?;
            Ok(PathBuf::from("dist").join(&manifest.output.executable_name))
        }
    }

    #[test]
    fn test_emit_runs_all_stages_in_order() {
        let manifest = sample_manifest();
        let packager = ScriptedPackager::new(None);

        let output_dir = emit(&manifest, &packager).unwrap();

        assert_eq!(output_dir, PathBuf::from("dist/skytemple_ssb_debugger"));
        assert_eq!(
            *packager.calls.borrow(),
            vec![Stage::Analyze, Stage::Archive, Stage::Link, Stage::Collect]
        );
    }

    #[test]
    fn test_link_failure_skips_collect() {
        let manifest = sample_manifest();
        let packager = ScriptedPackager::new(Some(Stage::Link));

        let err = emit(&manifest, &packager).unwrap_err();

        match err {
            BundleError::ExternalTool { stage, .. } => assert_eq!(stage, Stage::Link),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            *packager.calls.borrow(),
            vec![Stage::Analyze, Stage::Archive, Stage::Link]
        );
    }

    #[test]
    fn test_missing_packager_program_is_a_stage_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let packager = ProcessPackager::new(
            "ssbpack-no-such-packager",
            tmp.path().join("work"),
            tmp.path().join("dist"),
        );

        let err = packager.analyze(&sample_manifest()).unwrap_err();

        match err {
            BundleError::ExternalTool { stage, message } => {
                assert_eq!(stage, Stage::Analyze);
                assert!(message.contains("failed to launch"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
