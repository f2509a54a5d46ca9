//! Lockfile generation
//!
//! The package source is unpacked by a build that also records where the
//! lockfile tool lives, then the tool runs over a writable copy and the
//! resulting lockfile is placed beside the manifest.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::config::UpdateOptions;
use crate::error::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockfileKind {
    Cargo,
    Npm,
}

impl LockfileKind {
    pub fn bin_name(self) -> &'static str {
        match self {
            LockfileKind::Cargo => "cargo",
            LockfileKind::Npm => "npm",
        }
    }

    pub fn lockfile_name(self) -> &'static str {
        match self {
            LockfileKind::Cargo => "Cargo.lock",
            LockfileKind::Npm => "package-lock.json",
        }
    }

    fn tool_args(self, metadata_path: &str) -> Vec<String> {
        match self {
            LockfileKind::Cargo => vec![
                "generate-lockfile".to_string(),
                "--manifest-path".to_string(),
                format!("{metadata_path}/Cargo.toml"),
            ],
            LockfileKind::Npm => vec![
                "install".to_string(),
                "--package-lock-only".to_string(),
                "--prefix".to_string(),
                metadata_path.to_string(),
            ],
        }
    }

    /// Attributes nulled out so the unpack build does not need the old deps
    fn nix_override(self) -> &'static str {
        match self {
            LockfileKind::Cargo => "cargoDeps = null;\n    cargoVendorDir = \".\";",
            LockfileKind::Npm => "npmDeps = null;\n    npmDepsHash = null;",
        }
    }
}

fn unpack_expr(package_expr: &str, kind: LockfileKind) -> String {
    let bin = kind.bin_name();
    format!(
        r#"{package_expr}.overrideAttrs (old: {{
    {override_attrs}
    postUnpack = ''
      cp -pr --reflink=auto -- $sourceRoot $out
      mkdir -p "$out/nix-support"
      command -v {bin} > $out/nix-support/{bin}-bin || {{
        echo "no {bin} executable found in native build inputs" >&2
        exit 1
      }}
      exit
    '';
    outputs = [ "out" ];
    separateDebugInfo = false;
  }})"#,
        override_attrs = kind.nix_override(),
    )
}

async fn build_source_with_tool(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    kind: LockfileKind,
) -> Result<PathBuf, UpdateError> {
    let spec = CommandSpec::new("nix")
        .args(["build", "-L", "--no-link", "--impure", "--print-out-paths", "--expr"])
        .arg(unpack_expr(&opts.package_expr(), kind))
        .args(&opts.extra_flags);
    let output = run_checked(runner, &spec).await?;
    Ok(PathBuf::from(output.stdout.trim()))
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), UpdateError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn resolve_lockfile_path(root: &Path, metadata_path: &str, lockfile_name: &str) -> PathBuf {
    let in_subdir = root.join(metadata_path).join(lockfile_name);
    if in_subdir.exists() {
        in_subdir
    } else {
        root.join(lockfile_name)
    }
}

fn make_writable(path: &Path) -> Result<(), UpdateError> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o200);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

/// Regenerate the `kind` lockfile of the package and copy it next to `filename`.
pub async fn generate_lockfile(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    filename: &Path,
    kind: LockfileKind,
) -> Result<(), UpdateError> {
    let src = build_source_with_tool(runner, opts, kind).await?;
    let workdir = tempfile::tempdir()?;
    copy_tree(&src, workdir.path())?;

    let metadata_path = opts.lockfile_metadata_path.as_str();
    let existing = resolve_lockfile_path(workdir.path(), metadata_path, kind.lockfile_name());
    if existing.exists() {
        make_writable(&existing)?;
    }

    let bin_file = src
        .join("nix-support")
        .join(format!("{}-bin", kind.bin_name()));
    let bin = std::fs::read_to_string(bin_file)?;
    let spec = CommandSpec::new(bin.trim_end_matches('\n'))
        .args(kind.tool_args(metadata_path))
        .cwd(workdir.path());
    run_checked(runner, &spec).await?;

    let generated = resolve_lockfile_path(workdir.path(), metadata_path, kind.lockfile_name());
    let destination = filename
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(kind.lockfile_name());
    info!("Write {}", destination.display());
    std::fs::copy(generated, &destination)?;
    Ok(())
}
