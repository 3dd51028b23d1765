use anyhow::{Context, Result};
use cargo_metadata::MetadataCommand;
use std::fs;
use std::path::Path;

use crate::domain::source::SourceFile;

/// The loaded input set: source files keyed by path relative to the source
/// root, plus the crate root file when it could be determined.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub files: Vec<SourceFile>,
    pub root_rel: Option<String>,
}

pub struct ProjectLoader;

impl ProjectLoader {
    /// Load an explicit list of source files. Relative paths are the bare
    /// file names; the crate root is the single file, or `main.rs` when the
    /// list carries one.
    pub fn load_files(paths: &[String]) -> Result<LoadedProject> {
        let mut files = Vec::new();
        for path in paths {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file {}", path))?;
            let rel_path = Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            files.push(SourceFile { rel_path, content });
        }
        Ok(Self::finish(files))
    }

    /// Load all `.rs` files under a directory, relative to it.
    pub fn load_folder(dir: &str) -> Result<LoadedProject> {
        let base = Path::new(dir);
        let mut files = Vec::new();
        Self::collect_rs_recursive(base, base, &mut files)?;
        Ok(Self::finish(files))
    }

    /// Load the sources of a Cargo binary crate via cargo metadata.
    /// The bin target's src_path names the crate root; every `.rs` file
    /// under its directory belongs to the program.
    pub fn load_cargo_project(manifest_path: &str) -> Result<LoadedProject> {
        let metadata = MetadataCommand::new()
            .manifest_path(manifest_path)
            .no_deps()
            .exec()
            .context("Failed to execute cargo metadata")?;

        for package_id in &metadata.workspace_members {
            let Some(package) = metadata.packages.iter().find(|p| &p.id == package_id) else {
                continue;
            };
            for target in &package.targets {
                if !target.kind.iter().any(|k| k == "bin") {
                    continue;
                }
                let src_path = target.src_path.as_std_path();
                let src_dir = src_path.parent().unwrap_or(src_path);

                let mut files = Vec::new();
                Self::collect_rs_recursive(src_dir, src_dir, &mut files)?;
                let mut project = Self::finish(files);
                project.root_rel = src_path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string());
                return Ok(project);
            }
        }
        anyhow::bail!("no binary target found in {}", manifest_path)
    }

    fn finish(mut files: Vec<SourceFile>) -> LoadedProject {
        // Deterministic file order feeds deterministic id assignment.
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        files.dedup_by(|a, b| a.rel_path == b.rel_path);

        let root_rel = if files.len() == 1 {
            Some(files[0].rel_path.clone())
        } else {
            files
                .iter()
                .find(|f| f.rel_path == "main.rs")
                .map(|f| f.rel_path.clone())
        };
        LoadedProject { files, root_rel }
    }

    fn collect_rs_recursive(base: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> Result<()> {
        if dir.ends_with("target") || dir.ends_with(".git") {
            return Ok(());
        }
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                Self::collect_rs_recursive(base, &path, out)?;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read file {}", path.display()))?;
                let rel_path = path
                    .strip_prefix(base)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .to_string();
                out.push(SourceFile { rel_path, content });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_folder_collects_relative_paths() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::create_dir(dir.path().join("util")).unwrap();
        fs::write(dir.path().join("util/helpers.rs"), "pub fn x() {}").unwrap();

        let project = ProjectLoader::load_folder(dir.path().to_str().unwrap()).unwrap();
        let paths: Vec<_> = project.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["main.rs", "util/helpers.rs"]);
        assert_eq!(project.root_rel.as_deref(), Some("main.rs"));
    }

    #[test]
    fn test_single_file_is_its_own_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prog.rs");
        fs::write(&path, "fn main() {}").unwrap();

        let project = ProjectLoader::load_files(&[path.to_string_lossy().to_string()]).unwrap();
        assert_eq!(project.files.len(), 1);
        assert_eq!(project.root_rel.as_deref(), Some("prog.rs"));
    }

    #[test]
    fn test_multiple_files_without_main_have_no_root() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.rs");
        let b = dir.path().join("b.rs");
        fs::write(&a, "fn a() {}").unwrap();
        fs::write(&b, "fn b() {}").unwrap();

        let project = ProjectLoader::load_files(&[
            a.to_string_lossy().to_string(),
            b.to_string_lossy().to_string(),
        ])
        .unwrap();
        assert!(project.root_rel.is_none());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ProjectLoader::load_files(&["does-not-exist.rs".to_string()]).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.rs"));
    }
}
