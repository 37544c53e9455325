//! Builders for manifest trees and git fixture repositories.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Builder for a directory tree of manifests and other files.
#[derive(Debug, Clone, Default)]
pub struct CatalogTreeBuilder {
    files: Vec<(String, String)>,
}

impl CatalogTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `<dir>/manifest.yaml` declaring `name`.
    pub fn manifest(self, dir: &str, name: &str) -> Self {
        self.file(&format!("{}/manifest.yaml", dir), &format!("name: {}\n", name))
    }

    /// Adds `<dir>/manifest.yml` declaring `name`.
    pub fn manifest_yml(self, dir: &str, name: &str) -> Self {
        self.file(&format!("{}/manifest.yml", dir), &format!("name: {}\n", name))
    }

    /// Adds an arbitrary file.
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    /// Writes every file under `root`, creating directories as needed.
    pub fn write_to(&self, root: &Path) {
        for (path, content) in &self.files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
    }
}

/// The two-component catalog used throughout the tests:
/// `services/auth` (auth-service) and `platform/infra` (platform-infra).
pub fn sample_catalog() -> CatalogTreeBuilder {
    CatalogTreeBuilder::new()
        .manifest("services/auth", "auth-service")
        .manifest_yml("platform/infra", "platform-infra")
        .file("README.md", "# catalog\n")
}

/// A local git repository on branch `main`, reachable through a `file://` URL.
pub struct GitFixture {
    dir: PathBuf,
}

impl GitFixture {
    /// Initialises a repository at `dir` and commits `tree` as its first commit.
    pub fn create(dir: &Path, tree: &CatalogTreeBuilder) -> Self {
        fs::create_dir_all(dir).unwrap();
        git(dir, &["init", "-q"]);
        git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let fixture = Self {
            dir: dir.to_path_buf(),
        };
        fixture.commit(tree, "initial catalog");
        fixture
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.dir.display())
    }

    /// Writes `tree` and commits everything.
    pub fn commit(&self, tree: &CatalogTreeBuilder, message: &str) {
        tree.write_to(&self.dir);
        git(&self.dir, &["add", "-A"]);
        git(&self.dir, &["commit", "-q", "-m", message]);
    }

    /// Deletes a tracked path and commits.
    pub fn remove(&self, path: &str, message: &str) {
        git(&self.dir, &["rm", "-r", "-q", path]);
        git(&self.dir, &["commit", "-q", "-m", message]);
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args([
            "-c",
            "user.name=Catalog Tests",
            "-c",
            "user.email=catalog-tests@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("git must be installed to run these tests");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}
