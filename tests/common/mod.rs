//! Shared fixtures for integration tests.
//!
//! Repositories are built with git2 directly: branches are committed from a
//! list of `(path, contents)` pairs without touching the working tree.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use git2::{ObjectType, Repository, Signature};
use tempfile::TempDir;

use qyt::git::Git;

/// A real repository in a temporary directory.
pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    /// Create an empty repository with a local identity.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("failed to init repo");
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        Self { dir, repo }
    }

    /// Path of the working directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Open the repository as an object store.
    pub fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    /// Commit `files` as the full contents of branch `name`.
    ///
    /// The commit's parent is the current tip of the branch, if any.
    pub fn commit_branch(&self, name: &str, files: &[(&str, &str)]) -> String {
        let refname = format!("refs/heads/{name}");
        let tree_oid = self.write_tree(files);
        let tree = self.repo.find_tree(tree_oid).unwrap();
        let parent = self
            .repo
            .refname_to_id(&refname)
            .ok()
            .map(|oid| self.repo.find_commit(oid).unwrap());
        let parents: Vec<_> = parent.iter().collect();

        let when = git2::Time::new(1_700_000_000, 0);
        let sig = Signature::new("Test User", "test@example.com", &when).unwrap();
        self.repo
            .commit(
                Some(&refname),
                &sig,
                &sig,
                &format!("commit on {name}"),
                &tree,
                &parents,
            )
            .unwrap()
            .to_string()
    }

    /// Point `name` at `target` without creating a commit.
    pub fn create_ref(&self, name: &str, target: &str) {
        let oid = git2::Oid::from_str(target).unwrap();
        self.repo
            .reference(&format!("refs/heads/{name}"), oid, true, "test")
            .unwrap();
    }

    /// Current tip of a branch.
    pub fn tip(&self, name: &str) -> Option<String> {
        self.repo
            .refname_to_id(&format!("refs/heads/{name}"))
            .ok()
            .map(|oid| oid.to_string())
    }

    /// Root tree of a branch's tip commit.
    pub fn tree_of(&self, name: &str) -> String {
        self.commit(name).tree_id().to_string()
    }

    /// Id of the entry at `path` on a branch.
    pub fn entry_id(&self, name: &str, path: &str) -> Option<String> {
        let tree = self.commit(name).tree().unwrap();
        tree.get_path(Path::new(path))
            .ok()
            .map(|entry| entry.id().to_string())
    }

    /// Contents of `path` on a branch.
    pub fn read_file(&self, name: &str, path: &str) -> Option<String> {
        let tree = self.commit(name).tree().unwrap();
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = self.repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8(blob.content().to_vec()).unwrap())
    }

    /// Message and first parent of a branch's tip commit.
    pub fn head_commit(&self, name: &str) -> (String, Option<String>) {
        let commit = self.commit(name);
        (
            commit.message().unwrap_or_default().to_string(),
            commit.parent_ids().next().map(|oid| oid.to_string()),
        )
    }

    /// Number of objects in the object database.
    pub fn object_count(&self) -> usize {
        let odb = self.repo.odb().unwrap();
        let mut count = 0;
        odb.foreach(|_| {
            count += 1;
            true
        })
        .unwrap();
        count
    }

    /// Short names of all branches, sorted.
    pub fn branches(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .unwrap()
            .map(|branch| branch.unwrap().0.name().unwrap().unwrap().to_string())
            .collect();
        names.sort();
        names
    }

    fn commit(&self, name: &str) -> git2::Commit<'_> {
        self.repo
            .revparse_single(&format!("refs/heads/{name}"))
            .unwrap()
            .peel(ObjectType::Commit)
            .unwrap()
            .into_commit()
            .unwrap()
    }

    fn write_tree(&self, files: &[(&str, &str)]) -> git2::Oid {
        let mut root = Dir::default();
        for (path, contents) in files {
            root.insert(path, contents);
        }
        root.write(&self.repo)
    }
}

#[derive(Default)]
struct Dir {
    files: BTreeMap<String, String>,
    dirs: BTreeMap<String, Dir>,
}

impl Dir {
    fn insert(&mut self, path: &str, contents: &str) {
        match path.split_once('/') {
            Some((head, rest)) => self
                .dirs
                .entry(head.to_string())
                .or_default()
                .insert(rest, contents),
            None => {
                self.files.insert(path.to_string(), contents.to_string());
            }
        }
    }

    fn write(&self, repo: &Repository) -> git2::Oid {
        let mut builder = repo.treebuilder(None).unwrap();
        for (name, contents) in &self.files {
            let blob = repo.blob(contents.as_bytes()).unwrap();
            builder.insert(name, blob, 0o100644).unwrap();
        }
        for (name, dir) in &self.dirs {
            builder.insert(name, dir.write(repo), 0o040000).unwrap();
        }
        builder.write().unwrap()
    }
}
