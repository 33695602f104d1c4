//! Upstream repositories the backends clone from

use git2::{Oid, Repository, Signature, Time};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Hash of the commit [`RepositoryFixture::single_commit`] creates
pub const SINGLE_COMMIT_HASH: &str = "92780616d5b685a323ca74253c2107e1425eaa93";

/// Time stamp of the single commit fixture
pub const SINGLE_COMMIT_TIME: i64 = 1_422_189_618;

pub const AUTHOR: &str = "author";
pub const AUTHOR_EMAIL: &str = "author@nodomain.com";

/// A file change applied by [`RepositoryFixture::commit_on`]
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    Write(&'a str, &'a str),
    Delete(&'a str),
}

/// Commits of [`RepositoryFixture::history`], oldest first
#[derive(Debug, Clone)]
pub struct HistoryIds {
    /// a.txt and b.txt
    pub root: String,
    /// a.txt modified, b.txt renamed to c.txt
    pub rename: String,
    /// a.txt deleted, docs/readme.md added
    pub docs: String,
    /// feature.txt on the `feature` branch
    pub feature: String,
    /// c.txt modified on master
    pub mainline: String,
    /// `feature` merged into master
    pub merge: String,
}

impl HistoryIds {
    /// Newest first, the order the backends report them in
    pub fn newest_first(&self) -> Vec<String> {
        vec![
            self.merge.clone(),
            self.mainline.clone(),
            self.feature.clone(),
            self.docs.clone(),
            self.rename.clone(),
            self.root.clone(),
        ]
    }
}

/// A non-bare repository on disk acting as `origin`
pub struct RepositoryFixture {
    _temp_dir: TempDir,
    path: PathBuf,
    repo: Repository,
}

impl RepositoryFixture {
    /// Empty repository whose unborn HEAD points at `master`
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("upstream");
        let mut options = git2::RepositoryInitOptions::new();
        options.initial_head("master");
        let repo = Repository::init_opts(&path, &options).expect("init upstream");
        Self {
            _temp_dir: temp_dir,
            path,
            repo,
        }
    }

    /// One commit with a.txt and b.txt, hash [`SINGLE_COMMIT_HASH`]
    pub fn single_commit() -> Self {
        let fixture = Self::empty();
        fixture.commit_on(
            "HEAD",
            &[],
            &[Change::Write("a.txt", "a\n"), Change::Write("b.txt", "b\n")],
            "3\ntest multiline\ncomment",
            SINGLE_COMMIT_TIME,
        );
        fixture
    }

    /// Six commits with renames, deletions, a sub-path and a merge
    pub fn history() -> (Self, HistoryIds) {
        let fixture = Self::empty();

        let root = fixture.commit_on(
            "HEAD",
            &[],
            &[Change::Write("a.txt", "a\n"), Change::Write("b.txt", "b\n")],
            "root",
            1_600_000_000,
        );
        let rename = fixture.commit_on(
            "HEAD",
            &[root],
            &[
                Change::Write("a.txt", "a\nmore\n"),
                Change::Delete("b.txt"),
                Change::Write("c.txt", "b\n"),
            ],
            "rename b to c",
            1_600_000_100,
        );
        let docs = fixture.commit_on(
            "HEAD",
            &[rename],
            &[Change::Delete("a.txt"), Change::Write("docs/readme.md", "# docs\n")],
            "add docs",
            1_600_000_200,
        );
        let feature = fixture.commit_on(
            "refs/heads/feature",
            &[docs],
            &[Change::Write("feature.txt", "feature\n")],
            "feature work",
            1_600_000_300,
        );
        let mainline = fixture.commit_on(
            "HEAD",
            &[docs],
            &[Change::Write("c.txt", "b\nc\n")],
            "mainline work",
            1_600_000_400,
        );
        let merge = fixture.commit_on(
            "HEAD",
            &[mainline, feature],
            &[Change::Write("feature.txt", "feature\n")],
            "merge feature",
            1_600_000_500,
        );
        fixture.checkout_head();

        let ids = HistoryIds {
            root: root.to_string(),
            rename: rename.to_string(),
            docs: docs.to_string(),
            feature: feature.to_string(),
            mainline: mainline.to_string(),
            merge: merge.to_string(),
        };
        (fixture, ids)
    }

    /// Four side branches off `main`, each merged into master, all committed
    /// in the same second. Returns the side commits, oldest first.
    pub fn simultaneous_merges() -> (Self, Vec<String>) {
        const SECOND: i64 = 1_600_001_000;
        let fixture = Self::empty();

        let root = fixture.commit_on("HEAD", &[], &[Change::Write("main.txt", "root\n")], "root", 1_600_000_000);
        let main = fixture.commit_on("HEAD", &[root], &[Change::Write("main.txt", "main\n")], "main", 1_600_000_500);

        let mut tip = main;
        let mut sides = Vec::new();
        for i in 0..4 {
            let file = format!("side{}.txt", i);
            let side = fixture.commit_on(
                &format!("refs/heads/side{}", i),
                &[main],
                &[Change::Write(&file, "side\n")],
                &format!("side {}", i),
                SECOND,
            );
            tip = fixture.commit_on(
                "HEAD",
                &[tip, side],
                &[Change::Write(&file, "side\n")],
                &format!("merge {}", i),
                SECOND,
            );
            sides.push(side.to_string());
        }
        fixture.checkout_head();
        (fixture, sides)
    }

    /// Repository whose `sub` folder is a submodule pointing at `submodule`
    pub fn with_submodule(submodule: &RepositoryFixture) -> Self {
        let fixture = Self::empty();
        let root = fixture.commit_on("HEAD", &[], &[Change::Write("main.txt", "main\n")], "main", 1_600_000_000);

        {
            let mut sm = fixture
                .repo
                .submodule(&submodule.path().to_string_lossy(), Path::new("sub"), true)
                .expect("submodule setup");
            sm.clone(None).expect("submodule clone");
            sm.add_finalize().expect("submodule finalize");
        }

        fixture.commit_index(&[root], "add submodule", 1_600_000_100);
        fixture
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URL of the repository, so shallow clones work
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn head(&self) -> String {
        self.repo
            .head()
            .expect("head")
            .target()
            .expect("direct head")
            .to_string()
    }

    /// Commit `changes` on top of HEAD
    pub fn commit(&self, changes: &[Change<'_>], message: &str, seconds: i64) -> String {
        let parent = Oid::from_str(&self.head()).expect("oid");
        let oid = self.commit_on("HEAD", &[parent], changes, message, seconds);
        self.checkout_head();
        oid.to_string()
    }

    /// Commit the tree of `parents[0]` plus `changes`, updating `reference`
    pub fn commit_on(
        &self,
        reference: &str,
        parents: &[Oid],
        changes: &[Change<'_>],
        message: &str,
        seconds: i64,
    ) -> Oid {
        let mut index = self.repo.index().expect("index");
        match parents.first() {
            Some(first) => {
                let tree = self.repo.find_commit(*first).expect("parent").tree().expect("tree");
                index.read_tree(&tree).expect("read tree");
            }
            None => index.clear().expect("clear index"),
        }

        for change in changes {
            match *change {
                Change::Write(path, content) => {
                    let file = self.path.join(path);
                    if let Some(parent) = file.parent() {
                        fs::create_dir_all(parent).expect("create dir");
                    }
                    fs::write(&file, content).expect("write file");
                    index.add_path(Path::new(path)).expect("add path");
                }
                Change::Delete(path) => {
                    let file = self.path.join(path);
                    if file.exists() {
                        fs::remove_file(&file).expect("remove file");
                    }
                    index.remove_path(Path::new(path)).expect("remove path");
                }
            }
        }
        index.write().expect("write index");

        self.write_commit(reference, parents, message, seconds)
    }

    /// Commit whatever is staged
    fn commit_index(&self, parents: &[Oid], message: &str, seconds: i64) -> Oid {
        self.write_commit("HEAD", parents, message, seconds)
    }

    fn write_commit(&self, reference: &str, parents: &[Oid], message: &str, seconds: i64) -> Oid {
        let mut index = self.repo.index().expect("index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("tree");
        let signature = Signature::new(AUTHOR, AUTHOR_EMAIL, &Time::new(seconds, 0)).expect("signature");
        let parents: Vec<git2::Commit<'_>> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).expect("parent commit"))
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        self.repo
            .commit(Some(reference), &signature, &signature, message, &tree, &parent_refs)
            .expect("commit")
    }

    fn checkout_head(&self) {
        let mut options = git2::build::CheckoutBuilder::new();
        options.force().remove_untracked(true);
        self.repo.checkout_head(Some(&mut options)).expect("checkout head");
    }
}
