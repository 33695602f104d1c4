//! Clone and history queries against real fixture repositories, run on both
//! backends

mod common;

use common::test_fixtures::{
    Change, RepositoryFixture, AUTHOR, AUTHOR_EMAIL, SINGLE_COMMIT_HASH, SINGLE_COMMIT_TIME,
};
use common::test_helpers::{entries, BackendUnderTest, ALL_BACKENDS};
use gitpoller::domain::entities::repository_config::RepositoryConfig;
use gitpoller::domain::entities::revision::{FileAction, ModifiedFile, Revision};
use gitpoller::domain::value_objects::backend_kind::BackendKind;
use gitpoller::infrastructure::scm::git_lib_scm::SHALLOW_CLONE_UNSUPPORTED;
use gitpoller::infrastructure::scm::GitOperations;
use pretty_assertions::assert_eq;
use std::fs;

fn cloned(kind: BackendKind, fixture: &RepositoryFixture) -> BackendUnderTest {
    let under_test = BackendUnderTest::for_url(kind, &fixture.url());
    under_test.backend.clone_repository().unwrap();
    under_test
}

fn files(revision: &Revision) -> Vec<(String, FileAction)> {
    revision
        .modified_files()
        .iter()
        .map(|file| (file.path.clone(), file.action))
        .collect()
}

#[test]
fn test_single_commit_fixture() {
    let fixture = RepositoryFixture::single_commit();
    assert_eq!(fixture.head(), SINGLE_COMMIT_HASH);

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;

        assert_eq!(backend.commit_count().unwrap(), 1, "{}", kind);
        assert_eq!(backend.current_revision().unwrap().as_deref(), Some(SINGLE_COMMIT_HASH));

        let latest = backend.latest_revision(&[]).unwrap().unwrap();
        assert_eq!(latest.revision(), SINGLE_COMMIT_HASH);
        assert_eq!(latest.comment(), "3\ntest multiline\ncomment");
        assert_eq!(latest.user(), AUTHOR);
        assert_eq!(latest.email_id(), AUTHOR_EMAIL);
        assert_eq!(latest.timestamp().timestamp_millis(), SINGLE_COMMIT_TIME * 1000);
        assert!(!latest.is_merge_commit());
        assert_eq!(
            latest.modified_files(),
            &[
                ModifiedFile::new("a.txt", FileAction::Added),
                ModifiedFile::new("b.txt", FileAction::Added),
            ]
        );

        assert!(backend.revisions_since(SINGLE_COMMIT_HASH, &[]).unwrap().is_empty());
        assert_eq!(backend.current_branch().unwrap(), "master");
        assert_eq!(
            fs::read_to_string(under_test.path("a.txt")).unwrap(),
            "a\n",
            "{} checks out the tree",
            kind
        );
    }
}

#[test]
fn test_history_queries() {
    let (fixture, ids) = RepositoryFixture::history();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;

        let all = backend.all_revisions().unwrap();
        let hashes: Vec<String> = all.iter().map(|r| r.revision().to_string()).collect();
        assert_eq!(hashes, ids.newest_first(), "{} orders newest first", kind);
        assert_eq!(backend.commit_count().unwrap(), all.len());
        assert_eq!(backend.latest_revision(&[]).unwrap().as_ref(), all.first());

        let since = backend.revisions_since(&ids.rename, &[]).unwrap();
        assert_eq!(since, all[..4].to_vec(), "{}", kind);
        assert!(backend.revisions_since(&ids.merge, &[]).unwrap().is_empty());
    }
}

#[test]
fn test_modified_files() {
    let (fixture, ids) = RepositoryFixture::history();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;

        let root = backend.details_for_revision(&ids.root).unwrap().unwrap();
        assert_eq!(
            files(&root),
            vec![("a.txt".to_string(), FileAction::Added), ("b.txt".to_string(), FileAction::Added)]
        );

        let rename = backend.details_for_revision(&ids.rename).unwrap().unwrap();
        assert_eq!(
            files(&rename),
            vec![("a.txt".to_string(), FileAction::Modified), ("c.txt".to_string(), FileAction::Added)],
            "{} reports a rename as an addition of the new path",
            kind
        );

        let docs = backend.details_for_revision(&ids.docs).unwrap().unwrap();
        assert_eq!(
            files(&docs),
            vec![
                ("a.txt".to_string(), FileAction::Deleted),
                ("docs/readme.md".to_string(), FileAction::Added),
            ]
        );

        let merge = backend.details_for_revision(&ids.merge).unwrap().unwrap();
        assert!(merge.is_merge_commit());
        assert_eq!(files(&merge), vec![("feature.txt".to_string(), FileAction::Added)]);
    }
}

#[test]
fn test_backends_agree() {
    let (fixture, ids) = RepositoryFixture::history();
    let cmd = cloned(BackendKind::CommandLine, &fixture);
    let lib = cloned(BackendKind::Library, &fixture);

    assert_eq!(cmd.backend.all_revisions().unwrap(), lib.backend.all_revisions().unwrap());
    assert_eq!(
        cmd.backend.revisions_since(&ids.docs, &[]).unwrap(),
        lib.backend.revisions_since(&ids.docs, &[]).unwrap()
    );
    assert_eq!(
        cmd.backend.details_for_revision(&ids.feature).unwrap(),
        lib.backend.details_for_revision(&ids.feature).unwrap()
    );
}

#[test]
fn test_backends_agree_on_equal_commit_times() {
    let (fixture, sides) = RepositoryFixture::simultaneous_merges();
    let cmd = cloned(BackendKind::CommandLine, &fixture);
    let lib = cloned(BackendKind::Library, &fixture);

    let all = cmd.backend.all_revisions().unwrap();
    let comments: Vec<&str> = all.iter().map(|r| r.comment()).collect();
    assert_eq!(
        comments,
        vec!["merge 3", "merge 2", "side 3", "merge 1", "side 2", "merge 0", "side 1", "side 0", "main", "root"]
    );
    assert_eq!(all, lib.backend.all_revisions().unwrap());

    for side in &sides {
        assert_eq!(
            cmd.backend.revisions_since(side, &[]).unwrap(),
            lib.backend.revisions_since(side, &[]).unwrap(),
            "since {}",
            side
        );
    }
}

#[test]
fn test_sub_path_filter() {
    let (fixture, ids) = RepositoryFixture::history();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;

        let latest = backend.latest_revision(&["docs".to_string()]).unwrap().unwrap();
        assert_eq!(latest.revision(), ids.docs, "{}", kind);

        // the merge does not change c.txt against its first parent
        let renamed = backend.latest_revision(&["c.txt".to_string()]).unwrap().unwrap();
        assert_eq!(renamed.revision(), ids.mainline, "{}", kind);

        let merged = backend.latest_revision(&["feature.txt".to_string()]).unwrap().unwrap();
        assert_eq!(merged.revision(), ids.merge, "{}", kind);

        let old_name = backend.latest_revision(&["b.txt".to_string()]).unwrap().unwrap();
        assert_eq!(old_name.revision(), ids.rename, "{}", kind);

        let c_history: Vec<String> = backend
            .revisions_since(&ids.root, &["c.txt".to_string()])
            .unwrap()
            .iter()
            .map(|r| r.revision().to_string())
            .collect();
        assert_eq!(c_history, vec![ids.mainline.clone(), ids.rename.clone()], "{}", kind);

        let feature_history: Vec<String> = backend
            .revisions_since(&ids.root, &["feature.txt".to_string()])
            .unwrap()
            .iter()
            .map(|r| r.revision().to_string())
            .collect();
        assert_eq!(feature_history, vec![ids.merge.clone(), ids.feature.clone()], "{}", kind);

        assert!(backend.latest_revision(&["missing".to_string()]).unwrap().is_none());
    }
}

#[test]
fn test_unknown_revision() {
    let fixture = RepositoryFixture::single_commit();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;

        assert_eq!(
            backend
                .details_for_revision("0000000000000000000000000000000000000000")
                .unwrap(),
            None
        );
        assert_eq!(backend.details_for_revision("no-such-branch").unwrap(), None);

        // an unknown starting point yields the whole history
        let since = backend.revisions_since("0123456789abcdef", &[]).unwrap();
        assert_eq!(since.len(), 1, "{}", kind);
    }
}

#[test]
fn test_branch_to_revision_map() {
    let (fixture, ids) = RepositoryFixture::history();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let map = under_test
            .backend
            .branch_to_revision_map("refs/remotes/origin/")
            .unwrap();

        assert_eq!(map.get("master"), Some(&ids.merge), "{}", kind);
        assert_eq!(map.get("feature"), Some(&ids.feature), "{}", kind);
        assert!(map.keys().all(|name| !name.starts_with("refs/")));
    }
}

#[test]
fn test_working_repository_url() {
    let fixture = RepositoryFixture::single_commit();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        assert_eq!(
            under_test.backend.working_repository_url().unwrap(),
            Some(fixture.url()),
            "{}",
            kind
        );
    }
}

#[test]
fn test_fetch_and_reset() {
    let fixture = RepositoryFixture::single_commit();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;
        let before = fixture.head();
        let count = backend.commit_count().unwrap();
        let content = format!("a\nchanged by {}\n", kind);

        let next = fixture.commit(
            &[Change::Write("a.txt", &content)],
            &format!("update {}", kind),
            SINGLE_COMMIT_TIME + 60,
        );

        backend.fetch("").unwrap();
        assert_eq!(backend.commit_count().unwrap(), count, "{} fetch leaves HEAD alone", kind);

        backend.reset_hard("origin/master").unwrap();
        assert_eq!(backend.current_revision().unwrap(), Some(next.clone()));
        assert_eq!(fs::read_to_string(under_test.path("a.txt")).unwrap(), content);

        let since = backend.revisions_since(&before, &[]).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].revision(), next);
        assert_eq!(files(&since[0]), vec![("a.txt".to_string(), FileAction::Modified)]);

        backend.reset_soft(&before).unwrap();
        assert_eq!(backend.current_revision().unwrap(), Some(before.clone()));
        assert_eq!(
            fs::read_to_string(under_test.path("a.txt")).unwrap(),
            content,
            "{} soft reset keeps the worktree",
            kind
        );
    }
}

#[test]
fn test_clean_and_gc() {
    let fixture = RepositoryFixture::single_commit();

    for kind in ALL_BACKENDS {
        let under_test = cloned(kind, &fixture);
        let backend = &under_test.backend;

        fs::write(under_test.path("untracked.txt"), "junk").unwrap();
        fs::create_dir_all(under_test.path("build/out")).unwrap();
        fs::write(under_test.path("build/out/artifact.bin"), "junk").unwrap();

        backend.clean_all_unversioned_files().unwrap();
        assert_eq!(entries(&under_test.working_dir), vec![".git", "a.txt", "b.txt"], "{}", kind);

        backend.gc().unwrap();
        assert_eq!(backend.commit_count().unwrap(), 1);
    }
}

#[test]
fn test_checkout_remote_branch_to_local() {
    let (fixture, ids) = RepositoryFixture::history();

    for kind in ALL_BACKENDS {
        let config = RepositoryConfig::new(fixture.url())
            .with_branch("feature")
            .with_recursive_submodule_update(false);
        let under_test = BackendUnderTest::new(kind, config);
        let backend = &under_test.backend;

        backend.clone_repository().unwrap();
        backend.checkout_remote_branch_to_local().unwrap();

        assert_eq!(backend.current_branch().unwrap(), "feature", "{}", kind);
        assert_eq!(backend.current_revision().unwrap(), Some(ids.feature.clone()));
        assert!(under_test.path("feature.txt").exists());
    }
}

#[test]
fn test_library_shallow_clone_is_full() {
    let (fixture, ids) = RepositoryFixture::history();
    let config = RepositoryConfig::new(fixture.url())
        .with_shallow_clone(true)
        .with_recursive_submodule_update(false);
    let under_test = BackendUnderTest::new(BackendKind::Library, config);

    under_test.backend.clone_repository().unwrap();

    assert!(under_test
        .stdout
        .lines()
        .contains(&SHALLOW_CLONE_UNSUPPORTED.to_string()));
    assert_eq!(under_test.backend.commit_count().unwrap(), ids.newest_first().len());
}

#[test]
fn test_command_line_shallow_clone() {
    let (fixture, ids) = RepositoryFixture::history();
    let config = RepositoryConfig::new(fixture.url())
        .with_shallow_clone(true)
        .with_recursive_submodule_update(false);
    let under_test = BackendUnderTest::new(BackendKind::CommandLine, config);

    under_test.backend.clone_repository().unwrap();

    assert_eq!(under_test.backend.commit_count().unwrap(), 1);
    assert_eq!(under_test.backend.current_revision().unwrap(), Some(ids.merge));
}

#[test]
fn test_failed_clone_removes_working_dir() {
    for kind in ALL_BACKENDS {
        let under_test = BackendUnderTest::for_url(kind, "file:///non/existent/upstream");

        assert!(under_test.backend.clone_repository().is_err(), "{}", kind);
        assert!(!under_test.working_dir.exists(), "{}", kind);
    }
}

#[test]
fn test_check_connection() {
    let fixture = RepositoryFixture::single_commit();

    for kind in ALL_BACKENDS {
        let reachable = BackendUnderTest::for_url(kind, &fixture.url());
        assert!(reachable.backend.check_connection().is_ok(), "{}", kind);

        let unreachable = BackendUnderTest::for_url(kind, "file:///non/existent/upstream");
        assert!(unreachable.backend.check_connection().is_err(), "{}", kind);
    }
}
