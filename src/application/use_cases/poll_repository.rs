use crate::common::error::ErrorKind;
use crate::common::result::{GitResult, ResultExt};
use crate::domain::entities::revision::Revision;
use crate::infrastructure::scm::scm_interface::GitOperations;
use serde::Serialize;
use std::fs;

/// 作業ディレクトリの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingCopyState {
    /// クローンが必要
    Absent,
    /// 設定と同じ origin を持つ作業コピーがある
    Present,
}

/// `clone_or_fetch` で実際に行った処理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollOutcome {
    Cloned,
    Fetched,
}

/// 1回のポーリング結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResult {
    pub outcome: PollOutcome,
    /// 新しい順
    pub revisions: Vec<Revision>,
}

/// バックエンドに依存しないポーリング処理
///
/// 作業コピーがなければクローンし、あればフェッチしてブランチ先端に合わせる。
/// 同じ作業ディレクトリに対する呼び出しを並行させてはならない。
pub struct GitPoller<B: GitOperations> {
    backend: B,
}

impl<B: GitOperations> GitPoller<B> {
    /// 新しいGitPollerインスタンスを作成
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// 作業ディレクトリの状態を判定する
    ///
    /// `.git` がない、または origin の URL が設定と異なる場合はディレクトリを
    /// 削除して `Absent` を返す。
    pub fn working_copy_state(&self) -> GitResult<WorkingCopyState> {
        let working_dir = self.backend.working_dir();
        let config = self.backend.config();

        if working_dir.join(".git").exists() {
            match self.backend.working_repository_url() {
                Ok(Some(url)) if url == config.url() || url == config.effective_url() => {
                    return Ok(WorkingCopyState::Present);
                }
                Ok(_) => tracing::info!(
                    "Working copy at {} does not track {}; recloning",
                    working_dir.display(),
                    config.redacted_url()
                ),
                Err(e) => tracing::warn!("Could not read the origin of {}: {}", working_dir.display(), e),
            }
        }

        if working_dir.exists() {
            tracing::debug!("Removing {}", working_dir.display());
            fs::remove_dir_all(working_dir)
                .or_git_err(ErrorKind::Clone, format!("could not remove {}", working_dir.display()))?;
        }
        Ok(WorkingCopyState::Absent)
    }

    /// 必要ならクローンし、そうでなければフェッチして作業コピーを収束させる
    pub fn clone_or_fetch(&self, ref_spec: &str) -> GitResult<PollOutcome> {
        match self.working_copy_state()? {
            WorkingCopyState::Absent => {
                self.backend.clone_repository()?;
                Ok(PollOutcome::Cloned)
            }
            WorkingCopyState::Present => {
                self.fetch_and_converge(ref_spec)?;
                Ok(PollOutcome::Fetched)
            }
        }
    }

    fn fetch_and_converge(&self, ref_spec: &str) -> GitResult<()> {
        let config = self.backend.config();
        let remote_branch = format!("origin/{}", config.effective_branch());

        self.backend.fetch(ref_spec)?;

        // no-checkout の作業コピーはワークツリーを展開しないまま HEAD だけ動かす
        if self.backend.capabilities().should_reset_after_fetch {
            self.backend.reset_hard(&remote_branch)?;
        } else {
            self.backend.reset_soft(&remote_branch)?;
        }

        if config.recursive_submodule_update() {
            self.backend.submodule_init()?;
            self.backend.submodule_sync()?;
            self.backend.submodule_update()?;
        }
        Ok(())
    }

    /// 最新のリビジョン（パス指定があればそれに触れたもの）
    pub fn latest_modification(&self, sub_paths: &[String]) -> GitResult<Option<Revision>> {
        self.clone_or_fetch("")?;
        self.backend.latest_revision(sub_paths)
    }

    /// `previous` より新しいリビジョン
    pub fn modifications_since(&self, previous: &str, sub_paths: &[String]) -> GitResult<Vec<Revision>> {
        self.clone_or_fetch("")?;
        self.backend.revisions_since(previous, sub_paths)
    }

    /// ポーリングを1回実行する
    ///
    /// `last_seen` がなければ最新の1件、あればそれ以降のすべてを返す。
    pub fn poll(&self, last_seen: Option<&str>, sub_paths: &[String]) -> GitResult<PollResult> {
        let outcome = self.clone_or_fetch("")?;
        let revisions = match last_seen.map(str::trim).filter(|rev| !rev.is_empty()) {
            None => self.backend.latest_revision(sub_paths)?.into_iter().collect(),
            Some(previous) => self.backend.revisions_since(previous, sub_paths)?,
        };
        tracing::info!("Poll {:?}: {} new revisions", outcome, revisions.len());
        Ok(PollResult { outcome, revisions })
    }
}
