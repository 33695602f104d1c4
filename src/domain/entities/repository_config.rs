use crate::domain::value_objects::git_url::{GitUrl, GitUrlError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ブランチ未指定時に使うブランチ名
pub const DEFAULT_BRANCH: &str = "master";

/// ポーリング対象リポジトリの設定
///
/// 構築後は不変。バックエンドは読み取り専用で参照する。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepositoryConfig {
    /// ユーザーが指定したURL（認証情報の埋め込み前）
    url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,

    #[serde(default, skip_serializing)]
    password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,

    /// 深さ1のクローンを試みるか
    #[serde(default)]
    shallow_clone: bool,

    /// ワークツリーを展開せずにクローンするか
    #[serde(default)]
    no_checkout: bool,

    /// サブモジュールを再帰的に更新するか
    #[serde(default = "default_recursive_submodule_update")]
    recursive_submodule_update: bool,
}

fn default_recursive_submodule_update() -> bool {
    true
}

impl RepositoryConfig {
    /// URLのみを指定して設定を作成
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            branch: None,
            shallow_clone: false,
            no_checkout: false,
            recursive_submodule_update: default_recursive_submodule_update(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_shallow_clone(mut self, shallow_clone: bool) -> Self {
        self.shallow_clone = shallow_clone;
        self
    }

    pub fn with_no_checkout(mut self, no_checkout: bool) -> Self {
        self.no_checkout = no_checkout;
        self
    }

    pub fn with_recursive_submodule_update(mut self, recursive: bool) -> Self {
        self.recursive_submodule_update = recursive;
        self
    }

    /// 生のURL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn shallow_clone(&self) -> bool {
        self.shallow_clone
    }

    pub fn no_checkout(&self) -> bool {
        self.no_checkout
    }

    pub fn recursive_submodule_update(&self) -> bool {
        self.recursive_submodule_update
    }

    /// URLを値オブジェクトとして取得
    pub fn git_url(&self) -> Result<GitUrl, GitUrlError> {
        GitUrl::new(&self.url)
    }

    /// 実際に使うブランチ名（空なら `master`）
    pub fn effective_branch(&self) -> &str {
        match self.branch.as_deref().map(str::trim) {
            Some(branch) if !branch.is_empty() => branch,
            _ => DEFAULT_BRANCH,
        }
    }

    /// スキームが http / https かどうか
    pub fn is_remote_url(&self) -> bool {
        self.git_url().map(|url| url.is_remote()).unwrap_or(false)
    }

    /// ユーザー名とパスワードの両方が空でない場合のみ true
    pub fn has_credentials(&self) -> bool {
        let filled = |value: &Option<String>| value.as_deref().map_or(false, |v| !v.is_empty());
        filled(&self.username) && filled(&self.password)
    }

    /// 認証情報を埋め込んだURL
    ///
    /// http(s) かつ認証情報がそろっている場合だけ `user:password@` を
    /// オーソリティに挿入する。それ以外は生のURLをそのまま返す。
    pub fn effective_url(&self) -> String {
        if !(self.is_remote_url() && self.has_credentials()) {
            return self.url.clone();
        }
        match self.git_url() {
            Ok(url) => url.with_credentials(
                self.username.as_deref().unwrap_or_default(),
                self.password.as_deref().unwrap_or_default(),
            ),
            Err(_) => self.url.clone(),
        }
    }

    /// ログ出力用にパスワードを伏せたURL
    pub fn redacted_url(&self) -> String {
        self.git_url()
            .map(|url| url.redacted())
            .unwrap_or_else(|_| self.url.clone())
    }
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("url", &self.redacted_url())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("branch", &self.branch)
            .field("shallow_clone", &self.shallow_clone)
            .field("no_checkout", &self.no_checkout)
            .field("recursive_submodule_update", &self.recursive_submodule_update)
            .finish()
    }
}
