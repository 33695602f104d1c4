use std::collections::BTreeMap;

/// ブランチ名から最新リビジョンIDへの対応表
pub type BranchRevisionMap = BTreeMap<String, String>;

/// 参照名とリビジョンIDの組から対応表を作る
///
/// 参照名に `pattern` を含むものだけを残し、`pattern` を取り除いた残りを
/// ブランチ名とする。
pub fn build_branch_map<I, N, R>(refs: I, pattern: &str) -> BranchRevisionMap
where
    I: IntoIterator<Item = (N, R)>,
    N: AsRef<str>,
    R: Into<String>,
{
    refs.into_iter()
        .filter(|(name, _)| name.as_ref().contains(pattern))
        .map(|(name, revision)| (name.as_ref().replace(pattern, ""), revision.into()))
        .collect()
}
