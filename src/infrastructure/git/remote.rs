use crate::common::output::OutputSinks;
use crate::domain::entities::repository_config::RepositoryConfig;
use git2::{
    Cred, CredentialType, Direction, ErrorCode, FetchOptions, FetchPrune, Remote, RemoteCallbacks,
    Repository as Git2Repository,
};
use std::fmt;

/// Name of the only remote the poller works with
pub const ORIGIN: &str = "origin";

/// Credentials handed to libgit2.
///
/// Present only for http(s) URLs configured with both a username and a
/// password; every other remote gets no credential callback at all.
#[derive(Clone, Default)]
pub struct RemoteAuth {
    credentials: Option<(String, String)>,
}

impl RemoteAuth {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        let credentials = if config.is_remote_url() && config.has_credentials() {
            Some((
                config.username().unwrap_or_default().to_string(),
                config.password().unwrap_or_default().to_string(),
            ))
        } else {
            None
        };
        Self { credentials }
    }

    /// Callbacks forwarding remote progress to the stdout sink
    pub fn callbacks<'a>(&'a self, sinks: &'a OutputSinks) -> RemoteCallbacks<'a> {
        let mut callbacks = RemoteCallbacks::new();

        if let Some((username, password)) = &self.credentials {
            // libgit2 asks again after a rejected attempt; answer only once
            let mut attempts = 0;
            callbacks.credentials(move |_url, _username_from_url, allowed_types| {
                attempts += 1;
                if attempts > 1 {
                    return Err(git2::Error::from_str("authentication rejected by the remote"));
                }
                if !allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                    return Err(git2::Error::from_str("remote does not accept username/password"));
                }
                Cred::userpass_plaintext(username, password)
            });
        }

        callbacks.sideband_progress(move |data| {
            for line in data.split(|b| *b == b'\n' || *b == b'\r') {
                let line = String::from_utf8_lossy(line);
                let line = line.trim();
                if !line.is_empty() {
                    sinks.out(line);
                }
            }
            true
        });

        callbacks
    }

    pub fn fetch_options<'a>(&'a self, sinks: &'a OutputSinks) -> FetchOptions<'a> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.callbacks(sinks));
        options
    }
}

impl fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAuth")
            .field("username", &self.credentials.as_ref().map(|(username, _)| username))
            .finish_non_exhaustive()
    }
}

/// List the heads of `url` without touching any local repository.
///
/// Returns the number of advertised refs.
pub fn list_remote_heads(url: &str, auth: &RemoteAuth, sinks: &OutputSinks) -> Result<usize, git2::Error> {
    let mut remote = Remote::create_detached(url)?;
    let mut connection = remote.connect_auth(Direction::Fetch, Some(auth.callbacks(sinks)), None)?;
    let heads = connection.remote().list()?.len();
    Ok(heads)
}

/// Fetch `origin`, pruning refs that are gone upstream.
///
/// An empty `ref_spec` fetches the configured refspecs. Submodules are not
/// touched.
pub fn fetch_origin(
    repo: &Git2Repository,
    ref_spec: &str,
    auth: &RemoteAuth,
    sinks: &OutputSinks,
) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote(ORIGIN)?;
    let mut options = auth.fetch_options(sinks);
    options.prune(FetchPrune::On);

    let ref_spec = ref_spec.trim();
    let refspecs: Vec<&str> = if ref_spec.is_empty() { Vec::new() } else { vec![ref_spec] };

    remote.fetch(&refspecs, Some(&mut options), None)
}

/// URL of `origin`, `None` when the remote does not exist
pub fn origin_url(repo: &Git2Repository) -> Result<Option<String>, git2::Error> {
    match repo.find_remote(ORIGIN) {
        Ok(remote) => Ok(remote.url().map(str::to_string)),
        Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => Ok(None),
        Err(e) => Err(e),
    }
}
