//! Update probe adapter used by watch mode.

use anyhow::Result;

use crate::io::git::Git;

/// Reports a newer revision the running checkout does not have yet.
pub trait UpdateProbe {
    /// The pending revision, or `None` when the checkout is current or ahead.
    fn pending_revision(&self) -> Result<Option<String>>;
}

/// Checks whether `HEAD` on a git remote is missing from local history.
pub struct GitProbe {
    git: Git,
    remote: String,
}

impl GitProbe {
    pub fn new(git: Git, remote: impl Into<String>) -> Self {
        Self {
            git,
            remote: remote.into(),
        }
    }
}

impl UpdateProbe for GitProbe {
    fn pending_revision(&self) -> Result<Option<String>> {
        self.git.pending_update(&self.remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn clone_at_remote_tip_has_no_update() {
        let repo = TestRepo::new().expect("repo");
        let probe = GitProbe::new(Git::new(repo.workdir()), "origin");
        assert_eq!(probe.pending_revision().expect("check"), None);
    }

    #[test]
    fn remote_commit_is_reported_as_pending() {
        let repo = TestRepo::new().expect("repo");
        repo.push_upstream_commit("CHANGELOG.md", "v2\n")
            .expect("push upstream");
        let probe = GitProbe::new(Git::new(repo.workdir()), "origin");
        assert!(probe.pending_revision().expect("check").is_some());
    }

    #[test]
    fn local_commit_ahead_is_not_an_update() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_local("NOTES.md", "operator notes\n")
            .expect("local commit");
        let probe = GitProbe::new(Git::new(repo.workdir()), "origin");
        assert_eq!(probe.pending_revision().expect("check"), None);
    }

    #[test]
    fn unknown_remote_is_an_error() {
        let repo = TestRepo::new().expect("repo");
        let probe = GitProbe::new(Git::new(repo.workdir()), "no-such-remote");
        assert!(probe.pending_revision().is_err());
    }
}
