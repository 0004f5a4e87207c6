// ABOUTME: Best-effort git metadata read for a snapshot: HEAD commit, branch, and a tag
// ABOUTME: pointing at HEAD if one exists. Never fatal; a non-repo directory yields defaults.
use codegraph_core::GitMetadata;
use std::path::Path;

pub fn read_metadata(root: &Path) -> GitMetadata {
    let repo = match git2::Repository::discover(root) {
        Ok(repo) => repo,
        Err(_) => return GitMetadata::default(),
    };

    let head = repo.head().ok();
    let commit = head
        .as_ref()
        .and_then(|h| h.peel_to_commit().ok())
        .map(|c| c.id().to_string());
    let branch = head.as_ref().and_then(|h| h.shorthand()).map(|s| s.to_string());
    let tag = commit.as_ref().and_then(|target| tag_pointing_at(&repo, target));

    GitMetadata { commit, branch, tag }
}

fn tag_pointing_at(repo: &git2::Repository, commit_id: &str) -> Option<String> {
    let tag_names = repo.tag_names(None).ok()?;
    for name in tag_names.iter().flatten() {
        let Ok(obj) = repo.revparse_single(name) else { continue };
        let Ok(commit) = obj.peel_to_commit() else { continue };
        if commit.id().to_string() == commit_id {
            return Some(name.to_string());
        }
    }
    None
}
