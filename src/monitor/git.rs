use std::path::Path;

/// Derive the checked-out branch for a working directory by reading
/// `.git/HEAD` directly, walking up parent directories and following the
/// `gitdir:` indirection linked worktrees use. No subprocess is spawned.
pub fn branch_for_path(path: &Path) -> Option<String> {
    for dir in path.ancestors() {
        let git = dir.join(".git");
        if git.is_dir() {
            return read_head(&git.join("HEAD"));
        }
        if git.is_file() {
            let content = std::fs::read_to_string(&git).ok()?;
            let gitdir = content.trim().strip_prefix("gitdir:")?.trim();
            let gitdir = if Path::new(gitdir).is_absolute() {
                Path::new(gitdir).to_path_buf()
            } else {
                dir.join(gitdir)
            };
            return read_head(&gitdir.join("HEAD"));
        }
    }
    None
}

fn read_head(head: &Path) -> Option<String> {
    let content = std::fs::read_to_string(head).ok()?;
    let content = content.trim();
    if let Some(reference) = content.strip_prefix("ref:") {
        let reference = reference.trim();
        return Some(
            reference
                .strip_prefix("refs/heads/")
                .unwrap_or(reference)
                .to_string(),
        );
    }
    // Detached HEAD: show a short hash.
    if content.len() >= 8 {
        Some(content[..8].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_from_head() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::write(repo.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();

        assert_eq!(branch_for_path(&repo).as_deref(), Some("main"));
        // Subdirectories resolve through the parent walk.
        let sub = repo.join("src/deep");
        std::fs::create_dir_all(&sub).unwrap();
        assert_eq!(branch_for_path(&sub).as_deref(), Some("main"));
    }

    #[test]
    fn test_branch_from_linked_worktree() {
        let tmp = tempfile::tempdir().unwrap();
        let gitdir = tmp.path().join("main/.git/worktrees/wt");
        std::fs::create_dir_all(&gitdir).unwrap();
        std::fs::write(gitdir.join("HEAD"), "ref: refs/heads/feature/x\n").unwrap();

        let wt = tmp.path().join("wt");
        std::fs::create_dir_all(&wt).unwrap();
        std::fs::write(
            wt.join(".git"),
            format!("gitdir: {}\n", gitdir.display()),
        )
        .unwrap();

        assert_eq!(branch_for_path(&wt).as_deref(), Some("feature/x"));
    }

    #[test]
    fn test_detached_head_short_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::write(
            repo.join(".git/HEAD"),
            "0123456789abcdef0123456789abcdef01234567\n",
        )
        .unwrap();

        assert_eq!(branch_for_path(&repo).as_deref(), Some("01234567"));
    }

    #[test]
    fn test_no_repo() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(branch_for_path(tmp.path()), None);
    }
}
