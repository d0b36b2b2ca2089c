use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::error::Error;

/// Clone a repository into `target_dir`, checking out `branch` when given.
///
/// This uses the system git command, which automatically handles:
/// - SSH keys from ~/.ssh/
/// - Git credential helpers
/// - Personal access tokens
/// - Any authentication configured in ~/.gitconfig
pub fn clone_repository(url: &str, branch: Option<&str>, target_dir: &Path) -> Result<(), Error> {
    // git refuses to clone into a non-empty directory
    if target_dir.exists() && !is_empty_dir(target_dir) {
        return Err(Error::GitClone {
            url: url.to_string(),
            branch: branch.map(str::to_string),
            message: format!(
                "{} exists and is not a git working copy",
                target_dir.display()
            ),
            hint: Some("Move or delete that directory, then download again".to_string()),
        });
    }

    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut command = Command::new("git");
    command.arg("clone");
    if let Some(branch) = branch {
        command.args(["--branch", branch]);
    }
    command.arg(url).arg(target_dir);
    debug!("git clone {} -> {}", url, target_dir.display());

    let output = command.output().map_err(|e| Error::GitClone {
        url: url.to_string(),
        branch: branch.map(str::to_string),
        message: e.to_string(),
        hint: Some("Make sure git is installed and on PATH".to_string()),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        let hint = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            Some(
                "For private repos, ensure you have an SSH key added to ssh-agent, \
                 git credentials configured, or a personal access token set up"
                    .to_string(),
            )
        } else if stderr.contains("Remote branch") && stderr.contains("not found") {
            Some("Check the branch in the module address or [Module Branch]".to_string())
        } else {
            None
        };

        return Err(Error::GitClone {
            url: url.to_string(),
            branch: branch.map(str::to_string),
            message: stderr.trim().to_string(),
            hint,
        });
    }

    Ok(())
}

/// Bring an existing working copy up to date with its remote.
///
/// Runs `git pull`, from `origin <branch>` when a branch is known. Local edits
/// to status fields survive as long as they do not conflict upstream.
pub fn update_repository(repo_dir: &Path, branch: Option<&str>) -> Result<(), Error> {
    match branch {
        Some(branch) => run_git(repo_dir, &["pull", "origin", branch])?,
        None => run_git(repo_dir, &["pull"])?,
    };
    Ok(())
}

/// Whether `dir` looks like a git working copy.
pub fn is_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// The `origin` remote of a working copy, `None` when it has none.
pub fn remote_url(repo_dir: &Path) -> Result<Option<String>, Error> {
    if !is_repository(repo_dir) {
        return Ok(None);
    }
    match run_git(repo_dir, &["config", "--get", "remote.origin.url"]) {
        Ok(output) => {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok(Some(url).filter(|u| !u.is_empty()))
        }
        // `git config --get` exits non-zero when the key is unset
        Err(Error::GitCommand { stderr, .. }) if stderr.is_empty() => Ok(None),
        Err(e) => Err(e),
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<Output, Error> {
    let command = args.join(" ");
    debug!("git {} (in {})", command, repo_dir.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: command.clone(),
            path: repo_dir.to_path_buf(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command,
            path: repo_dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}
