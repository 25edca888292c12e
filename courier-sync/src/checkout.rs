//! Local checkout gateway: a [`GitGateway`] over plain directories.
//!
//! ## Layout
//!
//! ```text
//! <root>/<owner>/<repo>/
//!   <tracked files>
//!   .courier/HEAD   (current commit id)
//!   .courier/log    (one line per commit: id, parent, timestamp, subject)
//! ```
//!
//! ## `commit_files` protocol
//!
//! 1. Reject paths that are absolute or contain `..`.
//! 2. SHA-256 each file's content and compare with what is on disk; a deletion
//!    counts as a change when the file exists.
//! 3. Nothing changed and HEAD exists → return HEAD.
//! 4. Caller gone → write nothing and fail with a timeout.
//! 5. Write changed files to `<path>.courier.tmp`, then rename; remove deletions.
//! 6. Commit id = SHA-256 over the parent id, the sorted `(path, content)` list
//!    and the sorted deletions.
//! 7. Write HEAD atomically and append to the log.
//!
//! Every call holds a per-repository lock for as long as its blocking work
//! runs, including after the calling future is dropped. A read issued after a
//! timed-out commit therefore sees the checkout before or after that commit,
//! never in between.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use courier_core::error::GitError;
use courier_core::ports::GitGateway;
use courier_core::types::{CommitId, FileUpdate, GitRepo};

use crate::error::{io_err, CheckoutError};

pub struct LocalCheckoutGateway {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
    commit_delay: Mutex<Option<Duration>>,
}

impl LocalCheckoutGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
            commit_delay: Mutex::new(None),
        }
    }

    /// `<root>/<owner>/<repo>/`
    pub fn repo_dir(&self, repo: &GitRepo) -> PathBuf {
        self.root.join(&repo.owner).join(&repo.repo)
    }

    /// Current HEAD of the checkout, if any commit was made.
    pub fn head(&self, repo: &GitRepo) -> Result<Option<CommitId>, CheckoutError> {
        read_head(&self.repo_dir(repo))
    }

    /// Block for `delay` inside each commit, before anything is written.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        *self.commit_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    async fn lock_repo(&self, dir: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(dir.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Flags the commit as cancelled when the calling future is dropped early.
struct CancelOnDrop(Option<Arc<AtomicBool>>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(flag) = &self.0 {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl GitGateway for LocalCheckoutGateway {
    async fn fetch_file(&self, repo: &GitRepo, path: &str) -> Result<Option<String>, GitError> {
        let dir = self.repo_dir(repo);
        let path = path.to_string();
        let guard = self.lock_repo(&dir).await;
        run_blocking(move || {
            let _guard = guard;
            read_tracked(&dir, &path)
        })
        .await
    }

    async fn commit_files(
        &self,
        repo: &GitRepo,
        target_path: &str,
        files: &[FileUpdate],
        deletions: &[String],
        message: &str,
    ) -> Result<CommitId, GitError> {
        let dir = self.repo_dir(repo);
        let files = files.to_vec();
        let deletions = deletions.to_vec();
        let message = message.to_string();
        let delay = *self.commit_delay.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(
            repo = %repo.full_name(),
            target_path,
            files = files.len(),
            deletions = deletions.len(),
            "local commit"
        );

        let cancelled = Arc::new(AtomicBool::new(false));
        let on_drop = CancelOnDrop(Some(Arc::clone(&cancelled)));
        let guard = self.lock_repo(&dir).await;
        let result = run_blocking(move || {
            let _guard = guard;
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            commit(&dir, &files, &deletions, &message, &cancelled)
        })
        .await;
        on_drop.disarm();
        result
    }
}

// ---------------------------------------------------------------------------
// Blocking implementation
// ---------------------------------------------------------------------------

async fn run_blocking<T, F>(work: F) -> Result<T, GitError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CheckoutError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(to_git_error),
        Err(err) => Err(GitError::network(format!("checkout task failed: {err}"))),
    }
}

fn to_git_error(err: CheckoutError) -> GitError {
    match &err {
        CheckoutError::Io { source, .. } if source.kind() == ErrorKind::PermissionDenied => {
            GitError::auth(err.to_string())
        }
        CheckoutError::PathEscape(_) => GitError::conflict(err.to_string()),
        CheckoutError::Cancelled => GitError::timeout(err.to_string()),
        CheckoutError::Io { .. } => GitError::network(err.to_string()),
    }
}

fn tracked_path(dir: &Path, rel: &str) -> Result<PathBuf, CheckoutError> {
    let rel_path = Path::new(rel);
    let safe = !rel.is_empty()
        && rel_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(CheckoutError::PathEscape(rel.to_string()));
    }
    Ok(dir.join(rel_path))
}

fn read_tracked(dir: &Path, rel: &str) -> Result<Option<String>, CheckoutError> {
    let path = tracked_path(dir, rel)?;
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn read_head(dir: &Path) -> Result<Option<CommitId>, CheckoutError> {
    let path = dir.join(".courier").join("HEAD");
    match std::fs::read_to_string(&path) {
        Ok(id) => Ok(Some(CommitId::from(id.trim()))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

fn commit_id(parent: Option<&CommitId>, files: &[FileUpdate], deletions: &[String]) -> CommitId {
    let mut sorted: Vec<&FileUpdate> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    let mut deleted: Vec<&String> = deletions.iter().collect();
    deleted.sort();
    let mut h = Sha256::new();
    h.update(parent.map(CommitId::as_str).unwrap_or("").as_bytes());
    h.update([0]);
    for file in sorted {
        h.update(file.path.as_bytes());
        h.update([0]);
        h.update(file.content.as_bytes());
        h.update([0]);
    }
    for path in deleted {
        h.update(b"-");
        h.update(path.as_bytes());
        h.update([0]);
    }
    CommitId::from(hex::encode(h.finalize()))
}

fn write_atomic(path: &Path, content: &str) -> Result<(), CheckoutError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.courier.tmp", path.display()));
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn remove_tracked(path: &Path) -> Result<bool, CheckoutError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

fn commit(
    dir: &Path,
    files: &[FileUpdate],
    deletions: &[String],
    message: &str,
    cancelled: &AtomicBool,
) -> Result<CommitId, CheckoutError> {
    let mut targets = Vec::with_capacity(files.len());
    for file in files {
        targets.push((tracked_path(dir, &file.path)?, file));
    }
    let mut removals = Vec::with_capacity(deletions.len());
    for rel in deletions {
        removals.push(tracked_path(dir, rel)?);
    }

    let mut changed = Vec::new();
    for (path, file) in &targets {
        let current = read_tracked(dir, &file.path)?;
        let unchanged = current
            .map(|c| sha256_hex(c.as_bytes()) == sha256_hex(file.content.as_bytes()))
            .unwrap_or(false);
        if !unchanged {
            changed.push((path, *file));
        }
    }
    let existing: Vec<&PathBuf> = removals.iter().filter(|p| p.is_file()).collect();

    let parent = read_head(dir)?;
    if changed.is_empty() && existing.is_empty() {
        if let Some(head) = &parent {
            tracing::debug!(head = %head, "no changes, keeping HEAD");
            return Ok(head.clone());
        }
    }

    if cancelled.load(Ordering::SeqCst) {
        tracing::warn!(dir = %dir.display(), "caller gone, commit abandoned");
        return Err(CheckoutError::Cancelled);
    }

    for (path, file) in &changed {
        write_atomic(path, &file.content)?;
        tracing::info!("wrote: {}", path.display());
    }
    for path in existing {
        if remove_tracked(path)? {
            tracing::info!("deleted: {}", path.display());
        }
    }

    let id = commit_id(parent.as_ref(), files, deletions);
    let meta = dir.join(".courier");
    write_atomic(&meta.join("HEAD"), id.as_str())?;

    let log_path = meta.join("log");
    let subject = message.lines().next().unwrap_or("");
    let line = format!(
        "{} {} {} {}\n",
        id,
        parent.as_ref().map(CommitId::as_str).unwrap_or("-"),
        Utc::now().to_rfc3339(),
        subject
    );
    let mut log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| io_err(&log_path, e))?;
    log.write_all(line.as_bytes()).map_err(|e| io_err(&log_path, e))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::error::GitErrorKind;
    use courier_core::types::{GitRepoId, OrganizationId};
    use tempfile::TempDir;

    fn repo() -> GitRepo {
        GitRepo {
            id: GitRepoId::from("acme-api"),
            organization_id: OrganizationId::from("acme"),
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
        }
    }

    fn update(path: &str, content: &str) -> FileUpdate {
        FileUpdate {
            path: path.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn commit_writes_files_and_head() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        let id = gateway
            .commit_files(&repo(), "/", &[update("backend/AGENTS.md", "hello")], &[], "msg")
            .await
            .unwrap();

        let dir = gateway.repo_dir(&repo());
        assert_eq!(std::fs::read_to_string(dir.join("backend/AGENTS.md")).unwrap(), "hello");
        assert_eq!(gateway.head(&repo()).unwrap(), Some(id.clone()));
        assert_eq!(id.as_str().len(), 64);
        assert!(!dir.join("backend/AGENTS.md.courier.tmp").exists());
        assert_eq!(
            gateway.fetch_file(&repo(), "backend/AGENTS.md").await.unwrap().as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn unchanged_commit_returns_head() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        let files = [update("AGENTS.md", "x")];
        let first = gateway.commit_files(&repo(), "/", &files, &[], "one").await.unwrap();
        let second = gateway.commit_files(&repo(), "/", &files, &[], "two").await.unwrap();
        assert_eq!(first, second);

        let log = std::fs::read_to_string(gateway.repo_dir(&repo()).join(".courier/log")).unwrap();
        assert_eq!(log.lines().count(), 1);
    }

    #[tokio::test]
    async fn commit_ids_chain_on_parent() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        let first = gateway
            .commit_files(&repo(), "/", &[update("AGENTS.md", "a")], &[], "one")
            .await
            .unwrap();
        let second = gateway
            .commit_files(&repo(), "/", &[update("AGENTS.md", "b")], &[], "two")
            .await
            .unwrap();
        assert_ne!(first, second);
        let log = std::fs::read_to_string(gateway.repo_dir(&repo()).join(".courier/log")).unwrap();
        let last = log.lines().last().unwrap();
        assert!(last.starts_with(&format!("{} {} ", second, first)));
        assert!(last.ends_with(" two"));
    }

    #[tokio::test]
    async fn missing_file_fetches_none() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        assert_eq!(gateway.fetch_file(&repo(), "CLAUDE.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        let err = gateway
            .commit_files(&repo(), "/", &[update("../outside.md", "x")], &[], "msg")
            .await
            .unwrap_err();
        assert_eq!(err.kind, GitErrorKind::Conflict);
        assert!(!root.path().join("acme/outside.md").exists());
    }

    #[tokio::test]
    async fn deletions_remove_files_and_count_as_change() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        let first = gateway
            .commit_files(&repo(), "/", &[update(".packmind/commands/foo.md", "foo")], &[], "one")
            .await
            .unwrap();

        let gone = vec![".packmind/commands/foo.md".to_string()];
        let second = gateway.commit_files(&repo(), "/", &[], &gone, "two").await.unwrap();
        assert_ne!(first, second);
        assert!(!gateway.repo_dir(&repo()).join(".packmind/commands/foo.md").exists());

        let third = gateway.commit_files(&repo(), "/", &[], &gone, "three").await.unwrap();
        assert_eq!(second, third);
    }

    #[tokio::test]
    async fn escaping_deletions_are_rejected() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        let err = gateway
            .commit_files(&repo(), "/", &[], &["../../etc/passwd".to_string()], "msg")
            .await
            .unwrap_err();
        assert_eq!(err.kind, GitErrorKind::Conflict);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn abandoned_commit_writes_nothing_and_holds_the_repo() {
        let root = TempDir::new().unwrap();
        let gateway = LocalCheckoutGateway::new(root.path());
        gateway.set_commit_delay(Some(Duration::from_millis(300)));

        let attempt = tokio::time::timeout(
            Duration::from_millis(50),
            gateway.commit_files(&repo(), "/", &[update("AGENTS.md", "late")], &[], "late"),
        )
        .await;
        assert!(attempt.is_err());

        // Waits for the abandoned commit to finish before reading.
        let started = std::time::Instant::now();
        assert_eq!(gateway.fetch_file(&repo(), "AGENTS.md").await.unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(gateway.head(&repo()).unwrap(), None);
    }
}
