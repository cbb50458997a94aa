use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use tokio::sync::Mutex;

use crate::error::SyncError;
use crate::format;

/// Hard ceiling on the size of any single write.
pub const MAX_CONTENT_BYTES: usize = 50 * 1024 * 1024;

/// Relative prefixes that are never created, updated, or deleted.
const BLOCKED_PREFIXES: &[&str] = &[".git", ".vscode", "node_modules"];

/// Directories the suggestion walker does not descend into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", "build"];

const MAX_SUGGESTIONS: usize = 10;

/// The one directory tree file operations are allowed to mutate. Every
/// operation takes a relative path and validates it against the root before
/// touching the disk; destructive operations go through a backup so a failed
/// write or delete leaves the original file intact.
pub struct Workspace {
    root: PathBuf,
    // One lock per normalized relative path, so overlapping operations on
    // the same file serialize their backup/write/restore steps instead of
    // interleaving them.
    path_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    #[cfg(test)]
    fail_next_write: AtomicBool,
}

impl Workspace {
    pub fn open(root: &Path) -> Result<Self, SyncError> {
        let root = root.canonicalize().map_err(|e| {
            SyncError::io(
                format!("failed to resolve workspace root '{}'", root.display()),
                e,
            )
        })?;
        if !root.is_dir() {
            return Err(SyncError::NotFound { path: root });
        }
        Ok(Self {
            root,
            path_locks: Mutex::new(HashMap::new()),
            #[cfg(test)]
            fail_next_write: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` (normalized) to a new file, creating any missing
    /// parent directories.
    pub async fn create_file(&self, relative: &str, content: &str) -> Result<String, SyncError> {
        let (full, clean) = self.resolve(relative)?;
        check_size(content)?;
        check_system_path(&clean)?;

        let lock = self.lock_path(&clean).await;
        let _guard = lock.lock().await;
        self.write_new(&full, content)?;
        Ok(clean)
    }

    /// Replaces a file's content through a backup, or creates the file if it
    /// does not exist yet. On a write failure the original content is
    /// restored from the backup before the error propagates.
    pub async fn update_file(&self, relative: &str, content: &str) -> Result<String, SyncError> {
        let (full, clean) = self.resolve(relative)?;
        check_size(content)?;
        check_system_path(&clean)?;

        let lock = self.lock_path(&clean).await;
        let _guard = lock.lock().await;

        if !full.exists() {
            self.write_new(&full, content)?;
            return Ok(clean);
        }
        self.check_writable(&full)?;

        let backup = backup_path(&full);
        fs::copy(&full, &backup).map_err(|e| {
            SyncError::io(format!("failed to back up '{}'", full.display()), e)
        })?;

        match self.write_contents(&full, content) {
            Ok(()) => {
                let _ = fs::remove_file(&backup);
                Ok(clean)
            }
            Err(write_err) => {
                if let Err(restore_err) = fs::copy(&backup, &full) {
                    return Err(SyncError::io(
                        format!(
                            "failed to restore '{}' from its backup after a write failure",
                            full.display()
                        ),
                        restore_err,
                    ));
                }
                let _ = fs::remove_file(&backup);
                Err(write_err)
            }
        }
    }

    /// Deletes a file through a backup; a failed delete restores the file.
    pub async fn delete_file(&self, relative: &str) -> Result<String, SyncError> {
        let (full, clean) = self.resolve(relative)?;
        check_system_path(&clean)?;

        let lock = self.lock_path(&clean).await;
        let _guard = lock.lock().await;

        if !full.exists() {
            return Err(SyncError::NotFound {
                path: PathBuf::from(clean),
            });
        }
        self.check_writable(&full)?;

        let backup = backup_path(&full);
        fs::copy(&full, &backup).map_err(|e| {
            SyncError::io(format!("failed to back up '{}'", full.display()), e)
        })?;

        match fs::remove_file(&full) {
            Ok(()) => {
                let _ = fs::remove_file(&backup);
                Ok(clean)
            }
            Err(remove_err) => {
                if let Err(restore_err) = fs::copy(&backup, &full) {
                    return Err(SyncError::io(
                        format!(
                            "failed to restore '{}' from its backup after a delete failure",
                            full.display()
                        ),
                        restore_err,
                    ));
                }
                let _ = fs::remove_file(&backup);
                Err(SyncError::io(
                    format!("failed to delete '{}'", full.display()),
                    remove_err,
                ))
            }
        }
    }

    /// Writes a code block to `relative` when given, otherwise to a fresh
    /// file named from a timestamp and a guessed extension.
    pub async fn apply_code_block(
        &self,
        code: &str,
        relative: Option<&str>,
    ) -> Result<String, SyncError> {
        if code.trim().is_empty() {
            return Err(SyncError::EmptyContent);
        }
        match relative {
            Some(path) => self.update_file(path, code).await,
            None => {
                let name = format!(
                    "generated-{}.{}",
                    Local::now().format("%Y%m%d-%H%M%S"),
                    guess_extension(code)
                );
                self.create_file(&name, code).await
            }
        }
    }

    pub fn read_file(&self, relative: &str) -> Result<String, SyncError> {
        let (full, clean) = self.resolve(relative)?;
        if !full.exists() {
            return Err(SyncError::NotFound {
                path: PathBuf::from(clean),
            });
        }
        fs::read_to_string(&full)
            .map_err(|e| SyncError::io(format!("failed to read '{}'", full.display()), e))
    }

    /// Relative paths of all visible files under the root, sorted. Hidden
    /// entries and build/dependency directories are skipped. Never fails:
    /// unreadable directories are silently left out.
    pub fn list_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files);
        files.sort();
        files
    }

    /// Up to ten paths matching `query`, exact matches first, then prefix
    /// matches on the path or filename, then the rest, ties broken
    /// alphabetically. A blank query returns nothing.
    pub fn file_suggestions(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<String> = self
            .list_files()
            .into_iter()
            .filter(|path| path.to_lowercase().contains(&query))
            .collect();
        matches.sort_by(|a, b| {
            suggestion_rank(a, &query)
                .cmp(&suggestion_rank(b, &query))
                .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        });
        matches.truncate(MAX_SUGGESTIONS);
        matches
    }

    /// Makes the next `write_contents` call fail, for exercising rollback.
    #[cfg(test)]
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Validates a caller-supplied relative path and returns the absolute
    /// path plus its cleaned relative form.
    ///
    /// The escape check runs on the raw path before sanitization: stripping
    /// leading `../` first would quietly turn a traversal attempt into a
    /// workspace-local write, and the caller should hear about the attempt
    /// instead.
    fn resolve(&self, relative: &str) -> Result<(PathBuf, String), SyncError> {
        if relative.trim().is_empty() {
            return Err(SyncError::InvalidPath);
        }

        let raw = lexical_clean(&self.root.join(relative.trim()));
        if !raw.starts_with(&self.root) {
            return Err(SyncError::OutsideWorkspace {
                path: relative.to_string(),
            });
        }

        let sanitized = sanitize(relative);
        if sanitized.is_empty() {
            return Err(SyncError::InvalidPath);
        }

        let full = lexical_clean(&self.root.join(&sanitized));
        let clean = match full.strip_prefix(&self.root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().replace('\\', "/"),
            Ok(_) => return Err(SyncError::InvalidPath),
            Err(_) => {
                return Err(SyncError::OutsideWorkspace {
                    path: relative.to_string(),
                })
            }
        };
        Ok((full, clean))
    }

    async fn lock_path(&self, clean: &str) -> Arc<Mutex<()>> {
        let mut locks = self.path_locks.lock().await;
        locks
            .entry(clean.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn write_new(&self, full: &Path, content: &str) -> Result<(), SyncError> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::io(
                    format!("failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
        self.write_contents(full, content)
    }

    fn write_contents(&self, full: &Path, content: &str) -> Result<(), SyncError> {
        #[cfg(test)]
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(SyncError::io(
                format!("failed to write '{}'", full.display()),
                std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            ));
        }

        let normalized = format::to_disk(&format::normalize(content));
        fs::write(full, normalized)
            .map_err(|e| SyncError::io(format!("failed to write '{}'", full.display()), e))
    }

    fn check_writable(&self, full: &Path) -> Result<(), SyncError> {
        let metadata = fs::metadata(full)
            .map_err(|e| SyncError::io(format!("failed to stat '{}'", full.display()), e))?;
        if metadata.permissions().readonly() {
            let display = full
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| full.to_path_buf());
            return Err(SyncError::NotWritable { path: display });
        }
        Ok(())
    }
}

fn check_size(content: &str) -> Result<(), SyncError> {
    if content.len() > MAX_CONTENT_BYTES {
        return Err(SyncError::ContentTooLarge {
            size: content.len(),
            limit: MAX_CONTENT_BYTES,
        });
    }
    Ok(())
}

fn check_system_path(clean: &str) -> Result<(), SyncError> {
    for prefix in BLOCKED_PREFIXES {
        if clean == *prefix || clean.starts_with(&format!("{prefix}/")) {
            return Err(SyncError::SystemFileBlocked {
                path: clean.to_string(),
            });
        }
    }
    Ok(())
}

/// Replaces characters that are invalid in filenames on common platforms
/// and strips any leading parent-directory components.
fn sanitize(relative: &str) -> String {
    let cleaned: String = relative
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let mut rest = cleaned.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("..\\") {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

/// Resolves `.` and `..` components lexically, without touching the disk.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn backup_path(full: &Path) -> PathBuf {
    PathBuf::from(format!("{}.bak", full.display()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            collect_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

fn suggestion_rank(path: &str, query: &str) -> u8 {
    let lower = path.to_lowercase();
    let name = match lower.rsplit('/').next() {
        Some(name) => name,
        None => lower.as_str(),
    };
    if lower == query || name == query {
        0
    } else if lower.starts_with(query) || name.starts_with(query) {
        1
    } else {
        2
    }
}

/// Guesses a file extension from the content of an untagged code block.
/// The rules run in order and the first hit wins; misclassification only
/// affects the default filename, so rough is fine.
fn guess_extension(code: &str) -> &'static str {
    let lower = code.to_lowercase();
    if lower.contains("<!doctype html") {
        "html"
    } else if code.contains("function") || code.contains("const ") || code.contains("let ") {
        "js"
    } else if code.contains("interface") || code.contains("type ") || code.contains("namespace") {
        "ts"
    } else if code.contains("class") && code.contains("public") {
        "java"
    } else if code.contains("#include") {
        "cpp"
    } else {
        "txt"
    }
}
