//! File change notification
//!
//! A [`ChangeSource`] turns filesystem activity under the root into a stream
//! of [`ChangeEvent`]s. [`ResourceCenter::start_watching`] consumes that
//! stream and re-creates the affected resources off the async workers.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::any::Any;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::ResourceCenter;
use crate::error::{ResourceError, Result};
use crate::logger;

/// A file under the root was created or written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
}

/// Receiving side of a [`ChangeSource`]
pub struct ChangeStream {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    /// Keeps the producer (e.g. the OS watcher) alive as long as the stream
    _guard: Option<Box<dyn Any + Send>>,
}

impl ChangeStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            receiver,
            _guard: None,
        }
    }

    #[must_use]
    pub fn with_guard(mut self, guard: impl Any + Send) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// `None` once the producer is gone
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }
}

/// Something that reports changed files under a directory
pub trait ChangeSource {
    /// Start reporting changes to files under `root` whose extension is in
    /// `extensions` (lower-case, no dot).
    fn watch(&self, root: &Path, extensions: &[String]) -> Result<ChangeStream>;
}

/// Filesystem notifications through the platform's recommended backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl ChangeSource for NotifySource {
    fn watch(&self, root: &Path, extensions: &[String]) -> Result<ChangeStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let extensions: HashSet<String> = extensions.iter().cloned().collect();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    logger::log_warning(&ResourceError::from(e).to_string());
                    return;
                }
            };
            for path in changed_paths(event) {
                if has_extension(&path, &extensions) {
                    let _ = tx.send(ChangeEvent { path });
                }
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(ChangeStream::new(rx).with_guard(watcher))
    }
}

/// Paths whose current content should be reloaded.
///
/// Removals and the source side of a rename are skipped: a deleted file keeps
/// being served from memory. For a rename reported with both ends only the
/// destination counts.
fn changed_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(
            ModifyKind::Data(_)
            | ModifyKind::Any
            | ModifyKind::Other
            | ModifyKind::Name(RenameMode::To),
        ) => event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.into_iter().nth(1).into_iter().collect()
        }
        // backend could not tell which end this is
        EventKind::Modify(ModifyKind::Name(RenameMode::Any | RenameMode::Other)) => {
            event.paths.into_iter().filter(|p| p.is_file()).collect()
        }
        _ => Vec::new(),
    }
}

fn has_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase()))
}

/// Events pushed by hand through a channel
///
/// Used by tests and by anything that learns about changes out of band.
/// The extension filter is not applied; the center filters again anyway.
pub struct ChannelSource {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl ChangeSource for ChannelSource {
    fn watch(&self, _root: &Path, _extensions: &[String]) -> Result<ChangeStream> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(ChangeStream::new)
            .ok_or(ResourceError::SourceInUse)
    }
}

/// Handle to the background reload loop
pub struct ReloadTask {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ReloadTask {
    /// Stop the loop and wait for an in-flight reload to finish
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ReloadTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl ResourceCenter {
    /// Subscribe to `source` and reload changed resources in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_watching(self: &Arc<Self>, source: &dyn ChangeSource) -> Result<ReloadTask> {
        let extensions = self.watched_extensions();
        let mut stream = source.watch(self.root(), &extensions)?;
        logger::log_watch_started(self.root(), &extensions);

        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);
        let center = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = stream.next_event() => {
                        let Some(ChangeEvent { path }) = event else {
                            break;
                        };
                        if !center.is_watched(&path) {
                            continue;
                        }
                        let center = Arc::clone(&center);
                        let reload = tokio::task::spawn_blocking(move || center.reload(&path));
                        if let Err(e) = reload.await {
                            logger::log_error(&format!("Reload task failed: {e}"));
                        }
                    }
                    () = stop.notified() => break,
                }
            }
            logger::log_debug("File watcher stopped");
        });

        Ok(ReloadTask {
            shutdown,
            handle: Some(handle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center::CenterOptions;
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_changed_paths_by_kind() {
        use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

        let created = event(EventKind::Create(CreateKind::File), &["/r/a.css"]);
        assert_eq!(changed_paths(created), vec![PathBuf::from("/r/a.css")]);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a.css"],
        );
        assert_eq!(changed_paths(written), vec![PathBuf::from("/r/a.css")]);

        let chmod = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/r/a.css"],
        );
        assert!(changed_paths(chmod).is_empty());

        let removed = event(EventKind::Remove(RemoveKind::File), &["/r/a.css"]);
        assert!(changed_paths(removed).is_empty());
    }

    #[test]
    fn test_changed_paths_for_renames() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/r/a.css~"],
        );
        assert!(changed_paths(from).is_empty());

        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/r/a.css"],
        );
        assert_eq!(changed_paths(to), vec![PathBuf::from("/r/a.css")]);

        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/a.css.tmp", "/r/a.css"],
        );
        assert_eq!(changed_paths(both), vec![PathBuf::from("/r/a.css")]);

        let dir = TempDir::new().unwrap();
        let kept = dir.path().join("kept.css");
        std::fs::write(&kept, "a{}").unwrap();
        let gone = dir.path().join("gone.css");
        let ambiguous = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &[gone.to_str().unwrap(), kept.to_str().unwrap()],
        );
        assert_eq!(changed_paths(ambiguous), vec![kept]);
    }

    #[test]
    fn test_has_extension() {
        let exts: HashSet<String> = ["css".to_string()].into_iter().collect();
        assert!(has_extension(Path::new("/a/Site.CSS"), &exts));
        assert!(!has_extension(Path::new("/a/site.js"), &exts));
        assert!(!has_extension(Path::new("/a/css"), &exts));
    }

    #[test]
    fn test_channel_source_single_use() {
        let (source, _tx) = ChannelSource::new();
        assert!(source.watch(Path::new("."), &[]).is_ok());
        assert!(matches!(
            source.watch(Path::new("."), &[]),
            Err(ResourceError::SourceInUse)
        ));
    }

    async fn wait_for_hash_change(center: &ResourceCenter, url: &str, old: &str) -> bool {
        for _ in 0..100 {
            if center.get(url).is_some_and(|r| r.content_hash() != old) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_reload_on_change_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.css");
        std::fs::write(&path, "a{}").unwrap();
        let center = Arc::new(ResourceCenter::new(
            CenterOptions::new(dir.path()).with_reload_interval(Duration::ZERO),
        ));
        center.initialize();
        let before = center.get("/site.css").unwrap();

        let (source, tx) = ChannelSource::new();
        let task = center.start_watching(&source).unwrap();

        std::fs::write(&path, "b{}").unwrap();
        tx.send(ChangeEvent {
            path: center.root().join("site.css"),
        })
        .unwrap();

        assert!(wait_for_hash_change(&center, "/site.css", before.content_hash()).await);
        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_unwatched_extension_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let center = Arc::new(ResourceCenter::new(
            CenterOptions::new(dir.path()).with_reload_interval(Duration::ZERO),
        ));
        center.initialize();
        let before = center.get("/logo.png").unwrap();

        let (source, tx) = ChannelSource::new();
        let task = center.start_watching(&source).unwrap();
        std::fs::write(&path, [4u8, 5, 6, 7]).unwrap();
        tx.send(ChangeEvent {
            path: center.root().join("logo.png"),
        })
        .unwrap();
        drop(tx);

        // closing the sender ends the loop once the event is handled
        for _ in 0..100 {
            if task.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(task.is_finished());
        assert!(Arc::ptr_eq(&before, &center.get("/logo.png").unwrap()));
    }

    #[tokio::test]
    async fn test_notify_source_reports_writes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let mut stream = NotifySource
            .watch(&root, &["css".to_string()])
            .unwrap();

        std::fs::write(root.join("ignored.txt"), "x").unwrap();
        std::fs::write(root.join("site.css"), "a{}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), stream.next_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.path.extension().unwrap(), "css");
    }
}
