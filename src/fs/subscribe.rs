//! commit subscription streams
//!
//! A subscriber watches one branch and receives every finished commit on it
//! in finish order (which is ancestry order, since a commit finishes at most
//! once and a branch's history is linear going forward). The stream blocks
//! when it is caught up and wakes as soon as another commit finishes; it
//! only ends when the caller closes it or the repo is deleted.
//!
//! Blocking is a plain condvar wait on the owning repo's watch channel, so
//! an idle subscriber costs nothing, and `StreamCloser::close` wakes any
//! blocked `next` immediately from another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::fs::refs;
use crate::fs::repo::RepoCore;
use crate::fs::types::{CommitId, CommitInfo};

/// Per-repo wake-up channel for subscribers.
pub(crate) struct Watch {
    generation: Mutex<u64>,
    cv: Condvar,
}

impl Watch {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            cv: Condvar::new(),
        }
    }

    /// Wake every subscriber. Callers must not hold any other repo lock.
    pub fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cv.notify_all();
    }
}

/// Lazy, unbounded sequence of finished commits on one branch.
///
/// Obtained from [`Registry::subscribe_commit`](crate::fs::Registry::subscribe_commit).
/// `next` suspends the calling thread until a commit is available; hand a
/// [`StreamCloser`] to another thread to end the stream.
pub struct CommitStream {
    core: Arc<RepoCore>,
    branch: String,
    cursor: Option<CommitId>,
    closed: Arc<AtomicBool>,
}

/// Cancellation handle for a [`CommitStream`].
#[derive(Clone)]
pub struct StreamCloser {
    core: Arc<RepoCore>,
    closed: Arc<AtomicBool>,
}

impl StreamCloser {
    /// End the stream; any blocked `next` returns `None` immediately.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.core.watch.notify();
    }
}

impl CommitStream {
    pub(crate) fn new(core: Arc<RepoCore>, branch: String, from: Option<CommitId>) -> Self {
        Self {
            core,
            branch,
            cursor: from,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle that can close this stream from another thread.
    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            core: self.core.clone(),
            closed: self.closed.clone(),
        }
    }

    /// End the stream from the consuming side.
    pub fn close(&self) {
        self.closer().close();
    }

    fn is_done(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.core.deleted.load(Ordering::SeqCst)
    }

    /// The next undelivered commit on the branch, if it is already finished.
    ///
    /// Commits are delivered strictly in chain order: an open commit at the
    /// front of the remainder blocks everything behind it until it finishes.
    fn next_finished(&self) -> Option<CommitInfo> {
        let chain = refs::branch_chain(&self.core, &self.branch);
        let start = match &self.cursor {
            None => 0,
            Some(cursor) => chain.iter().position(|id| id == cursor)? + 1,
        };
        let next = chain.get(start)?;
        let cell = self.core.commits.read().get(next).cloned()?;
        if cell.is_finished() {
            Some(cell.info(self.core.name.as_str()))
        } else {
            None
        }
    }
}

impl Iterator for CommitStream {
    type Item = CommitInfo;

    fn next(&mut self) -> Option<CommitInfo> {
        let mut generation = self.core.watch.generation.lock();
        loop {
            if self.is_done() {
                return None;
            }
            if let Some(info) = self.next_finished() {
                self.cursor = Some(info.id.clone());
                return Some(info);
            }
            self.core.watch.cv.wait(&mut generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::block::MemBlockStore;
    use crate::fs::registry::Registry;
    use crate::fs::types::CommitId;

    fn setup() -> Registry {
        Registry::new(Arc::new(MemBlockStore::new()))
    }

    fn chain_commits(fs: &Registry, repo: &str, count: usize) -> Vec<CommitId> {
        let mut commits = Vec::new();
        let mut parent = String::new();
        for _ in 0..count {
            let commit = fs.start_commit(repo, &parent).unwrap();
            fs.finish_commit(repo, commit.as_str()).unwrap();
            parent = commit.as_str().to_string();
            commits.push(commit);
        }
        commits
    }

    #[test]
    fn test_delivers_existing_and_new_commits() {
        let fs = setup();
        fs.create_repo("test", &[]).unwrap();

        let commits = chain_commits(&fs, "test", 10);
        fs.set_branch("test", commits.last().unwrap().as_str(), "master")
            .unwrap();

        let mut stream = fs.subscribe_commit("test", "master", "").unwrap();
        for expected in &commits {
            let info = stream.next().unwrap();
            assert_eq!(&info.id, expected);
            assert!(!info.is_open());
        }

        // commits finished after the subscription was set up arrive too
        let producer = {
            let fs = fs.clone();
            thread::spawn(move || {
                let mut produced = Vec::new();
                for _ in 0..10 {
                    let commit = fs.start_commit("test", "master").unwrap();
                    fs.finish_commit("test", "master").unwrap();
                    produced.push(commit);
                }
                produced
            })
        };

        let mut received = Vec::new();
        for _ in 0..10 {
            received.push(stream.next().unwrap().id);
        }
        let produced = producer.join().unwrap();
        assert_eq!(received, produced);

        stream.close();
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_from_ref_is_exclusive() {
        let fs = setup();
        fs.create_repo("test", &[]).unwrap();

        let commits = chain_commits(&fs, "test", 6);
        fs.set_branch("test", commits.last().unwrap().as_str(), "master")
            .unwrap();

        let mut stream = fs
            .subscribe_commit("test", "master", commits[2].as_str())
            .unwrap();
        for expected in &commits[3..] {
            assert_eq!(&stream.next().unwrap().id, expected);
        }
        stream.close();
    }

    #[test]
    fn test_close_releases_blocked_wait() {
        let fs = setup();
        fs.create_repo("test", &[]).unwrap();

        let stream = fs.subscribe_commit("test", "master", "").unwrap();
        let closer = stream.closer();

        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let mut stream = stream;
            tx.send(()).unwrap();
            stream.next()
        });

        rx.recv().unwrap();
        // give the subscriber time to block on the empty branch
        thread::sleep(Duration::from_millis(50));
        closer.close();

        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn test_repo_deletion_ends_stream() {
        let fs = setup();
        fs.create_repo("test", &[]).unwrap();

        let commits = chain_commits(&fs, "test", 1);
        fs.set_branch("test", commits[0].as_str(), "master").unwrap();

        let mut stream = fs.subscribe_commit("test", "master", "").unwrap();
        assert_eq!(stream.next().unwrap().id, commits[0]);

        fs.delete_repo("test", false).unwrap();
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_open_commit_blocks_delivery() {
        let fs = setup();
        fs.create_repo("test", &[]).unwrap();

        let commit = fs.start_commit("test", "").unwrap();
        fs.set_branch("test", commit.as_str(), "master").unwrap();

        let mut stream = fs.subscribe_commit("test", "master", "").unwrap();
        let closer = stream.closer();

        let finisher = {
            let fs = fs.clone();
            let commit = commit.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                fs.finish_commit("test", commit.as_str()).unwrap();
            })
        };

        // blocks until the finisher seals the commit
        assert_eq!(stream.next().unwrap().id, commit);
        finisher.join().unwrap();
        closer.close();
    }
}
