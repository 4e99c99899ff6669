//! Lazily populated directory tree for interactive browsing.
//!
//! A node lists its subdirectories the first time anyone asks and keeps
//! the answer for good. Population is single-flight: concurrent askers
//! wait for the one read in progress instead of starting their own.

use crate::exclude::ExclusionPolicy;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
#[cfg(feature = "logging")]
use tracing;

/// Memoized child list, published all at once.
pub type Children = Arc<[Arc<DirectoryNode>]>;

enum Population {
    Unstarted,
    InProgress,
    Done(Children),
}

/// State shared by every node of one tree.
#[derive(Debug)]
struct TreeShared {
    policy: ExclusionPolicy,
    reads: AtomicU64,
}

/// One directory in the browser tree.
///
/// Children are owned by their parent; the parent link is weak. A node
/// handed out to a caller can outlive its ancestors, after which it is
/// detached: it has no path and lists no children.
pub struct DirectoryNode {
    name: OsString,
    is_root: bool,
    parent: Weak<DirectoryNode>,
    shared: Arc<TreeShared>,
    population: Mutex<Population>,
    ready: Condvar,
}

impl std::fmt::Debug for DirectoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryNode")
            .field("path", &self.path())
            .field("populated", &self.is_populated())
            .finish()
    }
}

impl DirectoryNode {
    /// A root node. `name` is a root designator such as `/` or `C:\`.
    pub fn root(name: impl Into<OsString>, policy: ExclusionPolicy) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            is_root: true,
            parent: Weak::new(),
            shared: Arc::new(TreeShared {
                policy,
                reads: AtomicU64::new(0),
            }),
            population: Mutex::new(Population::Unstarted),
            ready: Condvar::new(),
        })
    }

    fn child(self: &Arc<Self>, name: OsString) -> Arc<Self> {
        Arc::new(Self {
            name,
            is_root: false,
            parent: Arc::downgrade(self),
            shared: Arc::clone(&self.shared),
            population: Mutex::new(Population::Unstarted),
            ready: Condvar::new(),
        })
    }

    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// `None` for a root, or once the parent has been dropped.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.upgrade()
    }

    /// Absolute path, rebuilt by walking up to the root.
    ///
    /// `None` once an ancestor has been dropped and the walk can no longer
    /// reach a root.
    pub fn path(&self) -> Option<PathBuf> {
        let mut names = vec![self.name.clone()];
        let mut reached_root = self.is_root;
        let mut next = self.parent.upgrade();
        while let Some(dir) = next {
            names.push(dir.name.clone());
            reached_root = dir.is_root;
            next = dir.parent.upgrade();
        }
        reached_root.then(|| names.iter().rev().collect())
    }

    pub fn child_count(self: &Arc<Self>) -> usize {
        self.children().len()
    }

    /// The `index`th subdirectory in name order.
    ///
    /// Also starts listing that child's own subdirectories in the
    /// background, so the next level is usually ready before it is opened.
    pub fn child_at(self: &Arc<Self>, index: usize) -> Option<Arc<Self>> {
        let child = self.children().get(index).cloned()?;
        child.prefetch();
        Some(child)
    }

    /// All subdirectories in name order, listing them on first use.
    pub fn children(self: &Arc<Self>) -> Children {
        if self.claim() {
            return self.populate();
        }
        self.wait_populated()
    }

    /// Starts population without waiting for it. No-op once started.
    pub fn prefetch(self: &Arc<Self>) {
        if !self.claim() {
            return;
        }
        spawn_population(Arc::clone(self));
    }

    pub fn is_populated(&self) -> bool {
        matches!(*self.lock(), Population::Done(_))
    }

    /// Directory reads performed anywhere in this node's tree.
    pub fn directory_reads(&self) -> u64 {
        self.shared.reads.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Population> {
        self.population
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves `Unstarted` to `InProgress`; true for the caller that won.
    fn claim(&self) -> bool {
        let mut population = self.lock();
        if matches!(*population, Population::Unstarted) {
            *population = Population::InProgress;
            true
        } else {
            false
        }
    }

    fn wait_populated(&self) -> Children {
        let mut population = self.lock();
        loop {
            if let Population::Done(children) = &*population {
                return Arc::clone(children);
            }
            population = self
                .ready
                .wait(population)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn populate(self: &Arc<Self>) -> Children {
        let children = self.read_children();
        *self.lock() = Population::Done(Arc::clone(&children));
        self.ready.notify_all();
        children
    }

    fn read_children(self: &Arc<Self>) -> Children {
        let Some(dir) = self.path() else {
            #[cfg(feature = "logging")]
            tracing::debug!("Not listing detached node {:?}", self.name);
            return Arc::from(Vec::new());
        };
        self.shared.reads.fetch_add(1, Ordering::Relaxed);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_e) => {
                #[cfg(feature = "logging")]
                tracing::debug!("Cannot list {}: {}", dir.display(), _e);
                return Arc::from(Vec::new());
            }
        };
        let policy = &self.shared.policy;
        let mut names: Vec<OsString> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .map(|entry| entry.file_name())
            .filter(|name| !policy.should_exclude(&name.to_string_lossy()))
            .collect();
        names.sort();
        names.into_iter().map(|name| self.child(name)).collect()
    }
}

#[cfg(feature = "parallel")]
fn spawn_population(node: Arc<DirectoryNode>) {
    rayon::spawn(move || {
        node.populate();
    });
}

#[cfg(not(feature = "parallel"))]
fn spawn_population(node: Arc<DirectoryNode>) {
    let inline = Arc::clone(&node);
    let spawned = std::thread::Builder::new()
        .name("dwgscan-prefetch".into())
        .spawn(move || {
            node.populate();
        });
    if let Err(_e) = spawned {
        #[cfg(feature = "logging")]
        tracing::debug!("Prefetch thread unavailable, listing inline: {}", _e);
        inline.populate();
    }
}

/// Top-level roots offered to the browser, enumerated once.
#[derive(Debug, Default)]
pub struct DirectoryTree {
    roots: Vec<Arc<DirectoryNode>>,
}

impl DirectoryTree {
    /// The machine's roots, minus floppy drives.
    pub fn discover(policy: ExclusionPolicy) -> Self {
        Self::from_roots(system_roots(), policy, is_navigable)
    }

    pub fn from_roots<I, S>(
        roots: I,
        policy: ExclusionPolicy,
        navigable: impl Fn(&str) -> bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots = roots
            .into_iter()
            .filter(|root| navigable(root.as_ref()))
            .map(|root| DirectoryNode::root(root.as_ref(), policy.clone()))
            .collect();
        Self { roots }
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn root_at(&self, index: usize) -> Option<Arc<DirectoryNode>> {
        self.roots.get(index).cloned()
    }

    pub fn roots(&self) -> &[Arc<DirectoryNode>] {
        &self.roots
    }
}

#[cfg(windows)]
pub fn system_roots() -> Vec<String> {
    (b'A'..=b'Z')
        .map(|letter| format!("{}:\\", letter as char))
        .filter(|drive| std::path::Path::new(drive).exists())
        .collect()
}

#[cfg(not(windows))]
pub fn system_roots() -> Vec<String> {
    vec!["/".to_string()]
}

fn is_navigable(root: &str) -> bool {
    !matches!(root, "A:\\" | "B:\\")
}

/// Renders `node` and up to `max_depth` levels below it, `tree`-style.
pub fn render_tree(node: &Arc<DirectoryNode>, max_depth: usize) -> String {
    let header = match node.path() {
        Some(path) => path.display().to_string(),
        None => node.name().to_string_lossy().into_owned(),
    };
    let mut lines = vec![format!(".  # {}", header)];
    render_children(node, 1, max_depth, &mut lines);
    lines.join("\n")
}

fn render_children(
    node: &Arc<DirectoryNode>,
    depth: usize,
    max_depth: usize,
    lines: &mut Vec<String>,
) {
    if depth > max_depth {
        return;
    }
    for index in 0..node.child_count() {
        let Some(child) = node.child_at(index) else {
            break;
        };
        let prefix = "│   ".repeat(depth - 1) + "├── ";
        lines.push(format!("{}{}", prefix, child.name().to_string_lossy()));
        render_children(&child, depth + 1, max_depth, lines);
    }
}
