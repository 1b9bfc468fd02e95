/*
 * Keyboard navigation over the derived file tree, and the scoped listener
 * registration that drives it.
 *
 * A `KeyboardHub` is the single source of navigation keys. Subscribing returns
 * a `Subscription` handle; the listener stays attached exactly as long as the
 * handle lives, so a tree view that owns its handle detaches when it is
 * dropped and repeated mounts never leak listeners.
 */
use crate::core::file_tree::{FileTreeNode, NodeKind};
use crate::core::path_utils::{ROOT_PATH, parent_of};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

type Listener = Box<dyn FnMut(NavKey) + Send>;

#[derive(Default)]
struct HubState {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/*
 * Dispatches navigation keys to the currently attached listeners. Cloning the
 * hub shares the same listener list.
 */
#[derive(Clone, Default)]
pub struct KeyboardHub {
    state: Arc<Mutex<HubState>>,
}

impl KeyboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl FnMut(NavKey) + Send + 'static) -> Subscription {
        let mut id = 0;
        if let Ok(mut state) = self.state.lock() {
            id = state.next_id;
            state.next_id += 1;
            state.listeners.push((id, Box::new(listener)));
            log::trace!(
                "KeyboardHub: Attached listener {id} ({} active)",
                state.listeners.len()
            );
        } else {
            log::error!("KeyboardHub: Listener list is poisoned, subscription is inert");
        }
        Subscription {
            id,
            hub: Arc::downgrade(&self.state),
            attached: true,
        }
    }

    /*
     * Delivers `key` to every attached listener and returns how many received
     * it. Listeners must not subscribe or unsubscribe from inside the call.
     */
    pub fn dispatch(&self, key: NavKey) -> usize {
        match self.state.lock() {
            Ok(mut state) => {
                for (_, listener) in state.listeners.iter_mut() {
                    listener(key);
                }
                state.listeners.len()
            }
            Err(_) => {
                log::error!("KeyboardHub: Listener list is poisoned, dropping {key:?}");
                0
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().map(|s| s.listeners.len()).unwrap_or(0)
    }
}

/* Keeps one listener attached; detaches it when dropped. */
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubState>>,
    attached: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if let Some(state) = self.hub.upgrade()
            && let Ok(mut state) = state.lock()
        {
            state.listeners.retain(|(id, _)| *id != self.id);
            log::trace!(
                "KeyboardHub: Detached listener {} ({} active)",
                self.id,
                state.listeners.len()
            );
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/* One row of the tree as currently displayed. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub is_folder: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Moved(String),
    Expanded(String),
    Collapsed(String),
    OpenFile(String),
    Unchanged,
}

/*
 * Expansion state and selection over a `FileTreeNode`. The root itself is
 * never shown; its children are the top-level rows.
 */
#[derive(Debug, Clone)]
pub struct TreeNavigator {
    tree: FileTreeNode,
    expanded: HashSet<String>,
    selected: Option<String>,
}

impl TreeNavigator {
    pub fn new(tree: FileTreeNode) -> Self {
        let selected = tree.children.first().map(|c| c.path.clone());
        TreeNavigator {
            tree,
            expanded: HashSet::new(),
            selected,
        }
    }

    /*
     * Swaps in a rebuilt tree. Expansion is kept for folders that still exist;
     * the selection is kept when it is still visible.
     */
    pub fn set_tree(&mut self, tree: FileTreeNode) {
        self.expanded
            .retain(|path| tree.find(path).is_some_and(FileTreeNode::is_folder));
        self.tree = tree;
        let rows = self.visible_rows();
        let still_visible = self
            .selected
            .as_ref()
            .is_some_and(|sel| rows.iter().any(|r| &r.path == sel));
        if !still_visible {
            self.selected = rows.first().map(|r| r.path.clone());
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /* Selects `path`, expanding its ancestors so it is visible. */
    pub fn reveal(&mut self, path: &str) -> bool {
        if self.tree.find(path).is_none() || path == ROOT_PATH {
            return false;
        }
        let mut parent = parent_of(path);
        while parent != ROOT_PATH {
            self.expanded.insert(parent.to_string());
            parent = parent_of(parent);
        }
        self.selected = Some(path.to_string());
        true
    }

    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        fn walk(
            node: &FileTreeNode,
            depth: usize,
            expanded: &HashSet<String>,
            rows: &mut Vec<VisibleRow>,
        ) {
            for child in &node.children {
                let is_folder = child.kind == NodeKind::Folder;
                let is_expanded = is_folder && expanded.contains(&child.path);
                rows.push(VisibleRow {
                    path: child.path.clone(),
                    name: child.name.clone(),
                    depth,
                    is_folder,
                    expanded: is_expanded,
                });
                if is_expanded {
                    walk(child, depth + 1, expanded, rows);
                }
            }
        }
        let mut rows = Vec::new();
        walk(&self.tree, 0, &self.expanded, &mut rows);
        rows
    }

    pub fn handle_key(&mut self, key: NavKey) -> NavOutcome {
        let rows = self.visible_rows();
        let Some(current_idx) = self
            .selected
            .as_ref()
            .and_then(|sel| rows.iter().position(|r| &r.path == sel))
        else {
            return match rows.first() {
                Some(first) => self.select(&first.path),
                None => NavOutcome::Unchanged,
            };
        };
        let current = &rows[current_idx];

        match key {
            NavKey::Down => match rows.get(current_idx + 1) {
                Some(next) => self.select(&next.path),
                None => NavOutcome::Unchanged,
            },
            NavKey::Up if current_idx > 0 => self.select(&rows[current_idx - 1].path),
            NavKey::Up => NavOutcome::Unchanged,
            NavKey::Right if current.is_folder && !current.expanded => {
                self.expanded.insert(current.path.clone());
                NavOutcome::Expanded(current.path.clone())
            }
            NavKey::Right => match rows.get(current_idx + 1) {
                Some(child) if current.is_folder && child.depth > current.depth => {
                    self.select(&child.path)
                }
                _ => NavOutcome::Unchanged,
            },
            NavKey::Left if current.is_folder && current.expanded => {
                self.expanded.remove(&current.path);
                NavOutcome::Collapsed(current.path.clone())
            }
            NavKey::Left => {
                let parent = parent_of(&current.path);
                if parent == ROOT_PATH {
                    NavOutcome::Unchanged
                } else {
                    let parent = parent.to_string();
                    self.select(&parent)
                }
            }
            NavKey::Enter if current.is_folder => {
                if current.expanded {
                    self.expanded.remove(&current.path);
                    NavOutcome::Collapsed(current.path.clone())
                } else {
                    self.expanded.insert(current.path.clone());
                    NavOutcome::Expanded(current.path.clone())
                }
            }
            NavKey::Enter => NavOutcome::OpenFile(current.path.clone()),
        }
    }

    fn select(&mut self, path: &str) -> NavOutcome {
        self.selected = Some(path.to_string());
        NavOutcome::Moved(path.to_string())
    }
}

/*
 * A mounted tree view. Mounting attaches one keyboard listener that drives the
 * navigator; dropping the view (or calling `unmount`) detaches it. Files
 * chosen with Enter queue up as open requests for the owner to collect.
 */
pub struct TreeView {
    navigator: Arc<Mutex<TreeNavigator>>,
    open_requests: Arc<Mutex<VecDeque<String>>>,
    _subscription: Subscription,
}

impl TreeView {
    pub fn mount(hub: &KeyboardHub, tree: FileTreeNode) -> Self {
        let navigator = Arc::new(Mutex::new(TreeNavigator::new(tree)));
        let open_requests = Arc::new(Mutex::new(VecDeque::new()));

        let listener_navigator = Arc::clone(&navigator);
        let listener_requests = Arc::clone(&open_requests);
        let subscription = hub.subscribe(move |key| {
            let outcome = match listener_navigator.lock() {
                Ok(mut nav) => nav.handle_key(key),
                Err(_) => return,
            };
            if let NavOutcome::OpenFile(path) = outcome
                && let Ok(mut requests) = listener_requests.lock()
            {
                requests.push_back(path);
            }
        });
        log::debug!("TreeView: Mounted with listener {}", subscription.id());

        TreeView {
            navigator,
            open_requests,
            _subscription: subscription,
        }
    }

    pub fn unmount(self) {
        log::debug!("TreeView: Unmounting");
    }

    pub fn set_tree(&self, tree: FileTreeNode) {
        if let Ok(mut nav) = self.navigator.lock() {
            nav.set_tree(tree);
        }
    }

    pub fn selected(&self) -> Option<String> {
        self.navigator
            .lock()
            .ok()
            .and_then(|nav| nav.selected().map(str::to_string))
    }

    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        self.navigator
            .lock()
            .map(|nav| nav.visible_rows())
            .unwrap_or_default()
    }

    pub fn take_open_requests(&self) -> Vec<String> {
        self.open_requests
            .lock()
            .map(|mut requests| requests.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_tree::build_file_tree;
    use crate::core::models::FileRecord;

    fn tree() -> FileTreeNode {
        let records: Vec<FileRecord> = ["/a/b.ftl", "/a/c.ftl", "/a/sub/d.ftl", "/e.yml"]
            .iter()
            .map(|p| FileRecord::new(*p, ""))
            .collect();
        build_file_tree(&records)
    }

    fn row_paths(nav: &TreeNavigator) -> Vec<String> {
        nav.visible_rows().into_iter().map(|r| r.path).collect()
    }

    #[test]
    fn test_collapsed_tree_shows_top_level_only() {
        let nav = TreeNavigator::new(tree());
        assert_eq!(row_paths(&nav), vec!["/a", "/e.yml"]);
        assert_eq!(nav.selected(), Some("/a"));
    }

    #[test]
    fn test_expand_and_walk_into_folder() {
        let mut nav = TreeNavigator::new(tree());

        assert_eq!(nav.handle_key(NavKey::Right), NavOutcome::Expanded("/a".into()));
        assert_eq!(
            row_paths(&nav),
            vec!["/a", "/a/sub", "/a/b.ftl", "/a/c.ftl", "/e.yml"]
        );
        assert_eq!(nav.handle_key(NavKey::Right), NavOutcome::Moved("/a/sub".into()));
        assert_eq!(nav.handle_key(NavKey::Down), NavOutcome::Moved("/a/b.ftl".into()));
        assert_eq!(
            nav.handle_key(NavKey::Enter),
            NavOutcome::OpenFile("/a/b.ftl".into())
        );
        assert_eq!(nav.handle_key(NavKey::Left), NavOutcome::Moved("/a".into()));
        assert_eq!(nav.handle_key(NavKey::Left), NavOutcome::Collapsed("/a".into()));
        assert_eq!(nav.handle_key(NavKey::Left), NavOutcome::Unchanged);
    }

    #[test]
    fn test_up_down_stop_at_edges() {
        let mut nav = TreeNavigator::new(tree());
        assert_eq!(nav.handle_key(NavKey::Up), NavOutcome::Unchanged);
        assert_eq!(nav.handle_key(NavKey::Down), NavOutcome::Moved("/e.yml".into()));
        assert_eq!(nav.handle_key(NavKey::Down), NavOutcome::Unchanged);
    }

    #[test]
    fn test_enter_toggles_folder() {
        let mut nav = TreeNavigator::new(tree());
        assert_eq!(nav.handle_key(NavKey::Enter), NavOutcome::Expanded("/a".into()));
        assert!(nav.is_expanded("/a"));
        assert_eq!(nav.handle_key(NavKey::Enter), NavOutcome::Collapsed("/a".into()));
        assert!(!nav.is_expanded("/a"));
    }

    #[test]
    fn test_reveal_expands_ancestors() {
        let mut nav = TreeNavigator::new(tree());
        assert!(nav.reveal("/a/sub/d.ftl"));
        assert!(nav.is_expanded("/a"));
        assert!(nav.is_expanded("/a/sub"));
        assert_eq!(nav.selected(), Some("/a/sub/d.ftl"));
        assert!(!nav.reveal("/missing.ftl"));
    }

    #[test]
    fn test_set_tree_keeps_valid_state() {
        let mut nav = TreeNavigator::new(tree());
        nav.reveal("/a/c.ftl");

        let rebuilt = build_file_tree(&[FileRecord::new("/a/c.ftl", ""), FileRecord::new("/z.ftl", "")]);
        nav.set_tree(rebuilt);
        assert_eq!(nav.selected(), Some("/a/c.ftl"));
        assert!(nav.is_expanded("/a"));
        assert!(!nav.is_expanded("/a/sub"));

        nav.set_tree(build_file_tree(&[FileRecord::new("/z.ftl", "")]));
        assert_eq!(nav.selected(), Some("/z.ftl"));
    }

    #[test]
    fn test_subscription_detaches_exactly_once_on_drop() {
        let hub = KeyboardHub::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let subscription = hub.subscribe(move |key| sink.lock().unwrap().push(key));
        assert_eq!(hub.listener_count(), 1);
        assert_eq!(hub.dispatch(NavKey::Down), 1);

        drop(subscription);
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.dispatch(NavKey::Up), 0);
        assert_eq!(*received.lock().unwrap(), vec![NavKey::Down]);
    }

    #[test]
    fn test_explicit_unsubscribe_leaves_other_listeners() {
        let hub = KeyboardHub::new();
        let first = hub.subscribe(|_| {});
        let second = hub.subscribe(|_| {});
        assert_ne!(first.id(), second.id());

        first.unsubscribe();

        assert_eq!(hub.listener_count(), 1);
        drop(second);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_repeated_mounts_keep_one_listener_per_view() {
        // Arrange
        let hub = KeyboardHub::new();

        // Act
        for _ in 0..5 {
            let view = TreeView::mount(&hub, tree());
            assert_eq!(hub.listener_count(), 1);
            view.unmount();
        }

        // Assert
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_tree_view_queues_open_requests() {
        let hub = KeyboardHub::new();
        let view = TreeView::mount(&hub, tree());

        hub.dispatch(NavKey::Down);
        hub.dispatch(NavKey::Enter);

        assert_eq!(view.selected().as_deref(), Some("/e.yml"));
        assert_eq!(view.take_open_requests(), vec!["/e.yml".to_string()]);
        assert!(view.take_open_requests().is_empty());
        assert_eq!(view.visible_rows().len(), 2);
    }

    #[test]
    fn test_subscription_outliving_hub_is_harmless() {
        let hub = KeyboardHub::new();
        let subscription = hub.subscribe(|_| {});
        drop(hub);
        drop(subscription);
    }
}
