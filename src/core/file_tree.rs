/*
 * Derives the folder hierarchy shown to the operator from the flat list of
 * file records. Folders are virtual: they exist only because some record path
 * passes through them. The tree is a pure projection that is rebuilt after
 * every change to the record list and is never mutated in place.
 *
 * Children of every folder are ordered folders first, then by case-sensitive
 * name, so the same set of records always produces the same tree regardless
 * of the order the records arrive in.
 */
use crate::core::models::{FileKind, FileRecord};
use crate::core::path_utils::{PATH_SEPARATOR, ROOT_PATH};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
}

/*
 * A folder or file in the derived hierarchy. File nodes carry the record's
 * path (the key to look the record up) and its classification.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTreeNode {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub file_kind: Option<FileKind>,
    pub children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    fn folder(name: &str, path: &str) -> Self {
        FileTreeNode {
            name: name.to_string(),
            path: path.to_string(),
            kind: NodeKind::Folder,
            file_kind: None,
            children: Vec::new(),
        }
    }

    fn file(name: &str, path: &str, file_kind: FileKind) -> Self {
        FileTreeNode {
            name: name.to_string(),
            path: path.to_string(),
            kind: NodeKind::File,
            file_kind: Some(file_kind),
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn find(&self, path: &str) -> Option<&FileTreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /* Paths of all file nodes, in depth-first display order. */
    pub fn file_paths(&self) -> Vec<String> {
        fn collect(node: &FileTreeNode, out: &mut Vec<String>) {
            for child in &node.children {
                match child.kind {
                    NodeKind::File => out.push(child.path.clone()),
                    NodeKind::Folder => collect(child, out),
                }
            }
        }
        let mut paths = Vec::new();
        collect(self, &mut paths);
        paths
    }

    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c.kind {
                NodeKind::File => 1,
                NodeKind::Folder => c.file_count(),
            })
            .sum()
    }
}

fn compare_nodes(a: &FileTreeNode, b: &FileTreeNode) -> Ordering {
    match (a.kind, b.kind) {
        (NodeKind::Folder, NodeKind::File) => Ordering::Less,
        (NodeKind::File, NodeKind::Folder) => Ordering::Greater,
        _ => a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)),
    }
}

fn sort_recursive(node: &mut FileTreeNode) {
    node.children.sort_by(compare_nodes);
    for child in node.children.iter_mut() {
        sort_recursive(child);
    }
}

/*
 * Builds the tree for a list of records. Empty path segments are discarded,
 * folders are created on first use, and one file leaf is attached per record.
 */
pub fn build_file_tree(records: &[FileRecord]) -> FileTreeNode {
    let mut root = FileTreeNode::folder(ROOT_PATH, ROOT_PATH);

    for record in records {
        let segments: Vec<&str> = record
            .path
            .split(PATH_SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect();
        let Some((file_name, folders)) = segments.split_last() else {
            log::warn!(
                "FileTree: Record with empty path {:?} skipped",
                record.path
            );
            continue;
        };

        let mut current = &mut root;
        let mut current_path = String::new();
        for folder_name in folders {
            current_path.push(PATH_SEPARATOR);
            current_path.push_str(folder_name);
            let existing = current
                .children
                .iter()
                .position(|c| c.is_folder() && c.name == *folder_name);
            let idx = match existing {
                Some(idx) => idx,
                None => {
                    current
                        .children
                        .push(FileTreeNode::folder(folder_name, &current_path));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[idx];
        }

        let file_path = format!("{current_path}{PATH_SEPARATOR}{file_name}");
        current
            .children
            .push(FileTreeNode::file(file_name, &file_path, record.kind));
    }

    sort_recursive(&mut root);
    log::trace!(
        "FileTree: Built tree with {} file(s) from {} record(s)",
        root.file_count(),
        records.len()
    );
    root
}
