//! In-memory view of the task forest of one or more lists.
//!
//! Rows are kept in an arena keyed by task id, and children are derived from a
//! parent index instead of being stored on the rows themselves. Every walk is
//! iterative and tracks the ids it has visited, so a corrupted `parent_id` chain
//! is reported as an error instead of looping.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::entities::sea_orm_active_enums::TaskStatus;
use crate::entities::task;
use crate::todo::TaskNode;

/// Errors raised when the stored rows do not form a forest.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// A walk reached the same task twice.
    #[error("Task {0} is part of a parent cycle")]
    Cycle(i32),
    /// A task references a parent that is not in the snapshot.
    #[error("Task {0} is not present in the hierarchy")]
    MissingTask(i32),
}

#[derive(Debug, Default)]
pub struct TaskForest {
    tasks: HashMap<i32, task::Model>,
    // Child ids sorted ascending, which is insertion order.
    children: HashMap<i32, Vec<i32>>,
    roots: BTreeMap<i32, Vec<i32>>,
}

impl TaskForest {
    /// Builds the arena from a snapshot of task rows.
    pub fn from_tasks(rows: impl IntoIterator<Item = task::Model>) -> Self {
        let mut rows: Vec<task::Model> = rows.into_iter().collect();
        rows.sort_by_key(|row| row.id);

        let mut forest = TaskForest::default();
        for row in rows {
            match row.parent_id {
                Some(parent_id) => forest.children.entry(parent_id).or_default().push(row.id),
                None => forest.roots.entry(row.list_id).or_default().push(row.id),
            }
            forest.tasks.insert(row.id, row);
        }
        forest
    }

    pub fn get(&self, id: i32) -> Option<&task::Model> {
        self.tasks.get(&id)
    }

    /// Direct children of a task, in insertion order.
    pub fn children(&self, id: i32) -> &[i32] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Top-level tasks of a list, in insertion order.
    pub fn roots(&self, list_id: i32) -> &[i32] {
        self.roots.get(&list_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of parent hops from `id` to its top-level ancestor. Roots have depth 0.
    pub fn depth(&self, id: i32) -> Result<usize, HierarchyError> {
        let mut visited = HashSet::new();
        let mut current = self.require(id)?;
        let mut depth = 0;
        visited.insert(current.id);

        while let Some(parent_id) = current.parent_id {
            if !visited.insert(parent_id) {
                return Err(HierarchyError::Cycle(parent_id));
            }
            current = self.require(parent_id)?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Number of levels below `id`. A task without children has height 0.
    pub fn height(&self, id: i32) -> Result<usize, HierarchyError> {
        self.require(id)?;
        let mut visited = HashSet::from([id]);
        let mut frontier = vec![id];
        let mut height = 0;

        loop {
            let mut next = Vec::new();
            for node in &frontier {
                for &child in self.children(*node) {
                    if !visited.insert(child) {
                        return Err(HierarchyError::Cycle(child));
                    }
                    next.push(child);
                }
            }
            if next.is_empty() {
                return Ok(height);
            }
            height += 1;
            frontier = next;
        }
    }

    /// Returns true when `candidate` is `ancestor` itself or one of its descendants,
    /// found by walking up the parent chain of `candidate`.
    pub fn is_self_or_descendant(
        &self,
        candidate: i32,
        ancestor: i32,
    ) -> Result<bool, HierarchyError> {
        let mut visited = HashSet::new();
        let mut current = Some(candidate);

        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            if !visited.insert(id) {
                return Err(HierarchyError::Cycle(id));
            }
            current = self.require(id)?.parent_id;
        }
        Ok(false)
    }

    /// All ids of the subtree rooted at `id`, in pre-order (parents before children).
    pub fn subtree(&self, id: i32) -> Result<Vec<i32>, HierarchyError> {
        self.require(id)?;
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![id];

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                return Err(HierarchyError::Cycle(node));
            }
            order.push(node);
            // Reverse so the first child is visited first.
            stack.extend(self.children(node).iter().rev());
        }
        Ok(order)
    }

    /// Subtree ids ordered so that every task comes after all of its descendants.
    pub fn deletion_order(&self, id: i32) -> Result<Vec<i32>, HierarchyError> {
        let mut order = self.subtree(id)?;
        order.reverse();
        Ok(order)
    }

    /// True when the task has children and every one of them is done.
    pub fn all_children_done(&self, id: i32) -> bool {
        let children = self.children(id);
        !children.is_empty()
            && children.iter().all(|child| {
                self.tasks
                    .get(child)
                    .is_some_and(|task| task.status == TaskStatus::Done)
            })
    }

    /// Renders the tasks of a list as nested nodes, preserving insertion order.
    pub fn tree(&self, list_id: i32) -> Result<Vec<TaskNode>, HierarchyError> {
        let mut order = Vec::new();
        for &root in self.roots(list_id) {
            order.extend(self.subtree(root)?);
        }

        // Children come after their parent in pre-order, so building in reverse
        // always finds a node's children already assembled.
        let mut built: HashMap<i32, TaskNode> = HashMap::with_capacity(order.len());
        for &id in order.iter().rev() {
            let row = self.require(id)?;
            let subtasks = self
                .children(id)
                .iter()
                .map(|child| built.remove(child).ok_or(HierarchyError::MissingTask(*child)))
                .collect::<Result<Vec<_>, _>>()?;
            built.insert(id, TaskNode::from_row(row, subtasks));
        }

        self.roots(list_id)
            .iter()
            .map(|root| built.remove(root).ok_or(HierarchyError::MissingTask(*root)))
            .collect()
    }

    fn require(&self, id: i32) -> Result<&task::Model, HierarchyError> {
        self.tasks.get(&id).ok_or(HierarchyError::MissingTask(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i32, list_id: i32, parent_id: Option<i32>, status: TaskStatus) -> task::Model {
        task::Model {
            id,
            title: format!("Task {id}"),
            description: String::new(),
            status,
            list_id,
            parent_id,
        }
    }

    /// 1 -> 2 -> 3, 1 -> 4, and a second root 5, all in list 10.
    fn sample_forest() -> TaskForest {
        TaskForest::from_tasks(vec![
            row(4, 10, Some(1), TaskStatus::Todo),
            row(1, 10, None, TaskStatus::Todo),
            row(3, 10, Some(2), TaskStatus::Done),
            row(2, 10, Some(1), TaskStatus::InProgress),
            row(5, 10, None, TaskStatus::Todo),
        ])
    }

    #[test]
    fn depth_counts_hops_to_the_root() {
        let forest = sample_forest();
        assert_eq!(forest.depth(1), Ok(0));
        assert_eq!(forest.depth(2), Ok(1));
        assert_eq!(forest.depth(3), Ok(2));
    }

    #[test]
    fn height_counts_levels_below() {
        let forest = sample_forest();
        assert_eq!(forest.height(1), Ok(2));
        assert_eq!(forest.height(2), Ok(1));
        assert_eq!(forest.height(5), Ok(0));
    }

    #[test]
    fn children_keep_insertion_order() {
        let forest = sample_forest();
        assert_eq!(forest.children(1), &[2, 4]);
        assert_eq!(forest.roots(10), &[1, 5]);
        assert!(forest.children(5).is_empty());
        assert!(forest.roots(99).is_empty());
    }

    #[test]
    fn detects_descendants_through_the_parent_chain() {
        let forest = sample_forest();
        assert_eq!(forest.is_self_or_descendant(3, 1), Ok(true));
        assert_eq!(forest.is_self_or_descendant(1, 1), Ok(true));
        assert_eq!(forest.is_self_or_descendant(1, 3), Ok(false));
        assert_eq!(forest.is_self_or_descendant(5, 1), Ok(false));
    }

    #[test]
    fn deletion_order_puts_children_first() {
        let forest = sample_forest();
        assert_eq!(forest.subtree(1), Ok(vec![1, 2, 3, 4]));
        assert_eq!(forest.deletion_order(1), Ok(vec![4, 3, 2, 1]));
        assert_eq!(forest.deletion_order(5), Ok(vec![5]));
    }

    #[test]
    fn all_children_done_requires_every_child() {
        let forest = sample_forest();
        assert!(forest.all_children_done(2));
        assert!(!forest.all_children_done(1));
        assert!(!forest.all_children_done(5));
    }

    #[test]
    fn reports_cycles_instead_of_looping() {
        let forest = TaskForest::from_tasks(vec![
            row(1, 10, Some(2), TaskStatus::Todo),
            row(2, 10, Some(1), TaskStatus::Todo),
        ]);
        assert!(matches!(forest.depth(1), Err(HierarchyError::Cycle(_))));
        assert!(matches!(
            forest.is_self_or_descendant(1, 7),
            Err(HierarchyError::Cycle(_))
        ));
        assert!(matches!(forest.subtree(1), Err(HierarchyError::Cycle(_))));
        assert!(matches!(forest.height(1), Err(HierarchyError::Cycle(_))));
    }

    #[test]
    fn reports_dangling_parents() {
        let forest = TaskForest::from_tasks(vec![row(1, 10, Some(42), TaskStatus::Todo)]);
        assert_eq!(forest.depth(1), Err(HierarchyError::MissingTask(42)));
        assert_eq!(forest.depth(7), Err(HierarchyError::MissingTask(7)));
    }

    #[test]
    fn renders_nested_tree() {
        let forest = sample_forest();
        let tree = forest.tree(10).unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, 1);
        assert_eq!(
            tree[0].subtasks.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(tree[0].subtasks[0].subtasks[0].id, 3);
        assert_eq!(tree[0].subtasks[0].subtasks[0].status, TaskStatus::Done);
        assert!(tree[1].subtasks.is_empty());
        assert!(forest.tree(11).unwrap().is_empty());
    }
}
