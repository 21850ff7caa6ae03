//! The display-side tree: ordered, hierarchical rows with stable handles.
//!
//! Rows live in a generational arena, so a [RowRef] stays valid while other rows
//! are inserted, moved, or erased around it, and stops resolving (instead of
//! aliasing some newer row) once its own row is erased.

pub mod layout;

use std::vec;

use bitflags::bitflags;
use slotmap::SlotMap;
use thiserror::Error;

use crate::format::Label;
use crate::model::document::NodeId;

slotmap::new_key_type! {
    pub struct RowRef;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RowFlags: u8 {
        const EXPANDED = 0b001;
        const SELECTED = 0b010;
        const EDITING  = 0b100;
    }
}

/// Child indices from the top level down to a row.
pub type Path = vec::Vec<usize>;

#[derive(Debug, Clone)]
pub struct Row {
    node: NodeId,
    label: Label,
    parent: Option<RowRef>,
    children: vec::Vec<RowRef>,
    flags: RowFlags,
}

impl Row {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn text(&self) -> &str {
        &self.label.text
    }

    pub fn markup(&self) -> &str {
        &self.label.markup
    }

    pub fn parent(&self) -> Option<RowRef> {
        self.parent
    }

    pub fn children(&self) -> &[RowRef] {
        &self.children
    }

    pub fn flags(&self) -> RowFlags {
        self.flags
    }

    pub fn is_expanded(&self) -> bool {
        self.flags.contains(RowFlags::EXPANDED)
    }
}

/// Where a moved row should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveParent {
    /// Stay under the current parent.
    Same,
    Top,
    Row(RowRef),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("row {0:?} no longer exists")]
    StaleRow(RowRef),

    #[error("row {after:?} is not a sibling at the requested position")]
    NotASibling { after: RowRef },

    #[error("row {0:?} cannot be moved into its own subtree")]
    WouldCreateCycle(RowRef),
}

#[derive(Debug, Default)]
pub struct DisplayModel {
    rows: SlotMap<RowRef, Row>,
    top: vec::Vec<RowRef>,

    selected: Option<RowRef>,
    scroll_target: Option<RowRef>,
    editing: Option<RowRef>,
}

impl DisplayModel {
    pub fn new() -> DisplayModel {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row: RowRef) -> bool {
        self.rows.contains_key(row)
    }

    pub fn get(&self, row: RowRef) -> Option<&Row> {
        self.rows.get(row)
    }

    fn row(&self, row: RowRef) -> Result<&Row, DisplayError> {
        self.rows.get(row).ok_or(DisplayError::StaleRow(row))
    }

    pub fn node(&self, row: RowRef) -> Option<NodeId> {
        self.rows.get(row).map(Row::node)
    }

    /// Rows under `parent`, or the top-level rows for `None`.
    pub fn children(&self, parent: Option<RowRef>) -> Result<&[RowRef], DisplayError> {
        match parent {
            None => Ok(&self.top),
            Some(parent) => self.row(parent).map(Row::children),
        }
    }

    fn children_mut(&mut self, parent: Option<RowRef>) -> Result<&mut vec::Vec<RowRef>, DisplayError> {
        match parent {
            None => Ok(&mut self.top),
            Some(parent) => self.rows.get_mut(parent).map(|r| &mut r.children).ok_or(DisplayError::StaleRow(parent)),
        }
    }

    fn index_after(siblings: &[RowRef], after: Option<RowRef>) -> Result<usize, DisplayError> {
        match after {
            None => Ok(0),
            Some(after) => siblings.iter()
                .position(|r| *r == after)
                .map(|i| i + 1)
                .ok_or(DisplayError::NotASibling { after }),
        }
    }

    fn is_ancestor_or_self(&self, ancestor: RowRef, row: RowRef) -> bool {
        let mut current = Some(row);
        while let Some(r) = current {
            if r == ancestor {
                return true;
            }
            current = self.rows.get(r).and_then(Row::parent);
        }
        false
    }

    /// Inserts a new row under `parent` (top level for `None`), right after
    /// `after`, or first if `after` is `None`.
    pub fn insert(&mut self, parent: Option<RowRef>, after: Option<RowRef>, node: NodeId, label: Label) -> Result<RowRef, DisplayError> {
        let index = Self::index_after(self.children(parent)?, after)?;

        let row = self.rows.insert(Row {
            node,
            label,
            parent,
            children: vec::Vec::new(),
            flags: RowFlags::empty(),
        });

        self.children_mut(parent)?.insert(index, row);
        Ok(row)
    }

    pub fn set_label(&mut self, row: RowRef, label: Label) -> Result<(), DisplayError> {
        self.rows.get_mut(row).ok_or(DisplayError::StaleRow(row))?.label = label;
        Ok(())
    }

    /// Moves a row (with its subtree) to sit right after `after` under the new
    /// parent, or first if `after` is `None`. The handle stays the same.
    pub fn move_row(&mut self, row: RowRef, to: MoveParent, after: Option<RowRef>) -> Result<(), DisplayError> {
        let old_parent = self.row(row)?.parent;
        let new_parent = match to {
            MoveParent::Same => old_parent,
            MoveParent::Top => None,
            MoveParent::Row(parent) => Some(parent),
        };

        if let Some(parent) = new_parent {
            self.row(parent)?;
            if self.is_ancestor_or_self(row, parent) {
                return Err(DisplayError::WouldCreateCycle(row));
            }
        }

        if let Some(after) = after {
            if after == row || !self.children(new_parent)?.contains(&after) {
                return Err(DisplayError::NotASibling { after });
            }
        }

        self.children_mut(old_parent)?.retain(|r| *r != row);

        let siblings = self.children_mut(new_parent)?;
        let index = Self::index_after(siblings, after)?;
        siblings.insert(index, row);

        self.rows[row].parent = new_parent;
        Ok(())
    }

    /// Erases a row and every row beneath it. Returns how many rows went away.
    pub fn erase(&mut self, row: RowRef) -> Result<usize, DisplayError> {
        let parent = self.row(row)?.parent;
        self.children_mut(parent)?.retain(|r| *r != row);

        let mut count = 0;
        let mut stack = vec![row];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.rows.remove(current) {
                stack.extend(removed.children);
                count+= 1;
            }
        }

        /* forget handles into the erased subtree */
        for slot in [&mut self.selected, &mut self.scroll_target, &mut self.editing] {
            if slot.is_some_and(|r| !self.rows.contains_key(r)) {
                *slot = None;
            }
        }

        Ok(count)
    }

    pub fn resolve_path(&self, row: RowRef) -> Result<Path, DisplayError> {
        let mut path = Path::new();
        let mut current = row;

        loop {
            let parent = self.row(current)?.parent;
            let index = self.children(parent)?
                .iter()
                .position(|r| *r == current)
                .ok_or(DisplayError::StaleRow(current))?;
            path.push(index);

            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        path.reverse();
        Ok(path)
    }

    pub fn row_at(&self, path: &[usize]) -> Option<RowRef> {
        let mut siblings: &[RowRef] = &self.top;
        let mut row = None;

        for index in path {
            let current = *siblings.get(*index)?;
            siblings = &self.rows.get(current)?.children;
            row = Some(current);
        }

        row
    }

    /// Every row in pre-order, with its depth.
    pub fn walk(&self) -> vec::Vec<(usize, RowRef)> {
        let mut rows = vec::Vec::with_capacity(self.rows.len());
        let mut stack: vec::Vec<(usize, RowRef)> = self.top.iter().rev().map(|r| (0, *r)).collect();

        while let Some((depth, row)) = stack.pop() {
            rows.push((depth, row));
            if let Some(r) = self.rows.get(row) {
                stack.extend(r.children.iter().rev().map(|c| (depth + 1, *c)));
            }
        }

        rows
    }

    /// Rows a viewer would currently show: pre-order, skipping the children of
    /// collapsed rows.
    pub fn visible_rows(&self) -> vec::Vec<RowRef> {
        let mut rows = vec::Vec::new();
        let mut stack: vec::Vec<RowRef> = self.top.iter().rev().copied().collect();

        while let Some(row) = stack.pop() {
            rows.push(row);
            if let Some(r) = self.rows.get(row) {
                if r.is_expanded() {
                    stack.extend(r.children.iter().rev());
                }
            }
        }

        rows
    }

    /* Presentation state */

    pub fn set_expanded(&mut self, row: RowRef, expanded: bool) -> Result<(), DisplayError> {
        let r = self.rows.get_mut(row).ok_or(DisplayError::StaleRow(row))?;
        r.flags.set(RowFlags::EXPANDED, expanded);
        Ok(())
    }

    /// Expands every ancestor of `row` so that it becomes visible.
    pub fn expand_to(&mut self, row: RowRef) -> Result<(), DisplayError> {
        let mut current = self.row(row)?.parent;
        while let Some(parent) = current {
            let r = self.rows.get_mut(parent).ok_or(DisplayError::StaleRow(parent))?;
            r.flags.insert(RowFlags::EXPANDED);
            current = r.parent;
        }
        Ok(())
    }

    pub fn selected(&self) -> Option<RowRef> {
        self.selected
    }

    /// Single selection. `None` clears it.
    pub fn select(&mut self, row: Option<RowRef>) -> Result<(), DisplayError> {
        if let Some(row) = row {
            self.row(row)?;
        }

        if let Some(old) = self.selected.take() {
            if let Some(r) = self.rows.get_mut(old) {
                r.flags.remove(RowFlags::SELECTED);
            }
        }

        if let Some(row) = row {
            self.rows[row].flags.insert(RowFlags::SELECTED);
            self.selected = Some(row);
        }

        Ok(())
    }

    pub fn scroll_target(&self) -> Option<RowRef> {
        self.scroll_target
    }

    /// Records the row the viewer should bring into view.
    pub fn scroll_to(&mut self, row: RowRef) -> Result<(), DisplayError> {
        self.row(row)?;
        self.scroll_target = Some(row);
        Ok(())
    }

    pub fn editing(&self) -> Option<RowRef> {
        self.editing
    }

    pub fn set_editing(&mut self, row: Option<RowRef>) -> Result<(), DisplayError> {
        if let Some(row) = row {
            self.row(row)?;
        }

        if let Some(old) = self.editing.take() {
            if let Some(r) = self.rows.get_mut(old) {
                r.flags.remove(RowFlags::EDITING);
            }
        }

        if let Some(row) = row {
            self.rows[row].flags.insert(RowFlags::EDITING);
            self.editing = Some(row);
        }

        Ok(())
    }
}
