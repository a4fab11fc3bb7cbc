//! Binary region tree used to tile the windows of one workspace.
//!
//! Every node lives in a fixed-size arena and refers to its neighbours by
//! slot index. A node is either a leaf carrying a window, or a split with
//! exactly two children that divides its rectangle along [`SplitAxis`].

use log::{debug, trace};
use x11rb::protocol::xproto::Window;

use crate::error::{Error, Result};

/// Index of a slot in a [`RegionTree`] arena.
pub type RegionId = usize;

/// Number of region slots preallocated for every workspace.
pub const REGION_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitAxis {
    /// Children sit side by side, `child0` on the left.
    Horizontal,
    /// Children are stacked, `child0` on top.
    Vertical,
}

impl SplitAxis {
    pub fn flipped(self) -> Self {
        match self {
            SplitAxis::Horizontal => SplitAxis::Vertical,
            SplitAxis::Vertical => SplitAxis::Horizontal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Cut the rectangle along `axis`, giving `floor(extent * factor)` pixels
    /// to the first half and the remainder to the second.
    pub fn split(self, axis: SplitAxis, factor: f64) -> (Rect, Rect) {
        match axis {
            SplitAxis::Horizontal => {
                let first = ((f64::from(self.width) * factor).floor() as u32).min(self.width);
                (
                    Rect::new(self.x, self.y, first, self.height),
                    Rect::new(
                        self.x + first as i32,
                        self.y,
                        self.width - first,
                        self.height,
                    ),
                )
            }
            SplitAxis::Vertical => {
                let first = ((f64::from(self.height) * factor).floor() as u32).min(self.height);
                (
                    Rect::new(self.x, self.y, self.width, first),
                    Rect::new(
                        self.x,
                        self.y + first as i32,
                        self.width,
                        self.height - first,
                    ),
                )
            }
        }
    }
}

/// One arena slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    /// Window shown by a leaf, `None` for splits.
    pub handle: Option<Window>,
    pub parent: Option<RegionId>,
    pub child0: Option<RegionId>,
    pub child1: Option<RegionId>,
    pub split: SplitAxis,
    /// Share of the split axis given to `child0`.
    pub factor: f64,
    pub exists: bool,
}

impl Region {
    const FREE: Region = Region {
        handle: None,
        parent: None,
        child0: None,
        child1: None,
        split: SplitAxis::Horizontal,
        factor: 0.5,
        exists: false,
    };

    fn leaf(handle: Window, parent: Option<RegionId>) -> Self {
        Region {
            handle: Some(handle),
            parent,
            exists: true,
            ..Region::FREE
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.exists && self.handle.is_some()
    }
}

pub struct RegionTree {
    regions: Vec<Region>,
    root: Option<RegionId>,
}

impl Default for RegionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionTree {
    pub fn new() -> Self {
        Self::with_capacity(REGION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            regions: vec![Region::FREE; capacity],
            root: None,
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> Option<RegionId> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The live region stored at `id`.
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id).filter(|r| r.exists)
    }

    /// Slot of the leaf showing `window`.
    pub fn leaf_of(&self, window: Window) -> Option<RegionId> {
        self.regions
            .iter()
            .position(|r| r.is_leaf() && r.handle == Some(window))
    }

    pub fn contains(&self, window: Window) -> bool {
        self.leaf_of(window).is_some()
    }

    /// Windows of every leaf, in arena order.
    pub fn windows(&self) -> Vec<Window> {
        self.regions
            .iter()
            .filter(|r| r.is_leaf())
            .filter_map(|r| r.handle)
            .collect()
    }

    fn free_slots(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.exists)
            .map(|(id, _)| id)
    }

    fn alloc(&mut self, region: Region) -> Result<RegionId> {
        let id = self.free_slots().next().ok_or(Error::ArenaFull)?;
        self.regions[id] = region;
        Ok(id)
    }

    fn free(&mut self, id: RegionId) {
        self.regions[id] = Region::FREE;
    }

    /// Point whichever child link of `parent` held `old` at `new`.
    fn replace_child(&mut self, parent: RegionId, old: RegionId, new: RegionId) -> Result<()> {
        let parent = &mut self.regions[parent];
        if parent.child0 == Some(old) {
            parent.child0 = Some(new);
        } else if parent.child1 == Some(old) {
            parent.child1 = Some(new);
        } else {
            return Err(Error::TreeCorrupt("parent does not link back to child"));
        }
        Ok(())
    }

    /// Insert `new` next to the leaf showing `parent_hint`, or next to the
    /// whole tree when no such leaf exists.
    ///
    /// The new window takes the `child0` half of a fresh horizontal split
    /// placed where its sibling used to be.
    pub fn add(&mut self, parent_hint: Window, new: Window) -> Result<RegionId> {
        if let Some(existing) = self.leaf_of(new) {
            debug!("Window {new:#x} already has region {existing}");
            return Ok(existing);
        }

        let Some(root) = self.root else {
            let leaf = self.alloc(Region::leaf(new, None))?;
            self.root = Some(leaf);
            trace!("Region {leaf} is the first leaf, showing {new:#x}");
            return Ok(leaf);
        };

        // Both slots are needed, fail before touching any link.
        if self.free_slots().nth(1).is_none() {
            return Err(Error::ArenaFull);
        }

        let sibling = self.leaf_of(parent_hint).unwrap_or(root);
        let grandparent = self.regions[sibling].parent;

        let split = self.alloc(Region {
            parent: grandparent,
            exists: true,
            ..Region::FREE
        })?;
        let leaf = self.alloc(Region::leaf(new, Some(split)))?;

        self.regions[split].child0 = Some(leaf);
        self.regions[split].child1 = Some(sibling);
        self.regions[sibling].parent = Some(split);

        match grandparent {
            None => self.root = Some(split),
            Some(g) => self.replace_child(g, sibling, split)?,
        }

        trace!("Region {sibling} split by {split}, new leaf {leaf} shows {new:#x}");
        Ok(leaf)
    }

    /// Delete a leaf, promoting its sibling into the place of their split.
    pub fn remove(&mut self, leaf: RegionId) -> Result<()> {
        if !self.region(leaf).is_some_and(Region::is_leaf) {
            return Err(Error::TreeCorrupt("removed region is not a leaf"));
        }

        let Some(split) = self.regions[leaf].parent else {
            if self.root != Some(leaf) {
                return Err(Error::TreeCorrupt("orphaned leaf"));
            }
            self.free(leaf);
            self.root = None;
            return Ok(());
        };

        let sibling = {
            let s = &self.regions[split];
            if s.child0 == Some(leaf) {
                s.child1
            } else if s.child1 == Some(leaf) {
                s.child0
            } else {
                None
            }
        }
        .ok_or(Error::TreeCorrupt("split does not link back to leaf"))?;

        let grandparent = self.regions[split].parent;
        match grandparent {
            None => self.root = Some(sibling),
            Some(g) => self.replace_child(g, split, sibling)?,
        }
        self.regions[sibling].parent = grandparent;

        self.free(leaf);
        self.free(split);
        Ok(())
    }

    fn parent_split(&self, leaf: RegionId) -> Option<RegionId> {
        self.region(leaf).and_then(|r| r.parent)
    }

    /// Flip the axis of the split holding `leaf`. No-op for a lone root leaf.
    pub fn toggle_split(&mut self, leaf: RegionId) {
        if let Some(split) = self.parent_split(leaf) {
            let region = &mut self.regions[split];
            region.split = region.split.flipped();
        }
    }

    /// Move the divider of the split holding `leaf` by `delta`, keeping the
    /// factor at least `|delta|` away from either edge.
    pub fn adjust_factor(&mut self, leaf: RegionId, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        if let Some(split) = self.parent_split(leaf) {
            let bound = delta.abs().min(0.5);
            let region = &mut self.regions[split];
            region.factor = (region.factor + delta).clamp(bound, 1.0 - bound);
        }
    }

    /// Rectangle of every leaf when the whole tree covers `area`.
    pub fn layout(&self, area: Rect) -> Vec<(Window, Rect)> {
        let mut placed = Vec::new();
        if let Some(root) = self.root {
            self.place(root, area, &mut placed);
        }
        placed
    }

    fn place(&self, id: RegionId, area: Rect, placed: &mut Vec<(Window, Rect)>) {
        let region = &self.regions[id];
        if let Some(window) = region.handle {
            placed.push((window, area));
            return;
        }
        let (first, second) = area.split(region.split, region.factor);
        if let Some(child) = region.child0 {
            self.place(child, first, placed);
        }
        if let Some(child) = region.child1 {
            self.place(child, second, placed);
        }
    }
}
