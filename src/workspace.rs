use log::{debug, error, info, warn};
use x11rb::protocol::xproto::Window;

use crate::error::Result;
use crate::layout::{Rect, RegionTree};
use crate::xconn::XConn;

pub const WORKSPACE_COUNT: usize = 10;

/// Fixed set of independent region trees, exactly one of them shown.
pub struct Workspaces {
    trees: Vec<RegionTree>,
    current: usize,
}

impl Default for Workspaces {
    fn default() -> Self {
        Self::new(WORKSPACE_COUNT)
    }
}

impl Workspaces {
    pub fn new(count: usize) -> Self {
        Self {
            trees: (0..count.max(1)).map(|_| RegionTree::new()).collect(),
            current: 0,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut RegionTree> {
        self.trees.get_mut(index)
    }

    pub fn active(&self) -> &RegionTree {
        &self.trees[self.current]
    }

    pub fn active_mut(&mut self) -> &mut RegionTree {
        &mut self.trees[self.current]
    }

    /// Index of the workspace whose tree holds `window`.
    pub fn find(&self, window: Window) -> Option<usize> {
        self.trees.iter().position(|t| t.contains(window))
    }

    /// Hide every window of the active workspace, then show `target` and
    /// lay it out over `area`.
    ///
    /// Map and unmap failures only affect the window concerned; the switch
    /// always completes.
    pub fn switch_to<C: XConn>(&mut self, conn: &C, target: usize, area: Rect) -> Result<()> {
        if target >= self.trees.len() {
            warn!("No workspace {target}, staying on {}", self.current);
            return Ok(());
        }
        if target == self.current {
            debug!("Already on workspace {target}");
            return Ok(());
        }

        for window in self.active().windows() {
            if let Err(e) = conn.unmap_window(window) {
                error!("Failed to unmap window {window:#x}: {e}");
            }
        }

        self.current = target;

        for window in self.active().windows() {
            if let Err(e) = conn.map_window(window) {
                error!("Failed to map window {window:#x}: {e}");
            }
        }
        if !self.active().is_empty() {
            apply_layout(conn, self.active(), area);
        }

        conn.flush()?;
        info!("Switched to workspace {target}");
        Ok(())
    }
}

/// Configure every window of `tree` to its rectangle within `area`.
pub fn apply_layout<C: XConn>(conn: &C, tree: &RegionTree, area: Rect) {
    for (window, rect) in tree.layout(area) {
        if let Err(e) = conn.place_window(window, rect) {
            error!("Failed to configure window {window:#x}: {e}");
        }
    }
}
