//! Keycode <-> keysym resolution against the server's core keyboard map.

use x11rb::protocol::xproto::{Keycode, Keysym};

use crate::error::{Error, Result};

/// The "no symbol" keysym.
pub const NO_SYMBOL: Keysym = 0;

/// Snapshot of the keyboard mapping taken at startup.
///
/// Only the first column of every keycode (level 0, group 0) takes part in
/// lookups, so a binding on `c` is found on the key that produces `c`
/// without any modifiers held.
#[derive(Debug, Clone)]
pub struct Keymap {
    min_keycode: Keycode,
    keysyms_per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    pub fn new(min_keycode: Keycode, keysyms_per_keycode: u8, keysyms: Vec<Keysym>) -> Self {
        Self {
            min_keycode,
            keysyms_per_keycode: usize::from(keysyms_per_keycode),
            keysyms,
        }
    }

    fn max_keycode(&self) -> Option<Keycode> {
        if self.keysyms_per_keycode == 0 {
            return None;
        }
        let count = self.keysyms.len() / self.keysyms_per_keycode;
        if count == 0 {
            return None;
        }
        let max = usize::from(self.min_keycode) + count - 1;
        Some(Keycode::try_from(max).unwrap_or(Keycode::MAX))
    }

    /// The level-0 keysym of `keycode`, or [`NO_SYMBOL`].
    pub fn keysym_of(&self, keycode: Keycode) -> Keysym {
        if keycode < self.min_keycode || self.keysyms_per_keycode == 0 {
            return NO_SYMBOL;
        }
        let start = usize::from(keycode - self.min_keycode) * self.keysyms_per_keycode;
        self.keysyms.get(start).copied().unwrap_or(NO_SYMBOL)
    }

    /// Every keycode whose level-0 symbol is `keysym`, in ascending order.
    pub fn keycodes_for(&self, keysym: Keysym) -> Result<Vec<Keycode>> {
        let Some(max) = self.max_keycode() else {
            return Err(Error::UnknownKeysym(keysym));
        };
        let codes: Vec<Keycode> = (self.min_keycode..=max)
            .filter(|&code| keysym != NO_SYMBOL && self.keysym_of(code) == keysym)
            .collect();

        if codes.is_empty() {
            Err(Error::UnknownKeysym(keysym))
        } else {
            Ok(codes)
        }
    }
}
