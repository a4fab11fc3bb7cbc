//! Keyboard shortcut table.
//!
//! A shortcut is plain data: a modifier mask, a keysym and the action to
//! run. The compiled-in table can be extended or overridden from the
//! `[bindings]` section of the config file.

use log::warn;
use x11rb::protocol::xproto::{Keysym, ModMask};

use crate::config::Config;
use crate::workspace::WORKSPACE_COUNT;

pub const XK_RETURN: Keysym = 0xff0d;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    /// Ask the window under the key grab to close via `WM_DELETE_WINDOW`.
    CloseFocused,
    Spawn(Vec<String>),
    ToggleSplit,
    AdjustFactor(f64),
    /// Zero-based workspace index.
    SwitchWorkspace(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shortcut {
    pub modifiers: u16,
    pub keysym: Keysym,
    pub action: Action,
}

impl Shortcut {
    pub fn new(modifiers: u16, keysym: Keysym, action: Action) -> Self {
        Self {
            modifiers,
            keysym,
            action,
        }
    }

    /// True when `keysym` is ours and any of our modifiers is held. Extra
    /// modifiers in `state` do not prevent a match.
    pub fn matches(&self, state: u16, keysym: Keysym) -> bool {
        self.keysym == keysym && state & self.modifiers != 0
    }
}

/// Keysym of a Latin-1 character key.
fn ascii(ch: char) -> Keysym {
    u32::from(ch)
}

/// The compiled-in bindings.
pub fn defaults(config: &Config) -> Vec<Shortcut> {
    let m = config.mod_mask();
    let shift = u16::from(ModMask::SHIFT);
    let step = config.resize_step;

    let mut table = vec![
        Shortcut::new(m, ascii('c'), Action::Quit),
        Shortcut::new(m | shift, ascii('q'), Action::CloseFocused),
        Shortcut::new(m, XK_RETURN, Action::Spawn(config.terminal.clone())),
        Shortcut::new(m, ascii('d'), Action::Spawn(config.launcher.clone())),
        Shortcut::new(m, ascii('s'), Action::ToggleSplit),
        Shortcut::new(m, ascii('l'), Action::AdjustFactor(step)),
        Shortcut::new(m, ascii('h'), Action::AdjustFactor(-step)),
    ];

    // Mod+1 .. Mod+9 then Mod+0 for the tenth workspace.
    for (index, key) in "1234567890".chars().take(WORKSPACE_COUNT).enumerate() {
        table.push(Shortcut::new(m, ascii(key), Action::SwitchWorkspace(index)));
    }
    table
}

/// Defaults plus the config file's `[bindings]`. A binding on the same
/// modifiers and key as a default replaces it.
pub fn table(config: &Config) -> Vec<Shortcut> {
    let mut table = defaults(config);

    for (keys, command) in &config.bindings {
        let Some((modifiers, keysym)) = parse_keybind(keys, config.mod_mask()) else {
            warn!("Ignoring binding {keys:?}: unknown key");
            continue;
        };
        let Some(action) = parse_action(command, config.resize_step) else {
            warn!("Ignoring binding {keys:?}: unknown action {command:?}");
            continue;
        };

        let shortcut = Shortcut::new(modifiers, keysym, action);
        match table
            .iter_mut()
            .find(|s| s.modifiers == modifiers && s.keysym == keysym)
        {
            Some(existing) => *existing = shortcut,
            None => table.push(shortcut),
        }
    }
    table
}

pub fn parse_action(cmd: &str, resize_step: f64) -> Option<Action> {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    let (&name, args) = parts.split_first()?;

    match name {
        "Quit" => Some(Action::Quit),
        "Close" | "KillFocused" => Some(Action::CloseFocused),
        "Spawn" if !args.is_empty() => Some(Action::Spawn(
            args.iter().map(|s| s.to_string()).collect(),
        )),
        "ToggleSplit" => Some(Action::ToggleSplit),
        "Grow" => Some(Action::AdjustFactor(resize_step)),
        "Shrink" => Some(Action::AdjustFactor(-resize_step)),
        // No finer than the step, which is also the smallest split share.
        "Adjust" => args
            .first()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && d.abs() >= resize_step && d.abs() < 0.5)
            .map(Action::AdjustFactor),
        // One-based in the config file.
        "Workspace" => args
            .first()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| (1..=WORKSPACE_COUNT).contains(n))
            .map(|n| Action::SwitchWorkspace(n - 1)),
        _ => None,
    }
}

pub fn keysym_from_name(name: &str) -> Option<Keysym> {
    let sym = match name {
        "Return" => XK_RETURN,
        "space" | "Space" => 0x0020,
        "BackSpace" => 0xff08,
        "Tab" => 0xff09,
        "Escape" => 0xff1b,
        "Delete" => 0xffff,
        "Home" => 0xff50,
        "Left" => 0xff51,
        "Up" => 0xff52,
        "Right" => 0xff53,
        "Down" => 0xff54,
        "End" => 0xff57,
        "minus" => 0x002d,
        "equal" => 0x003d,
        "comma" => 0x002c,
        "period" => 0x002e,
        "slash" => 0x002f,
        "semicolon" => 0x003b,
        "apostrophe" => 0x0027,
        "grave" => 0x0060,
        "bracketleft" => 0x005b,
        "bracketright" => 0x005d,
        "backslash" => 0x005c,
        f if f.len() > 1 && f.starts_with('F') => {
            let n: u32 = f[1..].parse().ok()?;
            if !(1..=12).contains(&n) {
                return None;
            }
            0xffbe + n - 1
        }
        c => {
            let mut chars = c.chars();
            let ch = chars.next()?;
            if chars.next().is_some() || !ch.is_ascii_graphic() {
                return None;
            }
            // Bindings resolve against unshifted symbols.
            ascii(ch.to_ascii_lowercase())
        }
    };
    Some(sym)
}

/// Parse `"Mod+Shift+q"` into a modifier mask and keysym.
pub fn parse_keybind(bind: &str, mod_mask: u16) -> Option<(u16, Keysym)> {
    let mut mask = 0u16;
    let mut keysym = None;

    for part in bind.split('+') {
        match part {
            "Mod" => mask |= mod_mask,
            "Shift" => mask |= u16::from(ModMask::SHIFT),
            "Control" | "Ctrl" => mask |= u16::from(ModMask::CONTROL),
            "Alt" => mask |= u16::from(ModMask::M1),
            "Super" => mask |= u16::from(ModMask::M4),
            key => keysym = Some(keysym_from_name(key)?),
        }
    }

    if mask == 0 {
        // Without a modifier the inclusive match could never fire.
        return None;
    }
    keysym.map(|sym| (mask, sym))
}
