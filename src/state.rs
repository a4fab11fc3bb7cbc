//! Window manager context and event reactor.

use log::{debug, error, info, trace, warn};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use x11rb::CURRENT_TIME;
use x11rb::NONE;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    self, Atom, ChangeWindowAttributesAux, ConfigWindow, ConfigureWindowAux, EventMask,
    KeyPressEvent, ModMask, Window,
};

use crate::error::{Error, Result};
use crate::keymap::Keymap;
use crate::shortcuts::{Action, Shortcut};
use crate::workspace::{self, Workspaces};
use crate::xconn::{ScreenInfo, XConn};

/// Left-pointer glyph in the X `cursor` font; its mask is the next glyph.
const LEFT_PTR_GLYPH: u16 = 68;

/// Core event codes fit in seven bits once the synthetic bit is masked off.
const EVENT_TABLE_SIZE: usize = 128;

type Handler<C> = fn(&mut Manager<C>, &Event) -> Result<()>;

/// Atoms interned once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atoms {
    pub wm_protocols: Atom,
    pub wm_take_focus: Atom,
    pub wm_delete_window: Atom,
    pub wm_class: Atom,
    pub wm_transient_for: Atom,
    pub net_wm_window_type: Atom,
}

impl Atoms {
    pub fn intern<C: XConn>(conn: &C) -> Result<Self> {
        let intern = |name: &str| {
            conn.intern_atom(name)
                .map_err(|e| Error::StartupFailed(format!("cannot intern atom {name}: {e}")))
        };
        let atoms = Self {
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_class: intern("WM_CLASS")?,
            wm_transient_for: intern("WM_TRANSIENT_FOR")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
        };
        debug!(
            "Interned WM_CLASS {:#x}, WM_TRANSIENT_FOR {:#x}, _NET_WM_WINDOW_TYPE {:#x}",
            atoms.wm_class, atoms.wm_transient_for, atoms.net_wm_window_type
        );
        Ok(atoms)
    }
}

pub struct Manager<C: XConn> {
    conn: C,
    screen: ScreenInfo,
    atoms: Atoms,
    keymap: Keymap,
    shortcuts: Vec<Shortcut>,
    workspaces: Workspaces,
    handlers: [Option<Handler<C>>; EVENT_TABLE_SIZE],
    running: bool,
}

impl<C: XConn> Manager<C> {
    /// Intern atoms and read the keyboard map. Nothing on the server is
    /// changed until [`Manager::init`].
    pub fn new(conn: C, screen: ScreenInfo, shortcuts: Vec<Shortcut>) -> Result<Self> {
        let atoms = Atoms::intern(&conn)?;
        let keymap = conn
            .keyboard_mapping()
            .map_err(|e| Error::StartupFailed(format!("cannot read keyboard mapping: {e}")))?;

        Ok(Self {
            conn,
            screen,
            atoms,
            keymap,
            shortcuts,
            workspaces: Workspaces::default(),
            handlers: Self::handler_table(),
            running: false,
        })
    }

    fn handler_table() -> [Option<Handler<C>>; EVENT_TABLE_SIZE] {
        let mut table: [Option<Handler<C>>; EVENT_TABLE_SIZE] = [None; EVENT_TABLE_SIZE];
        let mut set = |code: u8, handler: Handler<C>| table[usize::from(code)] = Some(handler);

        set(0, Self::on_error);
        set(xproto::CREATE_NOTIFY_EVENT, Self::on_create_notify);
        set(xproto::DESTROY_NOTIFY_EVENT, Self::on_destroy_notify);
        set(xproto::MAP_REQUEST_EVENT, Self::on_map_request);
        set(xproto::CONFIGURE_REQUEST_EVENT, Self::on_configure_request);
        set(xproto::KEY_PRESS_EVENT, Self::on_key_press);
        for code in [
            xproto::MAP_NOTIFY_EVENT,
            xproto::UNMAP_NOTIFY_EVENT,
            xproto::REPARENT_NOTIFY_EVENT,
            xproto::CONFIGURE_NOTIFY_EVENT,
            xproto::GRAVITY_NOTIFY_EVENT,
            xproto::CIRCULATE_REQUEST_EVENT,
            xproto::KEY_RELEASE_EVENT,
            xproto::FOCUS_IN_EVENT,
            xproto::FOCUS_OUT_EVENT,
        ] {
            set(code, Self::on_ignored);
        }
        table
    }

    #[cfg(test)]
    pub fn conn(&self) -> &C {
        &self.conn
    }

    #[cfg(test)]
    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    #[cfg(test)]
    pub fn workspaces(&self) -> &Workspaces {
        &self.workspaces
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Become the window manager: take substructure redirection on the root,
    /// grab every shortcut and set the root cursor.
    pub fn init(&mut self) -> Result<()> {
        let root = self.screen.root;

        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::KEY_PRESS
            | EventMask::KEY_RELEASE
            | EventMask::FOCUS_CHANGE;
        let aux = ChangeWindowAttributesAux::new().event_mask(mask);
        self.conn
            .change_window_attributes(root, &aux)
            .map_err(|e| match e {
                Error::Transport(code) => Error::StartupFailed(format!(
                    "substructure redirect refused (error {code}), is another window manager running?"
                )),
                other => other,
            })?;

        self.grab_shortcuts()?;

        self.conn
            .define_root_cursor(root, LEFT_PTR_GLYPH)
            .map_err(|e| Error::StartupFailed(format!("cannot set root cursor: {e}")))?;

        self.conn.flush()?;
        info!("Managing root window {root:#x}");
        Ok(())
    }

    fn grab_shortcuts(&self) -> Result<()> {
        // Grab again under every NumLock/CapsLock combination, the server
        // only delivers a grab when the modifiers match exactly.
        let lock_masks = [
            0,
            u16::from(ModMask::M2),
            u16::from(ModMask::LOCK),
            u16::from(ModMask::M2 | ModMask::LOCK),
        ];
        for shortcut in &self.shortcuts {
            for keycode in self.keymap.keycodes_for(shortcut.keysym)? {
                for lock in lock_masks {
                    self.conn
                        .grab_key(
                            self.screen.root,
                            ModMask::from(shortcut.modifiers | lock),
                            keycode,
                        )
                        .map_err(|e| {
                            Error::StartupFailed(format!("cannot grab keycode {keycode}: {e}"))
                        })?;
                }
                trace!(
                    "Grabbed keycode {} with modifiers {:#x} for {:?}",
                    keycode, shortcut.modifiers, shortcut.action
                );
            }
        }
        debug!("Grabbed {} shortcuts", self.shortcuts.len());
        Ok(())
    }

    /// Process events until a shortcut asks to quit.
    ///
    /// Errors caused by a single client are logged and the loop goes on;
    /// anything else ends the loop and is returned.
    pub fn run(&mut self) -> Result<()> {
        self.running = true;
        while self.running {
            let event = self.conn.wait_for_event()?;
            if let Err(e) = self.handle_event(&event) {
                if e.is_fatal() {
                    return Err(e);
                }
                error!("{e}");
            }
        }
        info!("Quit requested, leaving event loop");
        Ok(())
    }

    pub fn handle_event(&mut self, event: &Event) -> Result<()> {
        let kind = usize::from(event.raw_response_type() & 0x7f);
        match self.handlers[kind] {
            Some(handler) => handler(self, event),
            None => {
                trace!("Ignoring event type {kind}");
                Ok(())
            }
        }
    }

    fn refresh(&self) -> Result<()> {
        workspace::apply_layout(&self.conn, self.workspaces.active(), self.screen.area());
        self.conn.flush()
    }

    fn on_error(&mut self, event: &Event) -> Result<()> {
        if let Event::Error(e) = event {
            error!(
                "X error {} (sequence {}, value {:#x})",
                e.error_code, e.sequence, e.bad_value
            );
        }
        Ok(())
    }

    fn on_ignored(&mut self, event: &Event) -> Result<()> {
        trace!("Observed event type {}", event.raw_response_type() & 0x7f);
        Ok(())
    }

    fn on_create_notify(&mut self, event: &Event) -> Result<()> {
        let Event::CreateNotify(e) = event else {
            return Ok(());
        };

        match self.conn.override_redirect(e.window) {
            Ok(true) => {
                debug!("Window {:#x} is floating, not tiling it", e.window);
                return Ok(());
            }
            Ok(false) => {}
            Err(err) => {
                warn!("Cannot query window {:#x}: {err}", e.window);
                return Ok(());
            }
        }

        if let Some(index) = self.workspaces.find(e.window) {
            debug!("Window {:#x} already tiled on workspace {index}", e.window);
            return Ok(());
        }

        self.workspaces.active_mut().add(e.parent, e.window)?;
        debug!(
            "Tiled window {:#x} on workspace {}",
            e.window,
            self.workspaces.current()
        );
        self.refresh()
    }

    fn on_destroy_notify(&mut self, event: &Event) -> Result<()> {
        let Event::DestroyNotify(e) = event else {
            return Ok(());
        };

        if let Some(leaf) = self.workspaces.active().leaf_of(e.window) {
            self.workspaces.active_mut().remove(leaf)?;
            debug!("Removed window {:#x}", e.window);
            return self.refresh();
        }

        // Destroyed while its workspace was hidden.
        if let Some(index) = self.workspaces.find(e.window) {
            if let Some(tree) = self.workspaces.get_mut(index) {
                if let Some(leaf) = tree.leaf_of(e.window) {
                    tree.remove(leaf)?;
                }
            }
            debug!("Removed window {:#x} from workspace {index}", e.window);
            return Ok(());
        }

        warn!(
            "Destroyed window {:#x} was not tiled, it may have been floating",
            e.window
        );
        Ok(())
    }

    fn on_map_request(&mut self, event: &Event) -> Result<()> {
        let Event::MapRequest(e) = event else {
            return Ok(());
        };
        debug!("Map request for {:#x}", e.window);

        if let Err(err) = self.conn.map_window(e.window) {
            error!("Failed to map window {:#x}: {err}", e.window);
        }
        let data = [self.atoms.wm_take_focus, CURRENT_TIME, 0, 0, 0];
        if let Err(err) = self
            .conn
            .send_client_message(e.window, self.atoms.wm_protocols, data)
        {
            error!("Failed to send WM_TAKE_FOCUS to {:#x}: {err}", e.window);
        }
        self.conn.flush()
    }

    /// Forward the request exactly as asked, field by field in protocol
    /// bit order.
    fn on_configure_request(&mut self, event: &Event) -> Result<()> {
        let Event::ConfigureRequest(e) = event else {
            return Ok(());
        };

        let mask = u16::from(e.value_mask);
        let has = |bit: ConfigWindow| mask & u16::from(bit) != 0;

        let mut aux = ConfigureWindowAux::new();
        if has(ConfigWindow::X) {
            aux = aux.x(i32::from(e.x));
        }
        if has(ConfigWindow::Y) {
            aux = aux.y(i32::from(e.y));
        }
        if has(ConfigWindow::WIDTH) {
            aux = aux.width(u32::from(e.width));
        }
        if has(ConfigWindow::HEIGHT) {
            aux = aux.height(u32::from(e.height));
        }
        if has(ConfigWindow::BORDER_WIDTH) {
            aux = aux.border_width(u32::from(e.border_width));
        }
        if has(ConfigWindow::SIBLING) {
            aux = aux.sibling(e.sibling);
        }
        if has(ConfigWindow::STACK_MODE) {
            aux = aux.stack_mode(e.stack_mode);
        }

        debug!("Configure request for {:#x}, mask {mask:#x}", e.window);
        let result = self.conn.configure_window(e.window, &aux);
        self.conn.flush()?;
        result
    }

    fn on_key_press(&mut self, event: &Event) -> Result<()> {
        let Event::KeyPress(e) = event else {
            return Ok(());
        };

        let keysym = self.keymap.keysym_of(e.detail);
        let state = u16::from(e.state);
        let actions: Vec<Action> = self
            .shortcuts
            .iter()
            .filter(|s| s.matches(state, keysym))
            .map(|s| s.action.clone())
            .collect();

        for action in actions {
            debug!("Running {action:?}");
            if let Err(err) = self.run_action(&action, e) {
                if err.is_fatal() {
                    return Err(err);
                }
                error!("{action:?} failed: {err}");
            }
        }
        Ok(())
    }

    fn run_action(&mut self, action: &Action, event: &KeyPressEvent) -> Result<()> {
        match action {
            Action::Quit => {
                self.running = false;
                Ok(())
            }
            Action::CloseFocused => self.close_window(event.child),
            Action::Spawn(argv) => {
                spawn(argv);
                Ok(())
            }
            Action::ToggleSplit => {
                let Some(leaf) = self.workspaces.active().leaf_of(event.child) else {
                    return Ok(());
                };
                self.workspaces.active_mut().toggle_split(leaf);
                self.refresh()
            }
            Action::AdjustFactor(delta) => {
                let Some(leaf) = self.workspaces.active().leaf_of(event.child) else {
                    return Ok(());
                };
                self.workspaces.active_mut().adjust_factor(leaf, *delta);
                self.refresh()
            }
            Action::SwitchWorkspace(index) => {
                self.workspaces
                    .switch_to(&self.conn, *index, self.screen.area())
            }
        }
    }

    /// Politely ask `child` to close. Without a child under the grab, the
    /// window holding input focus is asked instead.
    fn close_window(&self, child: Window) -> Result<()> {
        let target = if child != NONE {
            child
        } else {
            self.conn.get_input_focus()?
        };
        // NONE and PointerRoot are not windows.
        if target <= 1 || target == self.screen.root {
            debug!("No window to close");
            return Ok(());
        }

        let data = [self.atoms.wm_delete_window, CURRENT_TIME, 0, 0, 0];
        self.conn
            .send_client_message(target, self.atoms.wm_protocols, data)?;
        info!("Asked window {target:#x} to close");
        self.conn.flush()
    }
}

/// Start `argv` detached from us, with stdout and stderr discarded.
fn spawn(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        warn!("Refusing to spawn an empty command");
        return;
    };

    match detached(program, args).spawn() {
        Ok(mut child) => {
            info!("Spawned {:?} (pid {})", argv, child.id());
            // Reap it whenever it exits so it never lingers as a zombie.
            thread::spawn(move || child.wait());
        }
        Err(e) => error!("Failed to spawn {:?}: {}", argv, e),
    }
}

/// Command for `program` in a process group of its own with its output
/// discarded. Signals aimed at our terminal do not reach it.
fn detached(program: &str, args: &[String]) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    command
}
