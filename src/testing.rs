//! Recording stand-in for the X connection, plus event builders.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};

use x11rb::errors::ConnectionError;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    self, Atom, ChangeWindowAttributesAux, ConfigureRequestEvent, ConfigureWindowAux,
    CreateNotifyEvent, DestroyNotifyEvent, KeyPressEvent, Keycode, Keysym, MapRequestEvent,
    ModMask, StackMode, Window,
};

use crate::error::{Error, Result};
use crate::keymap::Keymap;
use crate::xconn::{ScreenInfo, XConn};

pub const ROOT: Window = 0x100;

pub fn screen() -> ScreenInfo {
    ScreenInfo {
        root: ROOT,
        width: 800,
        height: 600,
    }
}

/// Values of one `ConfigureWindow` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Configure {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    InternAtom(String),
    ChangeAttributes(Window),
    Configure(Window, Configure),
    Map(Window),
    Unmap(Window),
    ClientMessage(Window, Atom, [u32; 5]),
    GrabKey(u16, Keycode),
    GetInputFocus,
    OverrideRedirect(Window),
    KeyboardMapping,
    RootCursor(u16),
    Flush,
}

impl Call {
    /// Geometry-only configure, as issued when a layout is applied.
    pub fn place(window: Window, x: i32, y: i32, width: u32, height: u32) -> Self {
        Call::Configure(
            window,
            Configure {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                ..Configure::default()
            },
        )
    }
}

/// Keysyms laid out on consecutive keycodes starting at 10, one column each.
pub const TEST_KEYSYMS: [Keysym; 17] = [
    0x63, 0x71, 0xff0d, 0x64, 0x73, 0x6c, 0x68, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38,
    0x39, 0x30,
];

pub fn test_keymap() -> Keymap {
    Keymap::new(10, 1, TEST_KEYSYMS.to_vec())
}

/// Keycode producing `keysym` in [`test_keymap`].
pub fn keycode(keysym: Keysym) -> Keycode {
    let index = TEST_KEYSYMS.iter().position(|&s| s == keysym).unwrap();
    10 + index as Keycode
}

pub struct RecordingConn {
    calls: RefCell<Vec<Call>>,
    events: RefCell<VecDeque<Event>>,
    override_redirect: RefCell<HashSet<Window>>,
    failing: RefCell<HashSet<Window>>,
    focus: RefCell<Window>,
    keymap: Keymap,
}

impl Default for RecordingConn {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingConn {
    pub fn new() -> Self {
        Self::with_keymap(test_keymap())
    }

    pub fn with_keymap(keymap: Keymap) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            events: RefCell::new(VecDeque::new()),
            override_redirect: RefCell::new(HashSet::new()),
            failing: RefCell::new(HashSet::new()),
            focus: RefCell::new(0),
            keymap,
        }
    }

    pub fn push_event(&self, event: Event) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn set_override_redirect(&self, window: Window) {
        self.override_redirect.borrow_mut().insert(window);
    }

    /// Requests on `window` answer with a BadWindow error from now on.
    pub fn fail_window(&self, window: Window) {
        self.failing.borrow_mut().insert(window);
    }

    pub fn set_focus(&self, window: Window) {
        *self.focus.borrow_mut() = window;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// Last rectangle `window` was configured to.
    pub fn last_placement(&self, window: Window) -> Option<(i32, i32, u32, u32)> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            Call::Configure(w, cfg) if *w == window => {
                Some((cfg.x?, cfg.y?, cfg.width?, cfg.height?))
            }
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, window: Window) -> Result<()> {
        if self.failing.borrow().contains(&window) {
            // BadWindow
            Err(Error::Transport(3))
        } else {
            Ok(())
        }
    }
}

impl XConn for RecordingConn {
    fn intern_atom(&self, name: &str) -> Result<Atom> {
        self.record(Call::InternAtom(name.to_string()));
        Ok(0x200 + self.calls.borrow().len() as Atom)
    }

    fn change_window_attributes(
        &self,
        window: Window,
        _aux: &ChangeWindowAttributesAux,
    ) -> Result<()> {
        self.record(Call::ChangeAttributes(window));
        self.check(window)
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        self.record(Call::Configure(
            window,
            Configure {
                x: aux.x,
                y: aux.y,
                width: aux.width,
                height: aux.height,
                border_width: aux.border_width,
                sibling: aux.sibling,
                stack_mode: aux.stack_mode.map(u32::from),
            },
        ));
        self.check(window)
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.record(Call::Map(window));
        self.check(window)
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.record(Call::Unmap(window));
        self.check(window)
    }

    fn send_client_message(&self, window: Window, type_: Atom, data: [u32; 5]) -> Result<()> {
        self.record(Call::ClientMessage(window, type_, data));
        self.check(window)
    }

    fn grab_key(&self, _root: Window, modifiers: ModMask, keycode: Keycode) -> Result<()> {
        self.record(Call::GrabKey(u16::from(modifiers), keycode));
        Ok(())
    }

    fn get_input_focus(&self) -> Result<Window> {
        self.record(Call::GetInputFocus);
        Ok(*self.focus.borrow())
    }

    fn override_redirect(&self, window: Window) -> Result<bool> {
        self.record(Call::OverrideRedirect(window));
        self.check(window)?;
        Ok(self.override_redirect.borrow().contains(&window))
    }

    fn keyboard_mapping(&self) -> Result<Keymap> {
        self.record(Call::KeyboardMapping);
        Ok(self.keymap.clone())
    }

    fn define_root_cursor(&self, root: Window, glyph: u16) -> Result<()> {
        self.record(Call::RootCursor(glyph));
        self.check(root)
    }

    fn wait_for_event(&self) -> Result<Event> {
        self.events
            .borrow_mut()
            .pop_front()
            .ok_or(Error::Connection(ConnectionError::UnknownError))
    }

    fn flush(&self) -> Result<()> {
        self.record(Call::Flush);
        Ok(())
    }
}

pub fn create_notify(parent: Window, window: Window) -> Event {
    Event::CreateNotify(CreateNotifyEvent {
        response_type: xproto::CREATE_NOTIFY_EVENT,
        sequence: 0,
        parent,
        window,
        x: 0,
        y: 0,
        width: 100,
        height: 100,
        border_width: 0,
        override_redirect: false,
    })
}

pub fn destroy_notify(window: Window) -> Event {
    Event::DestroyNotify(DestroyNotifyEvent {
        response_type: xproto::DESTROY_NOTIFY_EVENT,
        sequence: 0,
        event: ROOT,
        window,
    })
}

pub fn map_request(window: Window) -> Event {
    Event::MapRequest(MapRequestEvent {
        response_type: xproto::MAP_REQUEST_EVENT,
        sequence: 0,
        parent: ROOT,
        window,
    })
}

/// Configure request for `window` asking for the fields set in `value_mask`.
pub fn configure_request(window: Window, value_mask: u16) -> Event {
    Event::ConfigureRequest(ConfigureRequestEvent {
        response_type: xproto::CONFIGURE_REQUEST_EVENT,
        stack_mode: StackMode::ABOVE,
        sequence: 0,
        parent: ROOT,
        window,
        sibling: 0x42,
        x: 10,
        y: 20,
        width: 300,
        height: 200,
        border_width: 2,
        value_mask: value_mask.into(),
    })
}

/// Key press on the key producing `keysym` while `state` is held, with
/// `child` as the window under the grab.
pub fn key_press(state: u16, keysym: Keysym, child: Window) -> Event {
    Event::KeyPress(KeyPressEvent {
        response_type: xproto::KEY_PRESS_EVENT,
        detail: keycode(keysym),
        sequence: 0,
        time: 0,
        root: ROOT,
        event: ROOT,
        child,
        root_x: 0,
        root_y: 0,
        event_x: 0,
        event_y: 0,
        state: state.into(),
        same_screen: true,
    })
}
