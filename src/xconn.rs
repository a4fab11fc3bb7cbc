//! Typed facade over the X connection.
//!
//! The window manager only talks to the server through [`XConn`], so the
//! reactor can be driven by a recording connection in tests. Every
//! state-changing request is checked before returning.

use log::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    Atom, ChangeWindowAttributesAux, ClientMessageData, ClientMessageEvent, ConfigureWindowAux,
    ConnectionExt, EventMask, GrabMode, Keycode, ModMask, Window, CLIENT_MESSAGE_EVENT,
};
use x11rb::rust_connection::RustConnection;

use crate::error::{Error, Result};
use crate::keymap::Keymap;
use crate::layout::Rect;

/// Root window and pixel size of the managed screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    pub root: Window,
    pub width: u16,
    pub height: u16,
}

impl ScreenInfo {
    /// The whole screen as a layout area.
    pub fn area(&self) -> Rect {
        Rect::new(0, 0, u32::from(self.width), u32::from(self.height))
    }
}

pub trait XConn {
    fn intern_atom(&self, name: &str) -> Result<Atom>;
    fn change_window_attributes(
        &self,
        window: Window,
        aux: &ChangeWindowAttributesAux,
    ) -> Result<()>;
    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()>;
    fn map_window(&self, window: Window) -> Result<()>;
    fn unmap_window(&self, window: Window) -> Result<()>;
    /// Send a 32-bit format `ClientMessage` with no event mask.
    fn send_client_message(&self, window: Window, type_: Atom, data: [u32; 5]) -> Result<()>;
    /// Grab `keycode` with `modifiers` on `root`, both modes asynchronous.
    fn grab_key(&self, root: Window, modifiers: ModMask, keycode: Keycode) -> Result<()>;
    fn get_input_focus(&self) -> Result<Window>;
    /// Whether `window` asked to be left alone by the window manager.
    fn override_redirect(&self, window: Window) -> Result<bool>;
    fn keyboard_mapping(&self) -> Result<Keymap>;
    /// Give the root window a glyph from the X `cursor` font.
    fn define_root_cursor(&self, root: Window, glyph: u16) -> Result<()>;
    fn wait_for_event(&self) -> Result<Event>;
    fn flush(&self) -> Result<()>;

    /// Move and resize `window` to exactly `rect`.
    fn place_window(&self, window: Window, rect: Rect) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(rect.width)
            .height(rect.height);
        self.configure_window(window, &aux)
    }
}

/// Production connection backed by `x11rb`'s pure-Rust transport.
pub struct X11rbConn {
    conn: RustConnection,
}

impl X11rbConn {
    /// Connect to `$DISPLAY` and describe its default screen.
    pub fn connect() -> Result<(Self, ScreenInfo)> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let setup = conn.setup();
        info!(
            "Connected. Protocol {}.{}",
            setup.protocol_major_version, setup.protocol_minor_version
        );

        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::StartupFailed(format!("no screen {screen_num}")))?;
        let info = ScreenInfo {
            root: screen.root,
            width: screen.width_in_pixels,
            height: screen.height_in_pixels,
        };
        info!(
            "Screen {}: {}x{} px ({}x{} mm)",
            screen_num,
            info.width,
            info.height,
            screen.width_in_millimeters,
            screen.height_in_millimeters
        );

        Ok((Self { conn }, info))
    }
}

impl XConn for X11rbConn {
    fn intern_atom(&self, name: &str) -> Result<Atom> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }

    fn change_window_attributes(
        &self,
        window: Window,
        aux: &ChangeWindowAttributesAux,
    ) -> Result<()> {
        self.conn.change_window_attributes(window, aux)?.check()?;
        Ok(())
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        self.conn.configure_window(window, aux)?.check()?;
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)?.check()?;
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?.check()?;
        Ok(())
    }

    fn send_client_message(&self, window: Window, type_: Atom, data: [u32; 5]) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_,
            data: ClientMessageData::from(data),
        };
        self.conn
            .send_event(false, window, EventMask::NO_EVENT, &event)?
            .check()?;
        Ok(())
    }

    fn grab_key(&self, root: Window, modifiers: ModMask, keycode: Keycode) -> Result<()> {
        self.conn
            .grab_key(
                false,
                root,
                modifiers,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?
            .check()?;
        Ok(())
    }

    fn get_input_focus(&self) -> Result<Window> {
        Ok(self.conn.get_input_focus()?.reply()?.focus)
    }

    fn override_redirect(&self, window: Window) -> Result<bool> {
        Ok(self
            .conn
            .get_window_attributes(window)?
            .reply()?
            .override_redirect)
    }

    fn keyboard_mapping(&self) -> Result<Keymap> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let mapping = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        debug!(
            "Keyboard map: keycodes {}..={}, {} keysyms per keycode",
            min, max, mapping.keysyms_per_keycode
        );
        Ok(Keymap::new(
            min,
            mapping.keysyms_per_keycode,
            mapping.keysyms,
        ))
    }

    fn define_root_cursor(&self, root: Window, glyph: u16) -> Result<()> {
        let font = self.conn.generate_id()?;
        self.conn.open_font(font, b"cursor")?.check()?;

        let cursor = self.conn.generate_id()?;
        self.conn
            .create_glyph_cursor(
                cursor,
                font,
                font,
                glyph,
                glyph + 1,
                0,
                0,
                0,
                0xffff,
                0xffff,
                0xffff,
            )?
            .check()?;

        let aux = ChangeWindowAttributesAux::new().cursor(cursor);
        self.change_window_attributes(root, &aux)?;

        self.conn.free_cursor(cursor)?.check()?;
        self.conn.close_font(font)?.check()?;
        Ok(())
    }

    fn wait_for_event(&self) -> Result<Event> {
        Ok(self.conn.wait_for_event()?)
    }

    fn flush(&self) -> Result<()> {
        Ok(self.conn.flush()?)
    }
}
