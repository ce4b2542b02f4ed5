//! Keyboard state.
//!
//! The window backend translates key-down/key-up events into a 256-entry table
//! indexed by virtual-key code; the frame driver reads it once per frame. There is
//! no repeat handling and no timing: a held key simply stays `true`.

/// The keys the demo reacts to, with their Win32 virtual-key codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Key {
    Control = 0x11,
    Escape = 0x1b,
    Left = 0x25,
    Up = 0x26,
    Right = 0x27,
    Down = 0x28,
    A = b'A',
    D = b'D',
    Q = b'Q',
    S = b'S',
    W = b'W',
}

impl Key {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Debug)]
pub struct Keyboard {
    keys: [bool; 256],
}

impl Keyboard {
    pub fn new() -> Self {
        Self { keys: [false; 256] }
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.keys[key.code() as usize]
    }

    pub fn press(&mut self, key: Key) {
        self.keys[key.code() as usize] = true;
    }

    pub fn release(&mut self, key: Key) {
        self.keys[key.code() as usize] = false;
    }

    /// Forget every held key, e.g. when the window loses focus and the
    /// matching key-up events will never arrive.
    pub fn release_all(&mut self) {
        self.keys = [false; 256];
    }

    /// Escape, or Ctrl+Q.
    pub fn quit_requested(&self) -> bool {
        self.is_down(Key::Escape) || (self.is_down(Key::Control) && self.is_down(Key::Q))
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}
