use std::collections::HashMap;
use winit::keyboard::KeyCode;

use crate::window::WindowSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    RequestClose,
}

/// Maps key presses to actions on the window.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    table: HashMap<KeyCode, KeyAction>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn bind(&mut self, key: KeyCode, action: KeyAction) {
        self.table.insert(key, action);
    }

    pub fn action_for(&self, key: KeyCode) -> Option<KeyAction> {
        self.table.get(&key).copied()
    }

    pub fn apply<W: WindowSurface + ?Sized>(&self, pressed: &[KeyCode], window: &mut W) {
        for key in pressed {
            match self.action_for(*key) {
                Some(KeyAction::RequestClose) => {
                    log::info!("{:?} pressed, closing", key);
                    window.set_should_close(true);
                }
                None => {}
            }
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut bindings = Self::empty();
        bindings.bind(KeyCode::Escape, KeyAction::RequestClose);
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[derive(Default)]
    struct FlagWindow {
        close: bool,
    }

    impl WindowSurface for FlagWindow {
        fn poll_events(&mut self) {}

        fn take_key_presses(&mut self) -> Vec<KeyCode> {
            Vec::new()
        }

        fn should_close(&self) -> bool {
            self.close
        }

        fn set_should_close(&mut self, value: bool) {
            self.close = value;
        }

        fn size(&self) -> (u32, u32) {
            (1280, 720)
        }

        fn swap_buffers(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_escape_requests_close() {
        let bindings = KeyBindings::default();
        let mut window = FlagWindow::default();
        bindings.apply(&[KeyCode::Escape], &mut window);
        assert!(window.should_close());
    }

    #[test]
    fn test_unbound_keys_do_nothing() {
        let bindings = KeyBindings::default();
        let mut window = FlagWindow::default();
        bindings.apply(&[KeyCode::KeyW, KeyCode::Space], &mut window);
        assert!(!window.should_close());
    }

    #[test]
    fn test_empty_table() {
        let bindings = KeyBindings::empty();
        assert_eq!(bindings.action_for(KeyCode::Escape), None);
        let mut window = FlagWindow::default();
        bindings.apply(&[KeyCode::Escape], &mut window);
        assert!(!window.should_close());
    }
}
