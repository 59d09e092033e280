/// Platform-agnostic input handling for the three flight controls

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),

    // Window lost focus; key-up events may never arrive
    FocusLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    TurnLeft,
    TurnRight,
    Thrust,
}

/// Which flight controls are currently held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    pub turn_left: bool,
    pub turn_right: bool,
    pub thrust: bool,
}

impl ControlState {
    pub fn is_held(&self, control: Control) -> bool {
        match control {
            Control::TurnLeft => self.turn_left,
            Control::TurnRight => self.turn_right,
            Control::Thrust => self.thrust,
        }
    }
}

/// Key mapping configuration
#[derive(Clone, Debug)]
pub struct KeyBindings {
    pub turn_left: String,
    pub turn_right: String,
    pub thrust: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            turn_left: "a".to_string(),
            turn_right: "d".to_string(),
            thrust: "w".to_string(),
        }
    }
}

impl KeyBindings {
    /// Case-insensitive so a shifted key still maps.
    pub fn control_for(&self, key: &str) -> Option<Control> {
        if key.eq_ignore_ascii_case(&self.turn_left) {
            Some(Control::TurnLeft)
        } else if key.eq_ignore_ascii_case(&self.turn_right) {
            Some(Control::TurnRight)
        } else if key.eq_ignore_ascii_case(&self.thrust) {
            Some(Control::Thrust)
        } else {
            None
        }
    }
}

/// Control flags written by input callbacks and read once per frame.
///
/// Last write wins per control; there is no queue and no debouncing.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    controls: ControlState,
    bindings: KeyBindings,
}

impl InputState {
    pub fn new() -> Self {
        Self::with_bindings(KeyBindings::default())
    }

    pub fn with_bindings(bindings: KeyBindings) -> Self {
        Self { controls: ControlState::default(), bindings }
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn set_control(&mut self, control: Control, pressed: bool) {
        match control {
            Control::TurnLeft => self.controls.turn_left = pressed,
            Control::TurnRight => self.controls.turn_right = pressed,
            Control::Thrust => self.controls.thrust = pressed,
        }
    }

    /// Map a host key identifier to a control. Returns false for keys we don't use.
    pub fn handle_key(&mut self, key: &str, pressed: bool) -> bool {
        match self.bindings.control_for(key) {
            Some(control) => {
                self.set_control(control, pressed);
                true
            }
            None => false,
        }
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::KeyDown(key) => self.handle_key(key, true),
            InputEvent::KeyUp(key) => self.handle_key(key, false),
            InputEvent::FocusLost => {
                self.release_all();
                true
            }
        }
    }

    pub fn release_all(&mut self) {
        self.controls = ControlState::default();
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::InputEvent;
    use winit::event::{ElementState, KeyEvent};
    use winit::keyboard::{KeyCode, PhysicalKey};

    /// Physical key to the identifier the bindings use. Only letter keys are named.
    pub fn key_name(code: KeyCode) -> Option<&'static str> {
        let name = match code {
            KeyCode::KeyA => "a",
            KeyCode::KeyD => "d",
            KeyCode::KeyW => "w",
            _ => return None,
        };
        Some(name)
    }

    pub fn keyboard_event_to_input(event: &KeyEvent) -> Option<InputEvent> {
        let PhysicalKey::Code(code) = event.physical_key else {
            return None;
        };
        let name = key_name(code)?.to_string();
        Some(match event.state {
            ElementState::Pressed => InputEvent::KeyDown(name),
            ElementState::Released => InputEvent::KeyUp(name),
        })
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::InputEvent;
    use web_sys::KeyboardEvent;

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }
}
