use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Camera or scene change requested by a key press
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraAction {
    MoveForward(f32),
    MoveSide(f32),
    /// Degrees
    Rotate { pitch: f32, yaw: f32 },
    AdjustFov(f32),
    AdjustFrustumFov(f32),
    Quit,
}

/// Maps keyboard input onto fly-camera actions with fixed per-press deltas
#[derive(Debug, Clone, Copy)]
pub struct FlyCameraController {
    pub move_delta: f32,
    pub rotate_delta: f32,
    pub fov_delta: f32,
}

impl FlyCameraController {
    pub fn new(move_delta: f32, rotate_delta: f32, fov_delta: f32) -> Self {
        Self {
            move_delta,
            rotate_delta,
            fov_delta,
        }
    }

    /// Key presses and repeats map to actions, releases are ignored.
    pub fn process_keyed_events(&self, event: &KeyEvent) -> Option<CameraAction> {
        if event.state != ElementState::Pressed {
            return None;
        }
        match event.physical_key {
            PhysicalKey::Code(code) => self.action_for(code),
            PhysicalKey::Unidentified(_) => None,
        }
    }

    pub fn action_for(&self, code: KeyCode) -> Option<CameraAction> {
        let action = match code {
            KeyCode::KeyW => CameraAction::MoveForward(self.move_delta),
            KeyCode::KeyS => CameraAction::MoveForward(-self.move_delta),
            // `right` points to the screen's left for a right-handed view
            KeyCode::KeyA => CameraAction::MoveSide(self.move_delta),
            KeyCode::KeyD => CameraAction::MoveSide(-self.move_delta),
            KeyCode::ArrowUp => CameraAction::Rotate {
                pitch: -self.rotate_delta,
                yaw: 0.0,
            },
            KeyCode::ArrowDown => CameraAction::Rotate {
                pitch: self.rotate_delta,
                yaw: 0.0,
            },
            KeyCode::ArrowLeft => CameraAction::Rotate {
                pitch: 0.0,
                yaw: self.rotate_delta,
            },
            KeyCode::ArrowRight => CameraAction::Rotate {
                pitch: 0.0,
                yaw: -self.rotate_delta,
            },
            KeyCode::KeyQ => CameraAction::AdjustFov(self.fov_delta),
            KeyCode::KeyE => CameraAction::AdjustFov(-self.fov_delta),
            KeyCode::Digit1 => CameraAction::AdjustFrustumFov(self.fov_delta),
            KeyCode::Digit2 => CameraAction::AdjustFrustumFov(-self.fov_delta),
            KeyCode::Escape => CameraAction::Quit,
            _ => return None,
        };
        Some(action)
    }
}

impl Default for FlyCameraController {
    fn default() -> Self {
        Self::new(0.2, 3.0, 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let controller = FlyCameraController::default();

        assert_eq!(
            controller.action_for(KeyCode::KeyS),
            Some(CameraAction::MoveForward(-0.2))
        );
        assert_eq!(
            controller.action_for(KeyCode::KeyA),
            Some(CameraAction::MoveSide(0.2))
        );
        assert_eq!(
            controller.action_for(KeyCode::ArrowLeft),
            Some(CameraAction::Rotate {
                pitch: 0.0,
                yaw: 3.0
            })
        );
        assert_eq!(
            controller.action_for(KeyCode::Digit2),
            Some(CameraAction::AdjustFrustumFov(-0.1))
        );
        assert_eq!(controller.action_for(KeyCode::Escape), Some(CameraAction::Quit));
        assert_eq!(controller.action_for(KeyCode::KeyZ), None);
    }
}
