//! Player input actions and cursor handling.
//!
//! Gameplay actions are declared with `leafwing-input-manager` so bindings stay
//! in one place. Gameplay actions are disabled while the cursor is free.

use bevy::{
    prelude::*,
    window::{CursorGrabMode, CursorOptions, PrimaryWindow},
};
use leafwing_input_manager::{plugin::InputManagerSystem, prelude::*};

// ============================================================================
// Actions
// ============================================================================

/// Actions for the player and the debug overlay.
#[derive(Actionlike, PartialEq, Eq, Hash, Clone, Copy, Debug, Reflect)]
pub enum PlayerAction {
    /// WASD movement (forward/back/strafe).
    #[actionlike(DualAxis)]
    Move,
    /// Mouse look (yaw/pitch).
    #[actionlike(DualAxis)]
    Look,
    /// Jump on foot / climb while flying (Space).
    Jump,
    /// Sink while flying (Ctrl).
    Descend,
    /// Sprint (Shift).
    Sprint,
    /// Toggle flight (F).
    ToggleFlight,
    /// Toggle debug gizmos (G).
    ToggleGizmos,
    /// Reload the level from disk (R).
    ReloadLevel,
    /// Grab cursor (left click when ungrabbed).
    GrabCursor,
    /// Release cursor (ESC).
    ReleaseCursor,
}

/// Actions that move or turn the player.
const GAMEPLAY_ACTIONS: &[PlayerAction] = &[
    PlayerAction::Move,
    PlayerAction::Look,
    PlayerAction::Jump,
    PlayerAction::Descend,
    PlayerAction::Sprint,
    PlayerAction::ToggleFlight,
];

/// Create the default input map for player actions.
pub fn default_player_input_map() -> InputMap<PlayerAction> {
    InputMap::default()
        .with_dual_axis(PlayerAction::Move, VirtualDPad::wasd())
        .with_dual_axis(PlayerAction::Look, MouseMove::default())
        .with(PlayerAction::Jump, KeyCode::Space)
        .with(PlayerAction::Descend, KeyCode::ControlLeft)
        .with(PlayerAction::Descend, KeyCode::ControlRight)
        .with(PlayerAction::Sprint, KeyCode::ShiftLeft)
        .with(PlayerAction::Sprint, KeyCode::ShiftRight)
        .with(PlayerAction::ToggleFlight, KeyCode::KeyF)
        .with(PlayerAction::ToggleGizmos, KeyCode::KeyG)
        .with(PlayerAction::ReloadLevel, KeyCode::KeyR)
        .with(PlayerAction::GrabCursor, MouseButton::Left)
        .with(PlayerAction::ReleaseCursor, KeyCode::Escape)
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin that registers player actions and cursor focus handling.
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InputManagerPlugin::<PlayerAction>::default())
            .add_systems(
                PreUpdate,
                manage_input_focus.after(InputManagerSystem::Update),
            )
            .add_systems(Update, cursor_grab_system);
    }
}

// ============================================================================
// Cursor grab
// ============================================================================

/// Whether the cursor is captured by the window.
pub fn is_grabbed(cursor: &CursorOptions) -> bool {
    matches!(
        cursor.grab_mode,
        CursorGrabMode::Locked | CursorGrabMode::Confined
    )
}

/// Set cursor grab state, centering the cursor when grabbing.
pub fn set_cursor_grab(cursor: &mut CursorOptions, window: &mut Window, grabbed: bool) {
    if grabbed {
        // Native: Use Locked mode for true mouse capture.
        // WASM: Use Confined mode (Locked not supported in browsers).
        #[cfg(not(target_family = "wasm"))]
        {
            cursor.grab_mode = CursorGrabMode::Locked;
        }
        #[cfg(target_family = "wasm")]
        {
            cursor.grab_mode = CursorGrabMode::Confined;
        }
        cursor.visible = false;
        let center = Vec2::new(window.width() / 2.0, window.height() / 2.0);
        window.set_cursor_position(Some(center));
    } else {
        cursor.grab_mode = CursorGrabMode::None;
        cursor.visible = true;
    }
}

/// Handle cursor grab/ungrab with ESC and left-click.
fn cursor_grab_system(
    action_query: Query<&ActionState<PlayerAction>>,
    mut cursor: Single<&mut CursorOptions>,
    mut window: Single<&mut Window, With<PrimaryWindow>>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };

    if action_state.just_pressed(&PlayerAction::ReleaseCursor) {
        set_cursor_grab(&mut cursor, &mut window, false);
    } else if action_state.just_pressed(&PlayerAction::GrabCursor) && !is_grabbed(&cursor) {
        set_cursor_grab(&mut cursor, &mut window, true);
    }
}

/// Disable gameplay actions while the cursor is not grabbed.
fn manage_input_focus(
    mut action_query: Query<&mut ActionState<PlayerAction>>,
    cursor: Single<&CursorOptions>,
) {
    let grabbed = is_grabbed(&cursor);

    for mut action_state in &mut action_query {
        for action in GAMEPLAY_ACTIONS {
            if grabbed {
                action_state.enable_action(action);
            } else {
                action_state.disable_action(action);
            }
        }
        if grabbed {
            action_state.disable_action(&PlayerAction::GrabCursor);
            action_state.enable_action(&PlayerAction::ReleaseCursor);
        } else {
            action_state.enable_action(&PlayerAction::GrabCursor);
            action_state.disable_action(&PlayerAction::ReleaseCursor);
        }
    }
}
