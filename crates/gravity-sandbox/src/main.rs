//! Sandbox for multi-directional gravity zones.
//!
//! Walk or fly through a level whose zones redefine "down". Left-click grabs
//! the cursor, WASD moves, Space jumps, F toggles flight, G toggles gravity
//! gizmos and R reloads the level.

mod camera;
mod debug;
mod input;
mod launch_params;
mod level;
mod physics;
mod player;

use bevy::light::light_consts::lux;
use bevy::prelude::*;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            input::InputPlugin,
            physics::GravityPlugin,
            level::LevelPlugin,
            player::PlayerPlugin,
            camera::CameraPlugin,
            debug::DebugPlugin,
        ))
        .add_systems(Startup, setup_lighting);
    }
}

fn setup_lighting(mut commands: Commands) {
    commands.spawn((
        DirectionalLight {
            illuminance: lux::AMBIENT_DAYLIGHT,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 30.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    // Fill light from below so walls and ceiling stay readable.
    commands.spawn((
        DirectionalLight {
            illuminance: lux::OVERCAST_DAY,
            ..default()
        },
        Transform::from_xyz(-10.0, -30.0, -20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    tracing::info!("Scene setup complete - click to grab the cursor, F to fly");
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let params = launch_params::parse();

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "gravity-sandbox".to_string(),
        resolution: (1600, 900).into(),
        position: WindowPosition::Centered(MonitorSelection::Primary),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }))
    .insert_resource(Time::<Fixed>::from_hz(params.fixed_hz))
    .insert_resource(params);

    app.add_plugins(AppPlugin).run();
}
