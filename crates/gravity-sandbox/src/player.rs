//! Player character: walking relative to the local up, jumping and flight.
//!
//! Movement follows a Quake-style ground/air acceleration model. The capsule
//! carries its own gravity frame: "up" is the body's rotated +Y axis, which
//! [`OrientationBlend`] turns toward the gravity world's effective up. Player
//! input is ignored while a transition is running.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use avian3d::prelude::*;
use bevy::prelude::*;
use leafwing_input_manager::prelude::*;

use crate::{
    input::{PlayerAction, default_player_input_map},
    level::LevelLoaded,
    physics::{
        BOUNDS_RADIUS, GRAVITY, GameLayer, GravityActor, GravitySimulation, GravitySystems,
        ManualGravity, OrientationBlend,
    },
};

/// Turn rate of the player's up-axis, in radians per second.
const PLAYER_BLEND_RATE: f32 = 3.0;

// Used as padding by camera pitching (up/down) to avoid spooky math problems.
const ANGLE_EPSILON: f32 = 0.001_953_125;

const SLIGHT_SCALE_DOWN: f32 = 0.9375;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DidFixedTimestepRunThisFrame>()
            .add_systems(Startup, spawn_player)
            .add_systems(PreUpdate, clear_fixed_timestep_flag)
            .add_systems(
                FixedUpdate,
                (set_fixed_time_step_flag, player_move)
                    .chain()
                    .after(GravitySystems::Step)
                    .before(GravitySystems::Apply),
            )
            .add_systems(
                RunFixedMainLoop,
                (
                    (player_input, toggle_flight)
                        .chain()
                        .in_set(RunFixedMainLoopSystems::BeforeFixedMainLoop),
                    (
                        clear_input.run_if(did_fixed_timestep_run_this_frame),
                        respawn_player,
                    )
                        .chain()
                        .in_set(RunFixedMainLoopSystems::AfterFixedMainLoop),
                ),
            );
    }
}

#[derive(Resource, Default)]
pub struct DidFixedTimestepRunThisFrame(bool);

/// Marker component for the player's physics body.
#[derive(Component)]
pub struct Player;

/// Input accumulated between fixed steps.
#[derive(Component, Default)]
pub struct PlayerInput {
    pub sprint: bool,
    pub jump: bool,
    pub descend: bool,
    pub pitch: f32,
    pub yaw: f32,
    pub movement: Vec3,
}

/// Flight state, read by the camera to pick its framing.
#[derive(Component, Default, Clone, Copy, Debug)]
pub struct FlightStatus {
    pub flying: bool,
    /// Current speed in m/s.
    pub speed: f32,
}

/// Character controller tuning and look state.
#[derive(Component)]
pub struct PlayerController {
    pub radius: f32,
    pub height: f32,
    /// If the distance to the ground is less than this value, the player is considered grounded.
    pub grounded_distance: f32,
    pub walk_speed: f32,
    pub run_speed: f32,
    pub forward_speed: f32,
    pub side_speed: f32,
    pub air_speed_cap: f32,
    pub air_acceleration: f32,
    pub max_air_speed: f32,
    pub acceleration: f32,
    pub friction: f32,
    /// If the dot product (alignment) of the normal of the surface and the upward vector,
    /// which is a value from [-1, 1], is greater than this value, ground movement is applied.
    pub traction_normal_cutoff: f32,
    pub friction_speed_cutoff: f32,
    pub stop_speed: f32,
    pub jump_speed: f32,
    pub fly_speed: f32,
    pub fly_sprint_speed: f32,
    /// How quickly flight velocity approaches the wished velocity, per second.
    pub fly_response: f32,
    pub sensitivity: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub ground_tick: u8,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            radius: 0.5,
            height: 1.8,
            grounded_distance: 0.5,
            walk_speed: 9.0,
            run_speed: 14.0,
            forward_speed: 30.0,
            side_speed: 30.0,
            air_speed_cap: 2.0,
            air_acceleration: 20.0,
            max_air_speed: 15.0,
            acceleration: 10.0,
            friction: 10.0,
            traction_normal_cutoff: 0.7,
            friction_speed_cutoff: 0.1,
            stop_speed: 1.0,
            jump_speed: 5.0,
            fly_speed: 10.0,
            fly_sprint_speed: 25.0,
            fly_response: 6.0,
            sensitivity: 0.002,
            pitch: 0.0,
            yaw: 0.0,
            ground_tick: 0,
        }
    }
}

impl PlayerController {
    /// Rotation of the view: the body frame, turned by yaw and then pitch.
    pub fn view_rotation(&self, body_rotation: Quat) -> Quat {
        body_rotation * Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }
}

/// Movement frame of the body: right, up and forward axes.
fn body_frame(rotation: Quat, yaw: f32) -> Mat3 {
    let heading = rotation * Quat::from_rotation_y(yaw);
    Mat3::from_cols(heading * Vec3::X, heading * Vec3::Y, heading * Vec3::NEG_Z)
}

/// Spawn the player at the origin; [`LevelLoaded`] moves it to the level's spawn point.
fn spawn_player(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let controller = PlayerController::default();
    let segment = controller.height - 2.0 * controller.radius;
    commands.spawn((
        Name::new("Player"),
        Player,
        default_player_input_map(),
        GravityActor,
        ManualGravity,
        OrientationBlend::new(PLAYER_BLEND_RATE),
        FlightStatus::default(),
        PlayerInput::default(),
        (
            RigidBody::Dynamic,
            Collider::capsule(controller.radius, segment),
            LockedAxes::ROTATION_LOCKED,
            TransformInterpolation,
            Friction::ZERO.with_combine_rule(CoefficientCombine::Min),
            GameLayer::actor(),
        ),
        Mesh3d(meshes.add(Capsule3d::new(controller.radius, segment))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.9, 0.9, 0.95),
            ..default()
        })),
        Transform::from_translation(Vec3::Y * 2.0),
        controller,
    ));
}

fn clear_fixed_timestep_flag(
    mut did_fixed_timestep_run_this_frame: ResMut<DidFixedTimestepRunThisFrame>,
) {
    did_fixed_timestep_run_this_frame.0 = false;
}

fn set_fixed_time_step_flag(
    mut did_fixed_timestep_run_this_frame: ResMut<DidFixedTimestepRunThisFrame>,
) {
    did_fixed_timestep_run_this_frame.0 = true;
}

fn did_fixed_timestep_run_this_frame(
    did_fixed_timestep_run_this_frame: Res<DidFixedTimestepRunThisFrame>,
) -> bool {
    did_fixed_timestep_run_this_frame.0
}

fn clear_input(mut query: Query<&mut PlayerInput>) {
    for mut input in &mut query {
        input.movement = Vec3::ZERO;
        input.sprint = false;
        input.jump = false;
        input.descend = false;
    }
}

fn player_input(
    mut query: Query<(
        &ActionState<PlayerAction>,
        &mut PlayerController,
        &mut PlayerInput,
    )>,
) {
    for (action_state, mut controller, mut input) in &mut query {
        let mouse_delta = action_state.axis_pair(&PlayerAction::Look) * controller.sensitivity;

        input.pitch = (input.pitch - mouse_delta.y)
            .clamp(-FRAC_PI_2 + ANGLE_EPSILON, FRAC_PI_2 - ANGLE_EPSILON);
        input.yaw -= mouse_delta.x;
        if input.yaw.abs() > PI {
            input.yaw = input.yaw.rem_euclid(TAU);
        }
        controller.pitch = input.pitch;
        controller.yaw = input.yaw;

        let move_input = action_state.clamped_axis_pair(&PlayerAction::Move);
        input.movement = Vec3::new(move_input.x, 0.0, move_input.y);
        input.sprint |= action_state.pressed(&PlayerAction::Sprint);
        input.jump |= action_state.pressed(&PlayerAction::Jump);
        input.descend |= action_state.pressed(&PlayerAction::Descend);
    }
}

fn toggle_flight(mut query: Query<(&ActionState<PlayerAction>, &mut FlightStatus)>) {
    for (action_state, mut flight) in &mut query {
        if action_state.just_pressed(&PlayerAction::ToggleFlight) {
            flight.flying = !flight.flying;
            tracing::info!("Flight {}", if flight.flying { "on" } else { "off" });
        }
    }
}

/// Move the player relative to its own up.
#[allow(clippy::too_many_lines, clippy::type_complexity)]
fn player_move(
    time: Res<Time<Fixed>>,
    spatial_query_pipeline: Res<SpatialQueryPipeline>,
    sim: Res<GravitySimulation>,
    mut query: Query<
        (
            Entity,
            &PlayerInput,
            &mut PlayerController,
            &mut FlightStatus,
            &Collider,
            &Position,
            &Rotation,
            &mut LinearVelocity,
        ),
        With<Player>,
    >,
) {
    let dt = time.delta_secs();

    for (entity, input, mut controller, mut flight, collider, position, rotation, mut velocity) in
        &mut query
    {
        let gravity_dir = sim.effective_down(entity).unwrap_or(Vec3::NEG_Y);
        let frame = body_frame(rotation.0, controller.yaw);
        let local_up = frame.y_axis;

        // Input is locked while the body turns to a new up.
        let locked = sim.is_in_transition(entity);
        let movement = if locked { Vec3::ZERO } else { input.movement };
        let jump = input.jump && !locked;

        if flight.flying {
            let vertical = get_axis(jump, input.descend && !locked);
            let max_speed = if input.sprint {
                controller.fly_sprint_speed
            } else {
                controller.fly_speed
            };
            let wish = (frame * Vec3::new(movement.x, vertical, movement.z))
                .clamp_length_max(1.0)
                * max_speed;
            let blend = (controller.fly_response * dt).min(1.0);
            velocity.0 = velocity.0.lerp(wish, blend);
            flight.speed = velocity.0.length();
            controller.ground_tick = 0;
            continue;
        }

        let speeds = Vec3::new(controller.side_speed, 0.0, controller.forward_speed);
        let move_to_world = Mat3::from_cols(frame.x_axis, local_up, frame.z_axis);

        let mut wish_direction = move_to_world * (movement * speeds);
        let mut wish_speed = wish_direction.length();
        if wish_speed > f32::EPSILON {
            // Avoid division by zero.
            wish_direction /= wish_speed; // Effectively normalize, avoid length computation twice.
        }
        let max_speed = if input.sprint {
            controller.run_speed
        } else {
            controller.walk_speed
        };
        wish_speed = f32::min(wish_speed, max_speed);

        let down_dir = Dir3::new(-local_up).unwrap_or(Dir3::NEG_Y);

        // Shape cast downwards to find ground.
        // Better than a ray cast as it handles when you are near the edge of a surface.
        let filter = SpatialQueryFilter::from_mask([GameLayer::Ground, GameLayer::Actor])
            .with_excluded_entities([entity]);
        if let Some(hit) = spatial_query_pipeline.cast_shape(
            // Consider when the controller is right up against a wall.
            // We do not want the shape cast to detect it,
            // so provide a slightly smaller collider laterally.
            &scaled_collider_laterally(collider, SLIGHT_SCALE_DOWN),
            position.0,
            rotation.0,
            down_dir,
            &ShapeCastConfig::from_max_distance(controller.grounded_distance),
            &filter,
        ) {
            let has_traction = Vec3::dot(hit.normal1, local_up) > controller.traction_normal_cutoff;

            // Only apply friction after at least one tick, allows b-hopping without losing speed.
            if controller.ground_tick >= 1 && has_traction {
                let vertical_component = velocity.0.dot(local_up) * local_up;
                let lateral_velocity = velocity.0 - vertical_component;
                let lateral_speed = lateral_velocity.length();

                if lateral_speed > controller.friction_speed_cutoff {
                    let control = f32::max(lateral_speed, controller.stop_speed);
                    let drop = control * controller.friction * dt;
                    let new_speed = f32::max((lateral_speed - drop) / lateral_speed, 0.0);
                    velocity.0 = vertical_component
                        + lateral_velocity.normalize() * lateral_speed * new_speed;
                } else {
                    velocity.0 = vertical_component;
                }
                if controller.ground_tick == 1 {
                    // Snap to ground.
                    velocity.0 -= local_up * hit.distance;
                }
            }

            let mut add = acceleration(
                wish_direction,
                wish_speed,
                controller.acceleration,
                velocity.0,
                dt,
            );
            if !has_traction {
                add += gravity_dir * GRAVITY * dt;
            }
            velocity.0 += add;

            if has_traction {
                let linear_velocity = velocity.0;
                velocity.0 -= Vec3::dot(linear_velocity, hit.normal1) * hit.normal1;

                if jump {
                    velocity.0 += local_up * controller.jump_speed;
                }
            }

            controller.ground_tick = controller.ground_tick.saturating_add(1);
        } else {
            controller.ground_tick = 0;
            wish_speed = f32::min(wish_speed, controller.air_speed_cap);

            let mut add = acceleration(
                wish_direction,
                wish_speed,
                controller.air_acceleration,
                velocity.0,
                dt,
            );
            add += gravity_dir * GRAVITY * dt;
            velocity.0 += add;

            // Clamp lateral air speed.
            let vertical_component = velocity.0.dot(local_up) * local_up;
            let lateral_velocity = velocity.0 - vertical_component;
            let air_speed = lateral_velocity.length();
            if air_speed > controller.max_air_speed {
                let ratio = controller.max_air_speed / air_speed;
                velocity.0 = vertical_component + lateral_velocity * ratio;
            }
        }

        flight.speed = velocity.0.length();
    }
}

/// Return a collider that is scaled laterally (perpendicular to local up) but not vertically.
fn scaled_collider_laterally(collider: &Collider, scale: f32) -> Collider {
    if let Some(capsule) = collider.shape().as_capsule() {
        Collider::capsule(capsule.radius * scale, capsule.segment.length())
    } else {
        collider.clone()
    }
}

fn acceleration(
    wish_direction: Vec3,
    wish_speed: f32,
    acceleration: f32,
    velocity: Vec3,
    dt: f32,
) -> Vec3 {
    let velocity_projection = Vec3::dot(velocity, wish_direction);
    let add_speed = wish_speed - velocity_projection;
    if add_speed <= 0.0 {
        return Vec3::ZERO;
    }

    let acceleration_speed = f32::min(acceleration * wish_speed * dt, add_speed);
    wish_direction * acceleration_speed
}

fn get_axis(positive: bool, negative: bool) -> f32 {
    let pressed = |held: bool| if held { 1.0 } else { 0.0 };
    pressed(positive) - pressed(negative)
}

/// Put the player back on the spawn point on level load or after falling out.
#[allow(clippy::type_complexity)]
fn respawn_player(
    mut loaded: MessageReader<LevelLoaded>,
    mut spawn_point: Local<Vec3>,
    mut sim: ResMut<GravitySimulation>,
    mut query: Query<
        (
            Entity,
            &mut Position,
            &mut Rotation,
            &mut LinearVelocity,
            &mut OrientationBlend,
        ),
        With<Player>,
    >,
) {
    let level_loaded = loaded.read().last().map(|message| message.spawn);
    if let Some(spawn) = level_loaded {
        *spawn_point = spawn;
    }

    for (entity, mut position, mut rotation, mut velocity, mut blend) in &mut query {
        let fell_out = position.0.length() > BOUNDS_RADIUS;
        if level_loaded.is_none() && !fell_out {
            continue;
        }
        if fell_out {
            tracing::info!("Player left the level bounds, respawning");
        }

        position.0 = *spawn_point;
        rotation.0 = Quat::IDENTITY;
        velocity.0 = Vec3::ZERO;
        let rate = blend.rate;
        *blend = OrientationBlend::new(rate);
        sim.respawn_actor(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_frame_identity() {
        let frame = body_frame(Quat::IDENTITY, 0.0);
        assert!(frame.x_axis.abs_diff_eq(Vec3::X, 1e-6));
        assert!(frame.y_axis.abs_diff_eq(Vec3::Y, 1e-6));
        assert!(frame.z_axis.abs_diff_eq(Vec3::NEG_Z, 1e-6));
    }

    #[test]
    fn test_body_frame_follows_body_up() {
        // Standing on a +X wall: up is -X.
        let rotation = Quat::from_rotation_arc(Vec3::Y, Vec3::NEG_X);
        let frame = body_frame(rotation, 0.7);
        assert!(frame.y_axis.abs_diff_eq(Vec3::NEG_X, 1e-5));
        assert!(frame.x_axis.dot(frame.y_axis).abs() < 1e-5);
        assert!(frame.z_axis.dot(frame.y_axis).abs() < 1e-5);
    }

    #[test]
    fn test_view_rotation_pitch_looks_up() {
        let controller = PlayerController {
            pitch: FRAC_PI_2 - ANGLE_EPSILON,
            ..Default::default()
        };
        let forward = controller.view_rotation(Quat::IDENTITY) * Vec3::NEG_Z;
        assert!(forward.dot(Vec3::Y) > 0.99);
    }

    #[test]
    fn test_acceleration_caps_at_wish_speed() {
        let add = acceleration(Vec3::X, 5.0, 10.0, Vec3::X * 5.0, 0.1);
        assert_eq!(add, Vec3::ZERO);

        let add = acceleration(Vec3::X, 5.0, 10.0, Vec3::ZERO, 0.01);
        assert!((add.x - 0.5).abs() < 1e-6);

        let add = acceleration(Vec3::X, 5.0, 100.0, Vec3::X * 4.0, 1.0);
        assert!((add.x - 1.0).abs() < 1e-6);
    }
}
