//! Third-person camera following the player.
//!
//! The camera keeps its own up vector. A gravity transition starts a timed
//! blend from the old up to the new one, and a timeout snaps it, so the view
//! turns smoothly even when the player body snaps. Framing widens while flying.

use bevy::prelude::*;
use gravity_core::orient;

use crate::{
    physics::GravityMessage,
    player::{FlightStatus, Player, PlayerController},
};

/// Camera up turn rate in radians per second.
const CAMERA_BLEND_RATE: f32 = 2.5;

/// Eye height above the player's center.
const EYE_HEIGHT: f32 = 0.6;

/// Distance behind the player while walking.
const WALK_DISTANCE: f32 = 4.0;

/// Distance behind the player while flying, plus this much per m/s of speed.
const FLY_DISTANCE: f32 = 6.0;
const FLY_DISTANCE_PER_SPEED: f32 = 0.15;
const MAX_FLY_DISTANCE: f32 = 12.0;

/// How quickly the follow distance eases toward its target, per second.
const DISTANCE_RESPONSE: f32 = 4.0;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera).add_systems(
            Update,
            (start_up_blend, follow_player).chain(),
        );
    }
}

/// A timed turn of the camera's up vector.
#[derive(Clone, Copy, Debug)]
pub struct UpBlend {
    from: Vec3,
    to: Vec3,
    elapsed: f32,
    duration: f32,
}

impl UpBlend {
    pub fn new(from: Vec3, to: Vec3) -> Self {
        let duration = from.angle_between(to) / CAMERA_BLEND_RATE;
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    /// Blend progress in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.duration <= f32::EPSILON {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Up vector at the current progress, with smoothstep easing.
    pub fn sample(&self) -> Vec3 {
        let t = self.progress();
        let eased = t * t * (3.0 - 2.0 * t);
        let arc = Quat::from_rotation_arc(self.from, self.to);
        (Quat::IDENTITY.slerp(arc, eased) * self.from).normalize()
    }
}

/// Camera state.
#[derive(Component)]
pub struct CameraRig {
    pub up: Vec3,
    pub blend: Option<UpBlend>,
    pub distance: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            up: Vec3::Y,
            blend: None,
            distance: WALK_DISTANCE,
        }
    }
}

impl CameraRig {
    /// Advance the blend and return the current up.
    fn advance(&mut self, dt: f32) -> Vec3 {
        if let Some(blend) = &mut self.blend {
            blend.elapsed += dt;
            self.up = blend.sample();
            if blend.is_finished() {
                self.blend = None;
            }
        }
        self.up
    }
}

/// Follow distance for the given flight state.
fn target_distance(flight: FlightStatus) -> f32 {
    if flight.flying {
        (FLY_DISTANCE + flight.speed * FLY_DISTANCE_PER_SPEED).min(MAX_FLY_DISTANCE)
    } else {
        WALK_DISTANCE
    }
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_3,
            ..Default::default()
        }),
        Transform::from_xyz(0.0, 3.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        CameraRig::default(),
    ));
}

/// React to gravity changes of the player.
fn start_up_blend(
    mut messages: MessageReader<GravityMessage>,
    player: Query<(), With<Player>>,
    mut rigs: Query<&mut CameraRig>,
) {
    for message in messages.read() {
        for mut rig in &mut rigs {
            match *message {
                GravityMessage::TransitionStarted { actor, new_up, .. }
                    if player.contains(actor) =>
                {
                    rig.blend = Some(UpBlend::new(rig.up, new_up));
                }
                GravityMessage::TransitionTimedOut { actor, new_up } if player.contains(actor) => {
                    rig.blend = None;
                    rig.up = new_up;
                }
                _ => {}
            }
        }
    }
}

fn follow_player(
    time: Res<Time>,
    player: Query<(&Transform, &PlayerController, &FlightStatus), (With<Player>, Without<CameraRig>)>,
    mut camera: Query<(&mut Transform, &mut CameraRig)>,
) {
    let Ok((player_transform, controller, flight)) = player.single() else {
        return;
    };
    let Ok((mut camera_transform, mut rig)) = camera.single_mut() else {
        return;
    };
    let dt = time.delta_secs();

    let up = rig.advance(dt);
    let goal = target_distance(*flight);
    let ease = (DISTANCE_RESPONSE * dt).min(1.0);
    rig.distance += (goal - rig.distance) * ease;

    // Heading comes from the body, up from the rig.
    let frame = orient::align_up(player_transform.rotation, up);
    let view = controller.view_rotation(frame);
    let eye = player_transform.translation + up * EYE_HEIGHT;

    camera_transform.translation = eye + view * Vec3::Z * rig.distance;
    camera_transform.rotation = view;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_reaches_target() {
        let mut rig = CameraRig {
            blend: Some(UpBlend::new(Vec3::Y, Vec3::X)),
            ..Default::default()
        };
        let mut steps = 0;
        while rig.blend.is_some() {
            rig.advance(1.0 / 60.0);
            steps += 1;
            assert!(steps < 600);
        }
        assert!(rig.up.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_blend_is_monotonic() {
        let blend = UpBlend::new(Vec3::Y, Vec3::NEG_X);
        let mut last = -1.0;
        for i in 0..=10 {
            let step = UpBlend {
                elapsed: blend.duration * i as f32 / 10.0,
                ..blend
            };
            let alignment = step.sample().dot(Vec3::NEG_X);
            assert!(alignment >= last - 1e-6);
            last = alignment;
        }
    }

    #[test]
    fn test_blend_handles_upside_down() {
        let blend = UpBlend {
            elapsed: 0.5,
            ..UpBlend::new(Vec3::Y, Vec3::NEG_Y)
        };
        let up = blend.sample();
        assert!(up.is_finite());
        assert!((up.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_angle_blend_finishes_immediately() {
        assert!(UpBlend::new(Vec3::Y, Vec3::Y).is_finished());
    }

    #[test]
    fn test_flying_pulls_back() {
        let walking = target_distance(FlightStatus::default());
        let flying = target_distance(FlightStatus {
            flying: true,
            speed: 20.0,
        });
        let fast = target_distance(FlightStatus {
            flying: true,
            speed: 1000.0,
        });
        assert!(flying > walking);
        assert!((fast - MAX_FLY_DISTANCE).abs() < 1e-6);
    }
}
