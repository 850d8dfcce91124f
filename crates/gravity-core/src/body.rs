//! Per-body area registry, effective direction and transition state.
//!
//! Membership changes only mark the body dirty. The owning world calls
//! [`GravityBody::recompute_effective`] once all of a tick's commits have been
//! applied, so a body never sees a direction derived from half of a set of
//! simultaneous enters and exits.

use glam::{Quat, Vec3};

use crate::{
    area::{AreaId, GravityArea},
    config::GravityConfig,
    orient,
};

/// Slack for comparing accumulated tick time against a deadline.
const DEADLINE_EPSILON: f64 = 1e-9;

/// Handle to a body registered with a [`GravityWorld`](crate::GravityWorld).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

/// A change of effective up that consumers are still animating toward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    /// Up before the change.
    pub old_up: Vec3,
    /// Up after the change.
    pub new_up: Vec3,
    /// Simulation time the transition started, in seconds.
    pub started_at: f64,
    /// Simulation time after which the fail-safe clears the transition.
    pub deadline: f64,
}

/// Orientation command produced by [`GravityBody::force_align`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlignCommand {
    /// Set the body rotation to this value now.
    Snap { rotation: Quat },
    /// Animate the body's up-axis toward this vector over the coming ticks.
    Smooth { target_up: Vec3 },
}

/// Snapshot of an active area. Areas are immutable, so the snapshot stays valid.
#[derive(Clone, Copy, Debug)]
struct ActiveArea {
    id: AreaId,
    priority: i32,
    down: Vec3,
    sequence: u64,
}

/// Gravity state of one physics-driven actor.
#[derive(Clone, Debug)]
pub struct GravityBody {
    active: Vec<ActiveArea>,
    next_sequence: u64,
    effective_down: Vec3,
    transition: Option<Transition>,
    dirty: bool,
}

impl GravityBody {
    /// Create a body outside every area.
    pub fn new(config: &GravityConfig) -> Self {
        Self {
            active: Vec::new(),
            next_sequence: 0,
            effective_down: config.fallback_down(),
            transition: None,
            dirty: false,
        }
    }

    /// Add an area to the active set. Returns `false` if it was already a member.
    pub fn add_area(&mut self, id: AreaId, area: &GravityArea) -> bool {
        if self.contains(id) {
            return false;
        }
        self.active.push(ActiveArea {
            id,
            priority: area.priority(),
            down: area.gravity_direction(),
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        self.dirty = true;
        true
    }

    /// Remove an area from the active set. Returns `false` if it was not a member.
    pub fn remove_area(&mut self, id: AreaId) -> bool {
        let before = self.active.len();
        self.active.retain(|active| active.id != id);
        let removed = self.active.len() != before;
        self.dirty |= removed;
        removed
    }

    pub fn contains(&self, id: AreaId) -> bool {
        self.active.iter().any(|active| active.id == id)
    }

    /// Active area ids, in the order they were added.
    pub fn active_areas(&self) -> impl Iterator<Item = AreaId> + '_ {
        self.active.iter().map(|active| active.id)
    }

    /// The area currently deciding this body's gravity, if any.
    ///
    /// Highest priority wins; among equal priorities the most recently added.
    pub fn governing_area(&self) -> Option<AreaId> {
        self.winner().map(|active| active.id)
    }

    fn winner(&self) -> Option<&ActiveArea> {
        self.active.iter().max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.sequence.cmp(&b.sequence))
        })
    }

    /// Whether membership changed since the last recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Unit gravity direction currently governing the body.
    pub fn effective_down(&self) -> Vec3 {
        self.effective_down
    }

    /// Unit up vector, opposite the effective gravity direction.
    pub fn effective_up(&self) -> Vec3 {
        -self.effective_down
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    pub fn is_in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Re-derive the effective direction from the active set.
    ///
    /// Returns the transition that was started, if the new up differs
    /// materially from the old one. A change within the similarity threshold
    /// is committed silently, and retargets a running transition.
    pub fn recompute_effective(&mut self, now: f64, config: &GravityConfig) -> Option<Transition> {
        self.dirty = false;

        let fallback = config.fallback_down();
        let down = match self.winner() {
            Some(winner) => {
                let down = winner.down.normalize_or_zero();
                if down == Vec3::ZERO {
                    tracing::warn!(
                        "Area {:?} produced a degenerate direction, using default down",
                        winner.id
                    );
                    fallback
                } else {
                    down
                }
            }
            None => fallback,
        };

        let old_up = self.effective_up();
        let new_up = -down;
        self.effective_down = down;

        if orient::ups_match(old_up, new_up, config.similarity_threshold) {
            if let Some(transition) = &mut self.transition {
                transition.new_up = new_up;
            }
            return None;
        }

        let transition = Transition {
            old_up,
            new_up,
            started_at: now,
            deadline: now + f64::from(config.timeout_for(None)),
        };
        self.transition = Some(transition);
        Some(transition)
    }

    /// Record how long consumers expect to animate the running transition.
    ///
    /// The hint only resizes the fail-safe of the transition running now.
    /// Returns `false` if there is none.
    pub fn mark_transition(&mut self, duration_hint: f32, config: &GravityConfig) -> bool {
        let Some(transition) = &mut self.transition else {
            return false;
        };
        transition.deadline =
            transition.started_at + f64::from(config.timeout_for(Some(duration_hint)));
        true
    }

    /// Finish the running transition if it targets `reached_up`, returning it.
    ///
    /// A completion for a transition that has since been restarted toward
    /// another up is ignored.
    pub fn complete_transition(
        &mut self,
        reached_up: Vec3,
        config: &GravityConfig,
    ) -> Option<Transition> {
        let transition = self.transition?;
        if !orient::ups_match(transition.new_up, reached_up, config.similarity_threshold) {
            return None;
        }
        self.transition = None;
        Some(transition)
    }

    /// Clear the running transition if its deadline has passed, returning it.
    pub fn expire_transition(&mut self, now: f64) -> Option<Transition> {
        match self.transition {
            Some(transition) if now + DEADLINE_EPSILON >= transition.deadline => {
                self.transition.take()
            }
            _ => None,
        }
    }

    /// Reorient toward the effective up.
    ///
    /// `immediate` snaps `rotation` in one step; otherwise the returned command
    /// asks the rotation-smoothing consumer to animate toward the target.
    pub fn force_align(&self, rotation: Quat, immediate: bool) -> AlignCommand {
        let target_up = self.effective_up();
        if immediate {
            AlignCommand::Snap {
                rotation: orient::align_up(rotation, target_up),
            }
        } else {
            AlignCommand::Smooth { target_up }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::area::{AreaShape, LocalAxis, OrientedBox};

    fn pull_area(pull: Vec3, priority: i32) -> GravityArea {
        GravityArea::new(
            AreaShape::DirectionalPull {
                volume: OrientedBox::new(Vec3::ZERO, Vec3::ONE),
                pull,
            },
            priority,
            0.0,
        )
        .unwrap()
    }

    fn floor_area(priority: i32) -> GravityArea {
        GravityArea::new(
            AreaShape::BoxFace {
                volume: OrientedBox::new(Vec3::ZERO, Vec3::ONE),
                down: LocalAxis::NegY,
            },
            priority,
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_add_area_is_idempotent() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        let area = pull_area(Vec3::X, 1);

        assert!(body.add_area(AreaId(0), &area));
        body.recompute_effective(0.0, &config);
        assert!(!body.add_area(AreaId(0), &area));
        assert!(!body.is_dirty());
        assert_eq!(body.active_areas().count(), 1);
    }

    #[test]
    fn test_remove_absent_area_is_noop() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 1));
        body.recompute_effective(0.0, &config);

        assert!(body.remove_area(AreaId(0)));
        body.recompute_effective(0.0, &config);
        let after_first = (body.effective_down(), body.governing_area());

        assert!(!body.remove_area(AreaId(0)));
        assert!(!body.is_dirty());
        assert_eq!((body.effective_down(), body.governing_area()), after_first);
    }

    #[test]
    fn test_highest_priority_wins_regardless_of_order() {
        let config = GravityConfig::default();
        let low = floor_area(1);
        let high = pull_area(Vec3::X, 5);

        let mut forward = GravityBody::new(&config);
        forward.add_area(AreaId(0), &low);
        forward.add_area(AreaId(1), &high);
        forward.recompute_effective(0.0, &config);

        let mut reverse = GravityBody::new(&config);
        reverse.add_area(AreaId(1), &high);
        reverse.add_area(AreaId(0), &low);
        reverse.recompute_effective(0.0, &config);

        assert_eq!(forward.effective_down(), Vec3::X);
        assert_eq!(reverse.effective_down(), Vec3::X);
        assert_eq!(forward.governing_area(), Some(AreaId(1)));
    }

    #[test]
    fn test_equal_priority_prefers_most_recent() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 2));
        body.add_area(AreaId(1), &pull_area(Vec3::Z, 2));
        body.recompute_effective(0.0, &config);
        assert_eq!(body.governing_area(), Some(AreaId(1)));

        // Re-adding the older area after leaving makes it the most recent.
        body.remove_area(AreaId(0));
        body.add_area(AreaId(0), &pull_area(Vec3::X, 2));
        body.recompute_effective(0.0, &config);
        assert_eq!(body.governing_area(), Some(AreaId(0)));
    }

    #[test]
    fn test_removing_winner_falls_back_to_next() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::Z, 1));
        body.add_area(AreaId(1), &pull_area(Vec3::X, 5));
        body.recompute_effective(0.0, &config);

        body.remove_area(AreaId(1));
        body.recompute_effective(0.0, &config);
        assert_eq!(body.effective_down(), Vec3::Z);

        body.remove_area(AreaId(0));
        body.recompute_effective(0.0, &config);
        assert_eq!(body.effective_down(), Vec3::NEG_Y);
    }

    #[test]
    fn test_pull_direction_is_normalized() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::new(0.0, 0.0, -8.0), 0));
        body.recompute_effective(0.0, &config);
        assert_eq!(body.effective_down(), Vec3::NEG_Z);
    }

    #[test]
    fn test_degenerate_snapshot_uses_default_down() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.active.push(ActiveArea {
            id: AreaId(9),
            priority: 0,
            down: Vec3::ZERO,
            sequence: 0,
        });
        body.recompute_effective(0.0, &config);
        assert_eq!(body.effective_down(), Vec3::NEG_Y);
        assert!(body.effective_down().is_finite());
    }

    #[test]
    fn test_material_change_starts_transition() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));

        let transition = body.recompute_effective(2.0, &config).unwrap();
        assert_eq!(transition.old_up, Vec3::Y);
        assert_eq!(transition.new_up, Vec3::NEG_X);
        assert!((transition.deadline - 3.0).abs() < 1e-9);
        assert!(body.is_in_transition());
    }

    #[test]
    fn test_similar_direction_is_silent() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        let nearly_down = Quat::from_rotation_x(0.5_f32.to_radians()) * Vec3::NEG_Y;
        body.add_area(AreaId(0), &pull_area(nearly_down, 0));

        assert!(body.recompute_effective(0.0, &config).is_none());
        assert!(!body.is_in_transition());
        assert!(body.effective_down().abs_diff_eq(nearly_down, 1e-6));
    }

    #[test]
    fn test_transition_expires_after_timeout() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);

        assert!(body.expire_transition(0.9).is_none());
        assert!(body.expire_transition(1.0).is_some());
        assert!(!body.is_in_transition());
    }

    #[test]
    fn test_mark_transition_resizes_deadline() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);

        assert!(body.mark_transition(2.0, &config));
        assert!((body.transition().unwrap().deadline - 2.25).abs() < 1e-9);
        assert!(body.expire_transition(1.5).is_none());
    }

    #[test]
    fn test_complete_transition_clears_state() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);

        let transition = body.complete_transition(Vec3::NEG_X, &config).unwrap();
        assert_eq!(transition.new_up, Vec3::NEG_X);
        assert!(body.complete_transition(Vec3::NEG_X, &config).is_none());
    }

    #[test]
    fn test_completion_for_restarted_transition_is_ignored() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);

        // Restarted toward -Z before the consumer reached -X.
        body.add_area(AreaId(1), &pull_area(Vec3::Z, 1));
        body.recompute_effective(0.1, &config);

        assert!(body.complete_transition(Vec3::NEG_X, &config).is_none());
        assert!(body.is_in_transition());
        let transition = body.complete_transition(Vec3::NEG_Z, &config).unwrap();
        assert_eq!(transition.old_up, Vec3::NEG_X);
        assert!(!body.is_in_transition());
    }

    #[test]
    fn test_hint_does_not_outlive_its_transition() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);
        assert!(body.mark_transition(4.0, &config));
        body.complete_transition(Vec3::NEG_X, &config);

        body.remove_area(AreaId(0));
        let transition = body.recompute_effective(10.0, &config).unwrap();
        assert!((transition.deadline - 11.0).abs() < 1e-9);
        assert!(!GravityBody::new(&config).mark_transition(4.0, &config));
    }

    #[test]
    fn test_similar_change_retargets_running_transition() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);

        let nearly_x = Quat::from_rotation_z(0.5_f32.to_radians()) * Vec3::X;
        body.add_area(AreaId(1), &pull_area(nearly_x, 1));
        assert!(body.recompute_effective(0.1, &config).is_none());

        let transition = body.transition().unwrap();
        assert!(transition.new_up.abs_diff_eq(-nearly_x, 1e-6));
        assert_eq!(transition.old_up, Vec3::Y);
    }

    #[test]
    fn test_force_align() {
        let config = GravityConfig::default();
        let mut body = GravityBody::new(&config);
        body.add_area(AreaId(0), &pull_area(Vec3::X, 0));
        body.recompute_effective(0.0, &config);

        match body.force_align(Quat::IDENTITY, true) {
            AlignCommand::Snap { rotation } => {
                assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::NEG_X, 1e-5));
            }
            AlignCommand::Smooth { .. } => panic!("expected snap"),
        }
        assert_eq!(
            body.force_align(Quat::IDENTITY, false),
            AlignCommand::Smooth {
                target_up: Vec3::NEG_X
            }
        );
    }

    const PULLS: [Vec3; 4] = [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z];

    proptest! {
        // After any history, removing the same area a second time changes nothing.
        #[test]
        fn prop_second_remove_is_noop(
            ops in proptest::collection::vec((0u32..4, any::<bool>(), -3i32..3), 0..16),
            target in 0u32..4,
            recompute_between in any::<bool>(),
        ) {
            let config = GravityConfig::default();
            let mut body = GravityBody::new(&config);
            for (index, add, priority) in ops {
                let id = AreaId(index);
                if add {
                    body.add_area(id, &pull_area(PULLS[index as usize], priority));
                } else {
                    body.remove_area(id);
                }
                body.recompute_effective(0.0, &config);
            }

            body.remove_area(AreaId(target));
            if recompute_between {
                body.recompute_effective(0.0, &config);
            }
            let once = (body.effective_down(), body.governing_area(), body.is_dirty());

            prop_assert!(!body.remove_area(AreaId(target)));
            let twice = (body.effective_down(), body.governing_area(), body.is_dirty());
            prop_assert_eq!(once, twice);
        }
    }
}
