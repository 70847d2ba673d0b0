//! Activity tracking for terrain colliders
//!
//! Determines which sections are near dynamic bodies. Sections inside an
//! active region hold their colliders in the `ReadyActive` state.

use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use voxel::{SectionPos, SECTION_SIZE};

/// Tracks the regions around dynamic bodies
///
/// Each body gets its own region, so two distant bodies never activate the
/// terrain between them. Uses margin-based hysteresis so small movements do
/// not reshuffle section activity every frame.
pub struct ActivityTracker {
    /// One region per dynamic body, grown by twice the margin
    regions: Vec<Aabb>,
    /// Margin added to dynamic AABBs for velocity/prediction
    margin: f32,
    initialized: bool,
}

impl ActivityTracker {
    /// Create a new tracker with the given margin
    pub fn new(margin: f32) -> Self {
        Self {
            regions: Vec::new(),
            margin,
            initialized: false,
        }
    }

    /// Update the active regions from dynamic body AABBs
    ///
    /// Returns whether the regions changed. They are rebuilt when the body
    /// count changes or any body (plus margin) leaves its region. With no
    /// dynamic bodies nothing is active.
    pub fn update(&mut self, dynamic_aabbs: &[Aabb]) -> bool {
        if dynamic_aabbs.is_empty() {
            let was_initialized = self.initialized;
            self.initialized = false;
            self.regions.clear();
            return was_initialized;
        }

        let stale = !self.initialized
            || self.regions.len() != dynamic_aabbs.len()
            || self
                .regions
                .iter()
                .zip(dynamic_aabbs)
                .any(|(region, aabb)| !region.contains(&aabb.loosened(self.margin)));
        if !stale {
            return false;
        }

        // Grow by a second margin for hysteresis
        self.regions = dynamic_aabbs
            .iter()
            .map(|aabb| aabb.loosened(self.margin * 2.0))
            .collect();
        self.initialized = true;
        true
    }

    /// Force a change report on next update
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }

    /// Current per-body regions; empty when nothing is tracked
    pub fn regions(&self) -> &[Aabb] {
        if self.initialized {
            &self.regions
        } else {
            &[]
        }
    }

    /// Whether any part of the section lies in some body's region
    pub fn is_active(&self, section: SectionPos) -> bool {
        let bounds = section_aabb(section);
        self.regions().iter().any(|region| region.intersects(&bounds))
    }
}

/// World-space bounds of a section
pub fn section_aabb(section: SectionPos) -> Aabb {
    let min = section.world_origin();
    let max = min + glam::Vec3::splat(SECTION_SIZE as f32);
    Aabb::new(min.to_array().into(), max.to_array().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_aabb(min: [f32; 3], max: [f32; 3]) -> Aabb {
        Aabb::new(min.into(), max.into())
    }

    #[test]
    fn test_empty_dynamics_returns_none() {
        let mut tracker = ActivityTracker::new(1.0);
        assert!(!tracker.update(&[]));
        assert!(!tracker.is_active(SectionPos::new(0, 0, 0)));
    }

    #[test]
    fn test_first_update_reports_change() {
        let mut tracker = ActivityTracker::new(1.0);
        let aabb = make_aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert!(tracker.update(&[aabb]));
    }

    #[test]
    fn test_small_movement_no_change() {
        let mut tracker = ActivityTracker::new(5.0);
        assert!(tracker.update(&[make_aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])]));
        assert!(
            !tracker.update(&[make_aabb([0.5, 0.5, 0.5], [1.5, 1.5, 1.5])]),
            "Small movement should not change activity"
        );
    }

    #[test]
    fn test_large_movement_reports_change() {
        let mut tracker = ActivityTracker::new(1.0);
        tracker.update(&[make_aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])]);
        let moved = tracker.update(&[make_aabb([100.0, 100.0, 100.0], [101.0, 101.0, 101.0])]);
        assert!(moved);
        assert!(!tracker.is_active(SectionPos::new(0, 0, 0)));
        assert!(tracker.is_active(SectionPos::new(6, 6, 6)));
    }

    #[test]
    fn test_bodies_leaving_clears_activity() {
        let mut tracker = ActivityTracker::new(1.0);
        tracker.update(&[make_aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])]);
        assert!(tracker.is_active(SectionPos::new(0, 0, 0)));

        assert!(tracker.update(&[]), "first empty update reports the change");
        assert!(!tracker.update(&[]));
        assert!(!tracker.is_active(SectionPos::new(0, 0, 0)));
        assert!(tracker.regions().is_empty());
    }

    #[test]
    fn test_margin_reaches_neighbouring_section() {
        let mut tracker = ActivityTracker::new(2.0);
        tracker.update(&[make_aabb([15.0, 1.0, 1.0], [15.5, 2.0, 2.0])]);
        assert!(tracker.is_active(SectionPos::new(0, 0, 0)));
        assert!(tracker.is_active(SectionPos::new(1, 0, 0)));
        assert!(!tracker.is_active(SectionPos::new(2, 0, 0)));
    }

    #[test]
    fn test_invalidate_forces_change() {
        let mut tracker = ActivityTracker::new(5.0);
        let aabb = make_aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        tracker.update(&[aabb]);
        assert!(!tracker.update(&[aabb]));

        tracker.invalidate();
        assert!(tracker.update(&[aabb]));
    }

    #[test]
    fn test_distant_bodies_leave_gap_inactive() {
        let mut tracker = ActivityTracker::new(1.0);
        let west = make_aabb([1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        let east = make_aabb([168.0, 1.0, 1.0], [169.0, 2.0, 2.0]);
        assert!(tracker.update(&[west, east]));

        assert!(tracker.is_active(SectionPos::new(0, 0, 0)));
        assert!(tracker.is_active(SectionPos::new(10, 0, 0)));
        for x in 1..10 {
            assert!(!tracker.is_active(SectionPos::new(x, 0, 0)), "section {x} lies between bodies");
        }
        assert_eq!(tracker.regions().len(), 2);
    }

    #[test]
    fn test_regions_follow_moving_body() {
        let mut tracker = ActivityTracker::new(1.0);
        let still = make_aabb([1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        tracker.update(&[still, make_aabb([40.0, 1.0, 1.0], [41.0, 2.0, 2.0])]);
        assert!(tracker.is_active(SectionPos::new(2, 0, 0)));

        // One body rolls far away; its old neighbourhood is released
        assert!(tracker.update(&[still, make_aabb([200.0, 1.0, 1.0], [201.0, 2.0, 2.0])]));
        assert!(!tracker.is_active(SectionPos::new(2, 0, 0)));
        assert!(tracker.is_active(SectionPos::new(12, 0, 0)));
        assert!(tracker.is_active(SectionPos::new(0, 0, 0)));
        assert!(tracker
            .regions()
            .iter()
            .all(|region| region.extents().x <= 1.0 + 4.0 + f32::EPSILON));
    }

    #[test]
    fn test_body_count_change_reports() {
        let mut tracker = ActivityTracker::new(5.0);
        let a = make_aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert!(tracker.update(&[a]));
        assert!(tracker.update(&[a, a]));
        assert!(!tracker.update(&[a, a]));
    }

    #[test]
    fn test_section_aabb() {
        let aabb = section_aabb(SectionPos::new(-1, 0, 2));
        assert_eq!(aabb.mins.x, -16.0);
        assert_eq!(aabb.maxs.x, 0.0);
        assert_eq!(aabb.mins.z, 32.0);
        assert_eq!(aabb.maxs.y, 16.0);
    }
}
