// name/state/downcast accessors shared by every goal; the implementing type must have a `state: GoalState` field
macro_rules! goal_accessors {
    ($name:literal) => {
        fn name(&self) -> &'static str {
            $name
        }

        fn state(&self) -> &GoalState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut GoalState {
            &mut self.state
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub mod goal;
pub mod anchor;
pub mod pairwise;
pub mod angle;
pub mod best_fit;
pub mod on_geometry;
pub mod collision;
pub mod forces;
pub mod shape_matching;

pub use goal::{Goal, GoalOutput, GoalState};
pub use anchor::AnchorGoal;
pub use pairwise::{ClampLengthGoal, DirectionGoal, EqualLengthsGoal, LengthGoal, ParallelLinesGoal};
pub use angle::AngleGoal;
pub use best_fit::{CoCircularGoal, CoLinearGoal, CoPlanarGoal, CoSphericalGoal, CoincidentGoal};
pub use on_geometry::{
    ClosestPoint, Line, OnCurveGoal, OnLineGoal, OnPlaneGoal, OnSurfaceGoal, Plane, Polyline,
    SphereSurface, TriangleMesh,
};
pub use collision::{
    ConvexPolygonCollisionGoal, ConvexPolygonContainmentGoal, FloorGoal, SphereCollisionGoal,
    SphereStaticLineCollisionGoal,
};
pub use forces::{enclosed_volume, ConstantPressureGoal, ConstantVolumePressureGoal, DirectionalWindGoal, ForceGoal};
pub use shape_matching::ShapeMatchingGoal;
