//! Simulated outdoor world: the route being ridden and the speed model.

pub mod physics;
pub mod route;

pub use physics::{solve_cubic, SpeedModel};
pub use route::{haversine, CoordInfo, Route, RouteError, RoutePoint, SlopeMode};
