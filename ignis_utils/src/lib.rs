mod bounds;
pub mod frustum;
mod logging;
mod render_args;

pub use bounds::{BoundingBox, BoundingSphere};
pub use frustum::{Frustum, FrustumPlane, FrustumSide};
pub use render_args::RenderArgs;

pub use tracing;
