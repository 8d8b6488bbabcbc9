mod light;
pub mod shadow;

pub use light::Light;
pub use shadow::{ShadowCamera, ShadowMap};
