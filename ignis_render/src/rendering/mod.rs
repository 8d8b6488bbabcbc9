mod renderer;
mod settings;

pub use renderer::{ForwardRenderer, RenderStats};
pub use settings::RendererSettings;
