mod headless;
mod wgpu;

pub use headless::{HardwareCall, HeadlessContext, HeadlessLog};
pub use wgpu::WgpuContext;
