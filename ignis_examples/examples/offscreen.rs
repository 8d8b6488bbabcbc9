//! Renders the courtyard on an offscreen wgpu device.

use ignis_device::Device;
use ignis_examples::{ExampleError, NoDeviceErr, courtyard, init_logging, orbit_camera};
use ignis_render::{ForwardRenderer, RendererSettings, Scene};
use ignis_utils::RenderArgs;
use snafu::ResultExt;
use tracing::{error, info};

fn run() -> Result<(), ExampleError> {
    let mut device = Device::wgpu(1280, 720).context(NoDeviceErr)?;
    info!("Rendering on {}", device.context_name());

    let mut scene = Scene::new();
    courtyard(&mut device, &mut scene)?;
    let mut renderer =
        ForwardRenderer::new(&mut device, RendererSettings::from_args(RenderArgs::get()));

    for frame in 0..60 {
        let mut camera = orbit_camera(frame as f32 / 60.0 * std::f32::consts::TAU);
        let stats = renderer.render(&mut device, &mut scene, &mut camera);
        if frame % 20 == 0 {
            info!("Frame {frame}: {stats:?} / {:?}", device.stats());
        }
    }

    renderer.destroy(&mut device);
    Ok(())
}

fn main() {
    init_logging();

    if let Err(e) = run() {
        error!("{e}");
    }
}
