//! Renders a few frames against the recording context and prints what reached the hardware.
//!
//! Run with `RUST_LOG=debug` to see programs being generated.

use ignis_device::Device;
use ignis_device::backend::{HardwareCall, HeadlessContext};
use ignis_examples::{courtyard, init_logging, orbit_camera};
use ignis_render::{ForwardRenderer, RendererSettings, Scene};
use ignis_utils::RenderArgs;
use itertools::Itertools;
use tracing::{error, info};

fn main() {
    init_logging();

    let (context, log) = HeadlessContext::new();
    let mut device = Device::new(Box::new(context));
    let mut scene = Scene::new();
    if let Err(e) = courtyard(&mut device, &mut scene) {
        error!("{e}");
        return;
    }

    let settings = RendererSettings::from_args(RenderArgs::get());
    let mut renderer = ForwardRenderer::new(&mut device, settings);

    for frame in 0..3 {
        log.clear();
        let mut camera = orbit_camera(frame as f32 * 0.3);
        let stats = renderer.render(&mut device, &mut scene, &mut camera);

        let calls = log.calls();
        let summary = calls
            .iter()
            .map(|call| match call {
                HardwareCall::CreateProgram { .. } => "create program",
                HardwareCall::BindRenderTarget(_) => "bind target",
                HardwareCall::BindProgram(_) => "bind program",
                HardwareCall::CommitUniform { .. } => "commit uniform",
                HardwareCall::Draw { .. } => "draw",
                _ => "state",
            })
            .counts()
            .into_iter()
            .sorted()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .join(", ");

        info!("Frame {frame}: {stats:?}");
        info!("  {summary}");
    }

    info!(
        "{} programs generated, {} cached",
        renderer.library().generated(),
        renderer.library().len()
    );
    renderer.destroy(&mut device);
}
