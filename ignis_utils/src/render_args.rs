use argh::FromArgs;
use std::sync::LazyLock;

fn positive_distance(value: &str) -> Result<f32, String> {
    let distance: f32 = value
        .parse()
        .map_err(|_| format!("{value:?} is not a number"))?;

    if !distance.is_finite() || distance <= 0.0 {
        return Err(format!("shadow distance must be positive, got {distance}"));
    }

    Ok(distance)
}

/// Render switches read from the process arguments
#[derive(Debug, Default, FromArgs)]
pub struct RenderArgs {
    #[argh(switch, hidden_help)]
    pub no_shadows: bool,
    #[argh(switch, hidden_help)]
    pub no_frustum_culling: bool,
    #[argh(switch, hidden_help)]
    pub no_depth_prepass: bool,

    #[argh(option, hidden_help, from_str_fn(positive_distance))]
    pub shadow_distance: Option<f32>,
    #[argh(option, hidden_help)]
    pub max_uniform_bones: Option<u32>,
}

impl RenderArgs {
    fn init() -> Option<RenderArgs> {
        let mut args = std::env::args();
        let cmd_name = args.next()?;
        let args: Vec<String> = args.collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        RenderArgs::from_args(&[&cmd_name], &args).ok()
    }

    pub fn get() -> &'static RenderArgs {
        static INSTANCE: LazyLock<RenderArgs> =
            LazyLock::new(|| RenderArgs::init().unwrap_or_default());
        &INSTANCE
    }
}
