//! A red cube spinning around x and y.

use hdri_viewer::ViewerConfig;

fn main() -> anyhow::Result<()> {
    let config = ViewerConfig::load_or("spinning_cube.toml", ViewerConfig::spinning_cube())?;
    hdri_viewer::run(config)
}
