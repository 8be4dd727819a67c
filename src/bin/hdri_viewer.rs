//! HDRI background, glTF model and orbit controls.
//!
//! Reads `viewer.toml` from the working directory when present.

use hdri_viewer::ViewerConfig;

fn main() -> anyhow::Result<()> {
    let config = ViewerConfig::load_or("viewer.toml", ViewerConfig::showcase())?;
    hdri_viewer::run(config)
}
