//! Loading environment maps and models from external files.
//!
//! Every loader only decodes: it returns plain data ([`EnvironmentMap`],
//! [`ModelData`]) and never touches the GPU or the scene. Uploading happens
//! later on the event-loop thread.
//!
//! Natively files are read relative to the [`AssetRoot`] directory; on the web
//! they are fetched from `<page origin>/<root>/<file>`.

use thiserror::Error;

use crate::data_structures::{environment::EnvironmentMap, model::ModelData};

pub mod gltf_model;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not fetch `{path}`: {source}")]
    Fetch {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not decode `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid glTF `{path}`: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("`{path}` contains no drawable meshes")]
    EmptyModel { path: String },
}

/// Where asset paths are resolved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRoot {
    root: String,
}

impl AssetRoot {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn path(&self, file_name: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.root).join(file_name)
    }

    #[cfg(target_arch = "wasm32")]
    fn url(&self, file_name: &str) -> anyhow::Result<reqwest::Url> {
        let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
        let origin = window
            .location()
            .origin()
            .map_err(|_| anyhow::anyhow!("page has no origin"))?;
        let root = self.root.trim_matches('/');
        let base = if root.is_empty() {
            reqwest::Url::parse(&format!("{origin}/"))?
        } else {
            reqwest::Url::parse(&format!("{origin}/{root}/"))?
        };
        Ok(base.join(file_name)?)
    }
}

impl Default for AssetRoot {
    fn default() -> Self {
        Self::new("assets")
    }
}

/// Resolve `uri` relative to the directory of `file_name`.
pub(crate) fn sibling(file_name: &str, uri: &str) -> String {
    match file_name.rfind('/') {
        Some(idx) => format!("{}/{}", &file_name[..idx], uri),
        None => uri.to_string(),
    }
}

pub async fn load_binary(root: &AssetRoot, file_name: &str) -> Result<Vec<u8>, LoadError> {
    let fetch_error = |source: anyhow::Error| LoadError::Fetch {
        path: file_name.to_string(),
        source,
    };

    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = root.url(file_name).map_err(fetch_error)?;
        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_error(e.into()))?;
        response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.into()))?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = tokio::fs::read(root.path(file_name))
        .await
        .map_err(|e| fetch_error(e.into()))?;

    log::debug!("Fetched {} ({} bytes)", file_name, data.len());
    Ok(data)
}

/// Fetch and decode an equirectangular Radiance HDR image.
pub async fn load_environment(
    root: &AssetRoot,
    file_name: &str,
) -> Result<EnvironmentMap, LoadError> {
    let data = load_binary(root, file_name).await?;
    let image = image::load_from_memory_with_format(&data, image::ImageFormat::Hdr).map_err(
        |source| LoadError::Decode {
            path: file_name.to_string(),
            source,
        },
    )?;
    let map = EnvironmentMap::new(file_name, image.to_rgb32f());
    log::info!(
        "Decoded environment {} ({}x{})",
        file_name,
        map.width(),
        map.height()
    );
    Ok(map)
}

/// Fetch and decode a glTF or GLB model, including its textures.
pub async fn load_model(root: &AssetRoot, file_name: &str) -> Result<ModelData, LoadError> {
    let data = load_binary(root, file_name).await?;
    gltf_model::decode(root, file_name, &data).await
}
