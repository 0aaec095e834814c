use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tokio::sync::Mutex;

/// Anything that can turn a feature vector into a grammar score.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn predict(&self, features: &[f32]) -> Result<f32>;
}

/// The pretrained grammar regressor: an ONNX graph taking a `[1, N]` float
/// tensor named `features` and producing a single float. The graph itself is
/// opaque to this service; no shape validation happens on our side, so a
/// vector of the wrong length surfaces as a runtime inference error.
#[derive(Debug)]
pub struct ScoringModel {
    // ort sessions take `&mut self` to run
    session: Mutex<Session>,
}

impl ScoringModel {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("model file not found at {}", path.display());
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(path)
            .with_context(|| format!("failed to load model from {}", path.display()))?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

#[async_trait]
impl Scorer for ScoringModel {
    async fn predict(&self, features: &[f32]) -> Result<f32> {
        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())?;
        let tensor = Tensor::from_array(input)?;

        let mut session = self.session.lock().await;
        let outputs = session.run(ort::inputs!["features" => tensor])?;

        let (_, value) = outputs
            .iter()
            .next()
            .context("model produced no output")?;
        let (_shape, data) = value.try_extract_tensor::<f32>()?;

        data.first().copied().context("model output is empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_an_error() {
        let err = ScoringModel::load(Path::new("no-such-model.onnx")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
