use anyhow::{anyhow, Result};
use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModel, SentenceEmbeddingsModelType,
};
use std::future::Future;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use strum::Display;
use tokio::sync::{oneshot, watch};

use crate::settings::{EmbeddingModel, Embeddings};
use crate::utils::{log_model_failed, log_model_loaded, log_model_loading};

/// Turns text into fixed-dimension vectors. Every vector returned during one
/// evaluation must have the same dimension.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_batch(&self, texts: &[String])
        -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send {
        let texts = vec![text.to_string()];
        async move {
            self.embed_batch(&texts)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("provider returned no embedding"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ModelState {
    #[strum(serialize = "not ready")]
    NotReady,
    #[strum(serialize = "ready")]
    Ready,
    #[strum(serialize = "failed")]
    Failed(String),
}

impl From<EmbeddingModel> for SentenceEmbeddingsModelType {
    fn from(model: EmbeddingModel) -> Self {
        match model {
            EmbeddingModel::AllMiniLmL12V2 => Self::AllMiniLmL12V2,
            EmbeddingModel::AllMiniLmL6V2 => Self::AllMiniLmL6V2,
            EmbeddingModel::AllDistilrobertaV1 => Self::AllDistilrobertaV1,
            EmbeddingModel::ParaphraseAlbertSmallV2 => Self::ParaphraseAlbertSmallV2,
            EmbeddingModel::SentenceT5Base => Self::SentenceT5Base,
        }
    }
}

enum EmbeddingRequest {
    Encode {
        texts: Vec<String>,
        response_tx: oneshot::Sender<Result<Vec<Vec<f32>>>>,
    },
}

/// Sentence embedding model running on its own thread. Cheap to clone; all
/// clones share the one model, which serves requests in arrival order.
#[derive(Clone)]
pub struct EmbeddingHandle {
    request_tx: mpsc::Sender<EmbeddingRequest>,
    state_rx: watch::Receiver<ModelState>,
}

impl EmbeddingHandle {
    pub fn spawn(config: &Embeddings) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<EmbeddingRequest>();
        let (state_tx, state_rx) = watch::channel(ModelState::NotReady);
        let model_kind = config.model;
        let batch_size = config.batch_size.max(1);

        thread::Builder::new()
            .name("embeddings".into())
            .spawn(move || match load_model(model_kind) {
                Ok(model) => {
                    state_tx.send_replace(ModelState::Ready);
                    run_embedding_worker(&model, request_rx, batch_size);
                }
                Err(e) => {
                    let reason = e.to_string();
                    log_model_failed(&reason);
                    state_tx.send_replace(ModelState::Failed(reason.clone()));
                    reject_requests(request_rx, &reason);
                }
            })?;

        Ok(Self {
            request_tx,
            state_rx,
        })
    }

    pub fn state(&self) -> ModelState {
        self.state_rx.borrow().clone()
    }

    /// Waits until the model has either loaded or failed to load.
    pub async fn ready(&self) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx
            .wait_for(|state| *state != ModelState::NotReady)
            .await
            .map_err(|_| anyhow!("embedding worker exited before the model loaded"))?;

        match &*state {
            ModelState::Failed(reason) => Err(anyhow!("embedding model failed to load: {reason}")),
            _ => Ok(()),
        }
    }
}

impl EmbeddingProvider for EmbeddingHandle {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(EmbeddingRequest::Encode {
                texts: texts.to_vec(),
                response_tx,
            })
            .map_err(|_| anyhow!("embedding worker channel closed"))?;

        response_rx
            .await
            .map_err(|_| anyhow!("embedding worker dropped the request"))?
    }
}

fn load_model(model_kind: EmbeddingModel) -> Result<SentenceEmbeddingsModel> {
    log_model_loading(&model_kind.to_string());
    let start = Instant::now();
    let model = SentenceEmbeddingsBuilder::remote(model_kind.into()).create_model()?;
    log_model_loaded(&model_kind.to_string(), start.elapsed().as_secs_f32());
    Ok(model)
}

fn run_embedding_worker(
    model: &SentenceEmbeddingsModel,
    request_rx: mpsc::Receiver<EmbeddingRequest>,
    batch_size: usize,
) {
    for request in request_rx {
        let EmbeddingRequest::Encode { texts, response_tx } = request;
        let _ = response_tx.send(encode_batched(model, &texts, batch_size));
    }
}

fn encode_batched(
    model: &SentenceEmbeddingsModel,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut embeddings = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size) {
        embeddings.extend(model.encode(chunk)?);
    }
    Ok(embeddings)
}

fn reject_requests(request_rx: mpsc::Receiver<EmbeddingRequest>, reason: &str) {
    for request in request_rx {
        let EmbeddingRequest::Encode { response_tx, .. } = request;
        let _ = response_tx.send(Err(anyhow!("embedding model unavailable: {reason}")));
    }
}
