use crate::{
    providers::{ArtworkProvider, ArtworkStream, Provider},
    render::pipeline::Pipeline,
};
use display64_hardware::AsyncDevice;
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// How many candidate URLs may wait for the display before providers block.
const CANDIDATE_BUFFER: usize = 8;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("provider `{0}` is not authorized")]
    Unauthorized(&'static str),
    #[error("no provider named `{0}`")]
    UnknownProvider(String),
}

/// What the control API shows about a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    pub is_current: bool,
}

/// A URL emitted by a provider, tagged with the generation it was started in.
#[derive(Debug)]
struct Candidate {
    generation: u64,
    url: String,
}

#[derive(Debug)]
struct Shared {
    /// Bumped on every start and stop, candidates from older generations are stale.
    generation: AtomicU64,
    last_image: RwLock<Option<String>>,
    images: broadcast::Sender<String>,
    /// Name of the running provider, readable while a switch is underway.
    current: RwLock<Option<&'static str>>,
}

impl Shared {
    fn current(&self) -> Option<&'static str> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current(&self, name: Option<&'static str>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    fn last_image(&self) -> Option<String> {
        self.last_image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_image(&self, url: String) {
        *self
            .last_image
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(url);
    }
}

#[derive(Debug)]
struct Running {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Running {
    async fn stop(self) {
        info!("Stopping provider {}", self.name);
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Provider {} ended abnormally: {}", self.name, e);
        }
    }
}

/// Keeps exactly one provider running and feeds what it finds to the display.
///
/// Providers only produce URLs. A single dispatcher task owns the pipeline
/// and with it the display, so frames never interleave. Switching providers
/// retires the old generation before anything else happens, which means a
/// late URL from a stopped provider can never reach the display.
#[derive(Debug)]
pub struct Scheduler {
    providers: Vec<Provider>,
    running: Mutex<Option<Running>>,
    shared: Arc<Shared>,
    candidates: mpsc::Sender<Candidate>,
    dispatcher: JoinHandle<()>,
}

impl Scheduler {
    pub fn new<D: AsyncDevice + 'static>(providers: Vec<Provider>, pipeline: Pipeline<D>) -> Self {
        let (tx, rx) = mpsc::channel(CANDIDATE_BUFFER);
        let (images, _) = broadcast::channel(16);
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            last_image: RwLock::new(None),
            images,
            current: RwLock::new(None),
        });

        let dispatcher = tokio::spawn(dispatch(rx, pipeline, shared.clone()));

        Self {
            providers,
            running: Mutex::new(None),
            shared,
            candidates: tx,
            dispatcher,
        }
    }

    pub fn get_provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        let current = self.current();
        self.providers
            .iter()
            .map(|p| ProviderInfo {
                name: p.name(),
                authorized: p.authorized(),
                authorization_url: p.authorization_url(),
                is_current: current == Some(p.name()),
            })
            .collect()
    }

    /// Name of the running provider. Never waits for a switch to finish.
    pub fn current(&self) -> Option<&'static str> {
        self.shared.current()
    }

    /// The last URL that made it to the display.
    pub fn last_image(&self) -> Option<String> {
        self.shared.last_image()
    }

    /// Receives every URL right after it was shown on the display.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.shared.images.subscribe()
    }

    /// Replaces the running provider. An unauthorized provider is refused
    /// before anything is touched.
    pub async fn start(&self, provider: &Provider) -> Result<(), StartError> {
        let name = provider.name();
        if !provider.authorized() {
            warn!("Provider {} is not authorized", name);
            return Err(StartError::Unauthorized(name));
        }

        let mut slot = self.running.lock().await;
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(running) = slot.take() {
            running.stop().await;
        }

        let cancel = CancellationToken::new();
        let stream = provider.stream(cancel.clone());
        let handle = tokio::spawn(forward(
            name,
            stream,
            generation,
            self.candidates.clone(),
            cancel.clone(),
        ));

        info!("Provider {} started", name);
        self.shared.set_current(Some(name));
        *slot = Some(Running {
            name,
            cancel,
            handle,
        });
        Ok(())
    }

    pub async fn start_by_name(&self, name: &str) -> Result<(), StartError> {
        let provider = self
            .get_provider(name)
            .ok_or_else(|| StartError::UnknownProvider(name.to_owned()))?
            .clone();
        self.start(&provider).await
    }

    /// Stops the running provider, if any, and waits for it to finish.
    pub async fn stop(&self) {
        let mut slot = self.running.lock().await;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(running) = slot.take() {
            running.stop().await;
        }
        self.shared.set_current(None);
    }

    /// Stops everything and closes the display once pending work is done.
    pub async fn shutdown(self) {
        self.stop().await;
        let Self {
            candidates,
            dispatcher,
            ..
        } = self;
        drop(candidates);
        if let Err(e) = dispatcher.await {
            error!("Dispatcher ended abnormally: {}", e);
        }
    }
}

/// Pulls URLs from a provider into the dispatcher queue until cancelled.
///
/// Cancellation is cooperative: a request the provider already started is
/// allowed to finish, its result is then dropped here.
async fn forward(
    name: &'static str,
    mut stream: ArtworkStream,
    generation: u64,
    candidates: mpsc::Sender<Candidate>,
    cancel: CancellationToken,
) {
    while let Some(url) = stream.next().await {
        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = candidates.send(Candidate { generation, url }) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Provider {} finished", name);
}

async fn dispatch<D: AsyncDevice>(
    mut candidates: mpsc::Receiver<Candidate>,
    mut pipeline: Pipeline<D>,
    shared: Arc<Shared>,
) {
    while let Some(Candidate { generation, url }) = candidates.recv().await {
        if generation != shared.generation.load(Ordering::SeqCst) {
            debug!("Discarding {} from a stopped provider", url);
            continue;
        }
        if shared.last_image().as_deref() == Some(url.as_str()) {
            continue;
        }

        info!("Sending image to display: {}", url);
        match pipeline.send(&url).await {
            Ok(()) => {
                info!("Image sent to display");
                shared.set_last_image(url.clone());
                // Nobody listening is fine
                let _ = shared.images.send(url);
            }
            Err(e) => error!("Failed to send {} to display: {}", url, e),
        }
    }

    if let Err(e) = pipeline.shutdown().await {
        error!("Failed to shut the display down: {}", e);
    }
    debug!("Dispatcher stopped");
}
