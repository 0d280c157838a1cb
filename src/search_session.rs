use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, error, info};

use crate::connectivity::ConnectivityMonitor;
use crate::giphy::{GifFetcher, GiphyError};
use crate::model::{Gif, MAX_QUERY_LEN, PAGE_LIMIT};

/// How long the input has to stay quiet before a search is dispatched.
const DEBOUNCE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// GIFs per request, capped by the API page limit.
    pub limit: usize,
    pub debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            limit: PAGE_LIMIT,
            debounce: DEBOUNCE_DELAY,
        }
    }
}

/// User-visible failures, surfaced through [`SessionEvent::ErrorChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Too many symbols")]
    TooLong,
    #[error("No internet")]
    NoConnectivity,
    #[error("No Giphy API key configured")]
    MissingApiKey,
}

/// Render signals for whatever displays the results.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ResultsChanged(Vec<Gif>),
    LoadingChanged(bool),
    ErrorChanged(Option<SearchError>),
}

/// Which request a completion belongs to. A completion whose query is no
/// longer the committed one is discarded instead of applied.
#[derive(Debug)]
struct RequestTag {
    query: String,
    offset: usize,
}

enum SessionMsg {
    TextChanged(String),
    ScrolledNearBottom,
    Selected {
        index: usize,
        reply: oneshot::Sender<Option<String>>,
    },
    DebounceFired {
        generation: u64,
        text: String,
    },
    FetchDone {
        tag: RequestTag,
        result: Result<Vec<Gif>, GiphyError>,
    },
}

/// Handle to a running search session. Cheap to clone; all state lives in
/// the actor task behind the channel.
#[derive(Clone)]
pub struct SearchSession {
    tx: mpsc::UnboundedSender<SessionMsg>,
}

impl SearchSession {
    /// Spawns the session actor and returns the handle together with the
    /// event stream the rendering layer consumes.
    pub fn spawn(
        fetcher: Arc<dyn GifFetcher>,
        connectivity: ConnectivityMonitor,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let worker = SessionWorker {
            fetcher,
            connectivity,
            options,
            tx: tx.clone(),
            events: events_tx,
            gifs: Vec::new(),
            committed: None,
            generation: 0,
            pending_timer: None,
            is_fetching: false,
        };
        tokio::spawn(worker.run(rx));
        (Self { tx }, events_rx)
    }

    pub fn text_changed(&self, text: impl Into<String>) {
        let _ = self.tx.send(SessionMsg::TextChanged(text.into()));
    }

    pub fn scrolled_near_bottom(&self) {
        let _ = self.tx.send(SessionMsg::ScrolledNearBottom);
    }

    /// URL of the result at `index`, for full-detail display.
    pub async fn selected_gif(&self, index: usize) -> Option<String> {
        let (reply, response) = oneshot::channel();
        self.tx.send(SessionMsg::Selected { index, reply }).ok()?;
        response.await.ok().flatten()
    }
}

struct SessionWorker {
    fetcher: Arc<dyn GifFetcher>,
    connectivity: ConnectivityMonitor,
    options: SessionOptions,
    /// Sender the debounce timers and fetch workers use to hop back onto
    /// this task; no state is touched anywhere else.
    tx: mpsc::UnboundedSender<SessionMsg>,
    events: mpsc::UnboundedSender<SessionEvent>,
    gifs: Vec<Gif>,
    /// Query whose results are displayed or in flight. `None` while typing.
    committed: Option<String>,
    /// Bumped on every keystroke; a debounce task only fires if its
    /// generation still matches.
    generation: u64,
    pending_timer: Option<AbortHandle>,
    is_fetching: bool,
}

impl SessionWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionMsg>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        debug!("Search session shut down");
    }

    fn handle(&mut self, msg: SessionMsg) {
        match msg {
            SessionMsg::TextChanged(text) => self.on_text_changed(text),
            SessionMsg::DebounceFired { generation, text } => {
                self.on_debounce_fired(generation, text)
            }
            SessionMsg::ScrolledNearBottom => self.on_scrolled_near_bottom(),
            SessionMsg::FetchDone { tag, result } => self.on_fetch_done(tag, result),
            SessionMsg::Selected { index, reply } => {
                let _ = reply.send(self.gifs.get(index).map(|gif| gif.url.clone()));
            }
        }
    }

    fn on_text_changed(&mut self, text: String) {
        // If there was a waiting search, cancel it
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.committed = None;

        // Clear errors and the current GIFs before the new search
        self.gifs.clear();
        self.emit(SessionEvent::ResultsChanged(Vec::new()));
        self.emit(SessionEvent::ErrorChanged(None));

        if text.is_empty() {
            return;
        }

        let generation = self.generation;
        let delay = self.options.debounce;
        let tx = self.tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionMsg::DebounceFired { generation, text });
        });
        self.pending_timer = Some(timer.abort_handle());
    }

    fn on_debounce_fired(&mut self, generation: u64, text: String) {
        if generation != self.generation {
            // An aborted timer got its message out first; the newer
            // keystroke wins.
            return;
        }
        self.pending_timer = None;

        if text.chars().count() > MAX_QUERY_LEN {
            self.emit(SessionEvent::ErrorChanged(Some(SearchError::TooLong)));
            self.emit(SessionEvent::LoadingChanged(false));
            return;
        }
        if !self.connectivity.is_online() {
            self.emit(SessionEvent::ErrorChanged(Some(SearchError::NoConnectivity)));
            self.emit(SessionEvent::LoadingChanged(false));
            return;
        }

        self.committed = Some(text.clone());
        self.dispatch(text, 0);
    }

    fn on_scrolled_near_bottom(&mut self) {
        // Pagination continues the committed query from the current count;
        // without one there is nothing to continue.
        let Some(query) = self.committed.clone() else {
            return;
        };
        self.dispatch(query, self.gifs.len());
    }

    /// Starts one fetch on the blocking pool. At most one request is in
    /// flight; overlapping dispatches are dropped, not queued, and in-flight
    /// requests are never cancelled.
    fn dispatch(&mut self, query: String, offset: usize) {
        if self.is_fetching {
            debug!(
                "Dropping dispatch for '{}' at offset {}: fetch already in flight",
                query, offset
            );
            return;
        }
        self.is_fetching = true;
        self.emit(SessionEvent::LoadingChanged(true));

        let tag = RequestTag { query, offset };
        let fetcher = Arc::clone(&self.fetcher);
        let limit = self.options.limit.min(PAGE_LIMIT);
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = fetcher.search(&tag.query, limit, tag.offset);
            let _ = tx.send(SessionMsg::FetchDone { tag, result });
        });
    }

    fn on_fetch_done(&mut self, tag: RequestTag, result: Result<Vec<Gif>, GiphyError>) {
        self.is_fetching = false;
        self.emit(SessionEvent::LoadingChanged(false));

        if self.committed.as_deref() != Some(tag.query.as_str()) {
            info!(
                "Discarding results for '{}': query no longer active",
                tag.query
            );
            return;
        }

        match result {
            Ok(batch) => {
                if tag.offset == 0 {
                    self.gifs = batch;
                } else {
                    self.gifs.extend(batch);
                }
                self.emit(SessionEvent::ResultsChanged(self.gifs.clone()));
            }
            Err(GiphyError::MissingApiKey) => {
                error!("Search for '{}' aborted: no API key configured", tag.query);
                self.emit(SessionEvent::ErrorChanged(Some(SearchError::MissingApiKey)));
            }
            Err(err) => {
                // Transport and parse failures leave the current list alone;
                // the user retries by typing or scrolling again.
                error!(
                    "Search for '{}' at offset {} failed: {}",
                    tag.query, tag.offset, err
                );
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
