//! Query and pagination state.
//!
//! `Pager` owns the submitted query, the forward cursor and the history of
//! position markers. Each fetch runs in a spawned task and reports back through
//! a oneshot channel; the UI loop polls it with [`Pager::check_pending`].
//!
//! Only one fetch is in flight at a time. Forward/back navigation is ignored
//! while loading, and a new submission supersedes whatever is in flight. Every
//! fetch is tagged with the epoch it was started in and its result is dropped
//! if a newer query has been submitted since.

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::{GatewayError, PagerError};
use crate::tenor::{MediaItem, Mode, PageRequest, QueryParameters, RawPage, SearchGateway};

/// Draws whatever the pager tells it to. Holds no pagination state.
pub trait Renderer {
  fn show_status(&mut self, text: &str);
  /// Replaces any previously rendered items.
  fn render_items(&mut self, items: Vec<MediaItem>);
  fn set_nav_enabled(&mut self, prev: bool, next: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Loading,
  Ready,
  Errored,
}

/// What a successful fetch does to the history stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
  Fresh,
  Forward,
  Back,
}

type FetchResult = Result<RawPage, GatewayError>;

struct PendingFetch {
  epoch: u64,
  step: Step,
  marker: Option<String>,
  rx: oneshot::Receiver<FetchResult>,
  handle: JoinHandle<()>,
}

pub struct Pager<G, R> {
  gateway: Arc<G>,
  renderer: R,
  params: Option<QueryParameters>,
  /// Marker that fetched the page on screen; `None` for the first page.
  position: Option<String>,
  /// Cursor for the page after the one on screen.
  cursor: Option<String>,
  /// Markers of the pages behind this one. `""` stands for the first page.
  history: Vec<String>,
  phase: Phase,
  epoch: u64,
  pending: Option<PendingFetch>,
}

impl<G: SearchGateway, R: Renderer> Pager<G, R> {
  pub fn new(gateway: Arc<G>, renderer: R) -> Self {
    Self {
      gateway,
      renderer,
      params: None,
      position: None,
      cursor: None,
      history: Vec::new(),
      phase: Phase::Idle,
      epoch: 0,
      pending: None,
    }
  }

  pub fn renderer(&self) -> &R {
    &self.renderer
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn is_loading(&self) -> bool {
    self.pending.is_some()
  }

  #[cfg(test)]
  pub fn cursor(&self) -> Option<&str> {
    self.cursor.as_deref()
  }

  pub fn history(&self) -> &[String] {
    &self.history
  }

  pub fn params(&self) -> Option<&QueryParameters> {
    self.params.as_ref()
  }

  pub fn can_go_next(&self) -> bool {
    self.navigable() && self.cursor.is_some()
  }

  pub fn can_go_prev(&self) -> bool {
    self.navigable() && !self.history.is_empty()
  }

  fn navigable(&self) -> bool {
    self.params.is_some() && self.pending.is_none() && self.phase == Phase::Ready
  }

  /// Start a new epoch with `params` and fetch its first page.
  ///
  /// Validation failures make no request and leave the current epoch alone.
  pub fn submit_new_query(&mut self, params: QueryParameters) -> Result<(), PagerError> {
    let validation = if params.credential.trim().is_empty() {
      Err(PagerError::MissingCredential)
    } else if params.mode == Mode::Search && params.query_text.trim().is_empty() {
      Err(PagerError::MissingQuery)
    } else {
      Ok(())
    };
    if let Err(e) = validation {
      debug!(err = %e, "pager: rejected submission");
      self.renderer.show_status(&e.to_string());
      return Err(e);
    }

    if let Some(stale) = self.pending.take() {
      debug!(epoch = stale.epoch, "pager: superseding in-flight fetch");
      stale.handle.abort();
    }

    self.epoch += 1;
    info!(epoch = self.epoch, mode = params.mode.label(), query = %params.query_text, "pager: new query");
    self.params = Some(params);
    self.position = None;
    self.cursor = None;
    self.history.clear();
    self.start_fetch(Step::Fresh, None);
    Ok(())
  }

  /// Fetch the page after the current one. Returns `false` if nothing was sent.
  pub fn next_page(&mut self) -> bool {
    if !self.can_go_next() {
      return false;
    }
    let marker = self.cursor.clone();
    self.start_fetch(Step::Forward, marker);
    true
  }

  /// Fetch the page before the current one. Returns `false` if nothing was sent.
  pub fn prev_page(&mut self) -> bool {
    if !self.can_go_prev() {
      return false;
    }
    let marker = self.history.last().filter(|m| !m.is_empty()).cloned();
    self.start_fetch(Step::Back, marker);
    true
  }

  fn start_fetch(&mut self, step: Step, marker: Option<String>) {
    let Some(params) = self.params.as_ref() else { return };
    let request = PageRequest::build(params, marker.as_deref());
    let mode = params.mode.label();

    self.phase = Phase::Loading;
    self.renderer.render_items(Vec::new());
    self.renderer.show_status(&format!("Loading... (limit={}, mode={})", constants().page_size, mode));
    self.renderer.set_nav_enabled(false, false);

    let gateway = Arc::clone(&self.gateway);
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      let _ = tx.send(gateway.fetch_page(request).await);
    });
    self.pending = Some(PendingFetch { epoch: self.epoch, step, marker, rx, handle });
  }

  /// Apply the in-flight fetch if it has finished. Returns the outcome of the
  /// fetch that was applied (the raw result count on success), if any.
  pub fn check_pending(&mut self) -> Option<Result<usize, PagerError>> {
    let mut pending = self.pending.take()?;
    let result = match pending.rx.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => {
        self.pending = Some(pending);
        return None;
      }
      Err(oneshot::error::TryRecvError::Closed) => Err(GatewayError::Transport("fetch task ended unexpectedly".to_string())),
    };
    self.complete(pending.epoch, pending.step, pending.marker, result)
  }

  /// Wait for the in-flight fetch, if any, and apply it.
  pub async fn settle(&mut self) -> Option<Result<usize, PagerError>> {
    let pending = self.pending.take()?;
    let result = pending
      .rx
      .await
      .unwrap_or_else(|_| Err(GatewayError::Transport("fetch task ended unexpectedly".to_string())));
    self.complete(pending.epoch, pending.step, pending.marker, result)
  }

  fn complete(
    &mut self,
    epoch: u64,
    step: Step,
    marker: Option<String>,
    result: FetchResult,
  ) -> Option<Result<usize, PagerError>> {
    if epoch != self.epoch {
      debug!(stale = epoch, current = self.epoch, "pager: dropping result from superseded query");
      return None;
    }
    let mode = self.params.as_ref().map_or(Mode::Search, |p| p.mode);

    let page = match result {
      Ok(page) => page,
      Err(e) => {
        warn!(err = %e, epoch, "pager: fetch failed");
        let e = PagerError::from(e);
        self.phase = Phase::Errored;
        self.renderer.show_status(&e.to_string());
        self.renderer.set_nav_enabled(false, false);
        return Some(Err(e));
      }
    };

    match step {
      Step::Fresh => {}
      Step::Forward => self.history.push(self.position.take().unwrap_or_default()),
      Step::Back => {
        self.history.pop();
      }
    }
    self.position = marker;
    self.cursor = page.next.clone();

    let fallback_alt = match self.params.as_ref() {
      Some(p) if p.mode == Mode::Search && !p.query_text.is_empty() => p.query_text.as_str(),
      _ => "Trending",
    };
    let items = page.media_items(fallback_alt);
    debug!(raw = page.raw_count, shown = items.len(), depth = self.history.len(), "pager: page applied");

    if page.raw_count == 0 {
      self.renderer.show_status(&format!("No results (mode={})", mode.label()));
    } else {
      self.renderer.show_status(&format!("Found {} items (mode={})", page.raw_count, mode.label()));
    }
    self.renderer.render_items(items);
    self.phase = Phase::Ready;
    self.renderer.set_nav_enabled(!self.history.is_empty(), self.cursor.is_some());
    Some(Ok(page.raw_count))
  }
}
