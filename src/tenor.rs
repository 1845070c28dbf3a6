use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::error::GatewayError;

// --- Query types ---

/// Which endpoint a query goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
  #[default]
  Search,
  Trending,
}

impl Mode {
  pub fn label(self) -> &'static str {
    match self {
      Mode::Search => "search",
      Mode::Trending => "trending",
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "trending" | "featured" => Mode::Trending,
      _ => Mode::Search,
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      Mode::Search => Mode::Trending,
      Mode::Trending => Mode::Search,
    }
  }

  fn endpoint(self) -> &'static str {
    match self {
      Mode::Search => &constants().search_url,
      Mode::Trending => &constants().featured_url,
    }
  }
}

/// Moderation level, passed through as `contentfilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFilter {
  #[default]
  Off,
  Low,
  Medium,
  High,
}

impl ContentFilter {
  pub const ALL: [ContentFilter; 4] = [ContentFilter::Off, ContentFilter::Low, ContentFilter::Medium, ContentFilter::High];

  pub fn label(self) -> &'static str {
    match self {
      ContentFilter::Off => "off",
      ContentFilter::Low => "low",
      ContentFilter::Medium => "medium",
      ContentFilter::High => "high",
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "low" => ContentFilter::Low,
      "medium" => ContentFilter::Medium,
      "high" => ContentFilter::High,
      _ => ContentFilter::Off,
    }
  }

  /// Step through `ALL`, wrapping at either end.
  pub fn cycled(self, forward: bool) -> Self {
    let len = Self::ALL.len();
    let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
    let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
    Self::ALL[next]
  }
}

/// Ordinary GIFs or stickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultKind {
  #[default]
  Media,
  Sticker,
}

impl ResultKind {
  pub fn label(self) -> &'static str {
    match self {
      ResultKind::Media => "gif",
      ResultKind::Sticker => "sticker",
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "sticker" => ResultKind::Sticker,
      _ => ResultKind::Media,
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      ResultKind::Media => ResultKind::Sticker,
      ResultKind::Sticker => ResultKind::Media,
    }
  }
}

/// Everything needed to ask for one page, apart from the position marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryParameters {
  pub credential: String,
  pub mode: Mode,
  pub query_text: String,
  pub content_filter: ContentFilter,
  pub result_kind: ResultKind,
}

// --- Requests ---

/// A fully-formed request: endpoint plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
  pub endpoint: String,
  pub params: Vec<(&'static str, String)>,
}

impl PageRequest {
  pub fn build(query: &QueryParameters, position: Option<&str>) -> Self {
    let c = constants();
    let mut params = vec![
      ("key", query.credential.clone()),
      ("client_key", c.client_key.clone()),
      ("limit", c.page_size.to_string()),
      ("contentfilter", query.content_filter.label().to_string()),
      ("media_filter", c.media_filter.clone()),
    ];
    if query.result_kind == ResultKind::Sticker {
      params.push(("searchfilter", c.sticker_search_filter.clone()));
    }
    if query.mode == Mode::Search {
      params.push(("q", query.query_text.clone()));
    }
    if let Some(pos) = position.filter(|p| !p.is_empty()) {
      params.push(("pos", pos.to_string()));
    }
    Self { endpoint: query.mode.endpoint().to_string(), params }
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str())
  }

  pub fn url(&self) -> Result<Url, GatewayError> {
    Url::parse_with_params(&self.endpoint, &self.params).map_err(|e| GatewayError::Transport(e.to_string()))
  }
}

// --- Responses ---

/// One entry of `results`, as the service sent it. Each field is read on its
/// own, so an odd sibling never costs the item its usable rendition.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
  content_description: Option<String>,
  itemurl: Option<String>,
  media_formats: Map<String, Value>,
}

/// Something the renderer can draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
  pub display_url: String,
  pub alt_text: String,
  /// Tenor page for the item, if the service sent one.
  pub item_url: Option<String>,
}

impl RawItem {
  /// `None` unless `v` is an object. Ill-typed fields read as absent.
  pub fn from_value(v: Value) -> Option<Self> {
    let Value::Object(mut entry) = v else { return None };
    let text = |field: Option<Value>| match field {
      Some(Value::String(s)) => Some(s),
      _ => None,
    };
    let media_formats = match entry.remove("media_formats") {
      Some(Value::Object(formats)) => formats,
      _ => Map::new(),
    };
    Some(Self {
      content_description: text(entry.remove("content_description")),
      itemurl: text(entry.remove("itemurl")),
      media_formats,
    })
  }

  /// URL of the first rendition in preference order that actually carries one.
  fn preferred_url(&self) -> Option<&str> {
    constants()
      .rendition_preference
      .iter()
      .filter_map(|name| self.media_formats.get(name))
      .filter_map(|r| r.get("url").and_then(Value::as_str))
      .find(|url| !url.is_empty())
  }

  /// `None` when the item has no usable rendition. An empty description falls
  /// back to `fallback_alt`; any other description is used as sent.
  pub fn to_media_item(&self, fallback_alt: &str) -> Option<MediaItem> {
    let display_url = self.preferred_url()?.to_string();
    let alt_text = self.content_description.as_deref().filter(|s| !s.is_empty()).unwrap_or(fallback_alt).to_string();
    let item_url = self.itemurl.clone().filter(|u| !u.is_empty());
    Some(MediaItem { display_url, alt_text, item_url })
  }
}

/// A decoded page. `raw_count` counts every entry in `results`, including ones
/// that could not be read as items.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
  pub raw_count: usize,
  pub items: Vec<RawItem>,
  pub next: Option<String>,
}

impl RawPage {
  /// Missing or ill-typed fields yield an empty page rather than an error.
  pub fn from_value(body: Value) -> Self {
    let Value::Object(mut body) = body else {
      warn!("tenor: response body is not an object; treating as empty");
      return Self::default();
    };

    let next = match body.remove("next") {
      Some(Value::String(s)) if !s.is_empty() => Some(s),
      _ => None,
    };

    let results = match body.remove("results") {
      Some(Value::Array(results)) => results,
      Some(other) => {
        warn!(kind = json_kind(&other), "tenor: `results` is not an array; treating as empty");
        Vec::new()
      }
      None => {
        warn!("tenor: response has no `results`; treating as empty");
        Vec::new()
      }
    };

    let raw_count = results.len();
    let items = results
      .into_iter()
      .filter_map(|v| {
        let kind = json_kind(&v);
        let item = RawItem::from_value(v);
        if item.is_none() {
          debug!(kind, "tenor: skipping result that is not an object");
        }
        item
      })
      .collect();

    Self { raw_count, items, next }
  }

  pub fn media_items(&self, fallback_alt: &str) -> Vec<MediaItem> {
    self.items.iter().filter_map(|item| item.to_media_item(fallback_alt)).collect()
  }
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

// --- Gateway ---

/// Performs exactly one network call per request.
pub trait SearchGateway: Send + Sync + 'static {
  fn fetch_page(&self, request: PageRequest) -> impl Future<Output = Result<RawPage, GatewayError>> + Send;

  /// Download and decode the preview image behind a rendition URL.
  fn fetch_preview(&self, url: &str) -> impl Future<Output = Result<DynamicImage>> + Send;
}

/// Build the shared HTTP client with the configured request timeout.
pub fn build_http_client() -> Result<Client> {
  Client::builder()
    .timeout(Duration::from_secs(constants().request_timeout_secs))
    .build()
    .context("Failed to build HTTP client")
}

#[derive(Clone)]
pub struct TenorClient {
  http: Client,
}

impl TenorClient {
  pub fn new(http: Client) -> Self {
    Self { http }
  }
}

impl SearchGateway for TenorClient {
  async fn fetch_page(&self, request: PageRequest) -> Result<RawPage, GatewayError> {
    let url = request.url()?;
    debug!(endpoint = %request.endpoint, pos = request.param("pos").unwrap_or(""), "tenor: fetching page");

    // `without_url` keeps the API key out of error text.
    let response = self.http.get(url).send().await.map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
      warn!(status = status.as_u16(), "tenor: request rejected");
      return Err(GatewayError::Status(status.as_u16()));
    }

    let body: Value = response.json().await.map_err(|e| GatewayError::Decode(e.without_url().to_string()))?;
    Ok(RawPage::from_value(body))
  }

  async fn fetch_preview(&self, url: &str) -> Result<DynamicImage> {
    fetch_thumbnail(&self.http, url).await
  }
}

/// Download a rendition and decode its first frame.
async fn fetch_thumbnail(client: &Client, url: &str) -> Result<DynamicImage> {
  let response = client.get(url).send().await.with_context(|| format!("Failed to request thumbnail {}", url))?;
  if !response.status().is_success() {
    return Err(anyhow!("Thumbnail request for {} failed with HTTP {}", url, response.status().as_u16()));
  }
  let bytes = response.bytes().await.with_context(|| format!("Failed to read thumbnail bytes from {}", url))?;
  image::load_from_memory(&bytes).with_context(|| format!("Failed to decode thumbnail (URL: {})", url))
}

#[cfg(test)]
pub mod fake {
  use super::*;
  use image::{Rgb, RgbImage};
  use serde_json::json;
  use std::sync::Mutex;

  /// Serves canned pages keyed by (query text, position marker) and records
  /// every request. Previews are a 1x1 image; nothing touches the network.
  #[derive(Default)]
  pub struct FakeGateway {
    pages: Mutex<std::collections::HashMap<(String, Option<String>), Result<RawPage, GatewayError>>>,
    requests: Mutex<Vec<PageRequest>>,
  }

  impl FakeGateway {
    pub fn page(&self, q: &str, pos: Option<&str>, result: Result<RawPage, GatewayError>) {
      self.pages.lock().unwrap().insert((q.to_string(), pos.map(str::to_string)), result);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
      self.requests.lock().unwrap().clone()
    }
  }

  impl SearchGateway for FakeGateway {
    async fn fetch_page(&self, request: PageRequest) -> Result<RawPage, GatewayError> {
      self.requests.lock().unwrap().push(request.clone());
      let key = (request.param("q").unwrap_or("").to_string(), request.param("pos").map(str::to_string));
      self.pages.lock().unwrap().get(&key).cloned().unwrap_or(Err(GatewayError::Status(404)))
    }

    async fn fetch_preview(&self, _url: &str) -> Result<DynamicImage> {
      Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]))))
    }
  }

  /// A page of items whose descriptions are `alts`, each with a tinygif.
  pub fn raw_page(alts: &[&str], next: Option<&str>) -> Result<RawPage, GatewayError> {
    let results: Vec<_> = alts
      .iter()
      .map(|alt| json!({ "content_description": alt, "media_formats": { "tinygif": { "url": format!("https://m/{alt}.gif") } } }))
      .collect();
    Ok(RawPage::from_value(json!({ "results": results, "next": next })))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn search(q: &str) -> QueryParameters {
    QueryParameters {
      credential: "KEY".to_string(),
      mode: Mode::Search,
      query_text: q.to_string(),
      content_filter: ContentFilter::High,
      result_kind: ResultKind::Media,
    }
  }

  // --- PageRequest::build ---

  #[test]
  fn search_request_carries_fixed_params_and_query() {
    let req = PageRequest::build(&search("cat"), None);
    assert_eq!(req.endpoint, constants().search_url);
    assert_eq!(req.param("key"), Some("KEY"));
    assert_eq!(req.param("client_key"), Some("tenor-tester-front-only"));
    assert_eq!(req.param("limit"), Some("50"));
    assert_eq!(req.param("contentfilter"), Some("high"));
    assert_eq!(req.param("media_filter"), Some("minimal"));
    assert_eq!(req.param("q"), Some("cat"));
    assert_eq!(req.param("searchfilter"), None);
    assert_eq!(req.param("pos"), None);
  }

  #[test]
  fn trending_request_omits_query_text() {
    let mut query = search("ignored");
    query.mode = Mode::Trending;
    let req = PageRequest::build(&query, None);
    assert_eq!(req.endpoint, constants().featured_url);
    assert_eq!(req.param("q"), None);
  }

  #[test]
  fn sticker_kind_adds_search_filter() {
    let mut query = search("cat");
    query.result_kind = ResultKind::Sticker;
    let req = PageRequest::build(&query, None);
    assert_eq!(req.param("searchfilter"), Some("sticker"));
  }

  #[test]
  fn position_marker_only_when_present() {
    let req = PageRequest::build(&search("cat"), Some("CUR1"));
    assert_eq!(req.param("pos"), Some("CUR1"));
    let req = PageRequest::build(&search("cat"), Some(""));
    assert_eq!(req.param("pos"), None);
  }

  #[test]
  fn url_encodes_query_text() {
    let url = PageRequest::build(&search("cats & dogs"), None).url().unwrap();
    assert!(url.as_str().starts_with("https://tenor.googleapis.com/v2/search?"));
    assert!(url.query().unwrap().contains("q=cats+%26+dogs"));
  }

  // --- RawPage::from_value ---

  #[test]
  fn page_reads_results_and_next() {
    let page = RawPage::from_value(json!({
      "results": [{ "media_formats": { "gif": { "url": "https://g/a.gif" } } }],
      "next": "CUR1"
    }));
    assert_eq!(page.raw_count, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.next.as_deref(), Some("CUR1"));
  }

  #[test]
  fn empty_or_null_next_is_absent() {
    assert_eq!(RawPage::from_value(json!({ "results": [], "next": "" })).next, None);
    assert_eq!(RawPage::from_value(json!({ "results": [], "next": null })).next, None);
  }

  #[test]
  fn malformed_body_is_an_empty_page() {
    let page = RawPage::from_value(json!({ "error": "nope" }));
    assert_eq!(page.raw_count, 0);
    assert!(page.next.is_none());

    let page = RawPage::from_value(json!({ "results": "oops", "next": 5 }));
    assert_eq!(page.raw_count, 0);
    assert!(page.next.is_none());

    let page = RawPage::from_value(json!([1, 2, 3]));
    assert_eq!(page.raw_count, 0);
  }

  #[test]
  fn unreadable_items_still_count() {
    let page = RawPage::from_value(json!({ "results": [42, { "media_formats": {} }] }));
    assert_eq!(page.raw_count, 2);
    assert_eq!(page.items.len(), 1);
    assert!(page.media_items("x").is_empty());
  }

  // --- media selection ---

  fn item(formats: Value, description: Option<&str>) -> RawItem {
    RawItem::from_value(json!({
      "content_description": description,
      "itemurl": "https://tenor.com/view/x",
      "media_formats": formats,
    }))
    .unwrap()
  }

  #[test]
  fn prefers_tinygif_over_others() {
    let it = item(
      json!({
        "preview": { "url": "p" },
        "gif": { "url": "g" },
        "tinygif": { "url": "t" },
      }),
      Some("a cat"),
    );
    let media = it.to_media_item("cat").unwrap();
    assert_eq!(media.display_url, "t");
    assert_eq!(media.alt_text, "a cat");
    assert_eq!(media.item_url.as_deref(), Some("https://tenor.com/view/x"));
  }

  #[test]
  fn falls_through_to_preview() {
    let it = item(json!({ "mp4": { "url": "m" }, "preview": { "url": "p" } }), None);
    assert_eq!(it.to_media_item("cat").unwrap().display_url, "p");
  }

  #[test]
  fn skips_renditions_without_url() {
    let it = item(json!({ "tinygif": {}, "mediumgif": { "url": "mg" } }), None);
    assert_eq!(it.to_media_item("cat").unwrap().display_url, "mg");
  }

  #[test]
  fn item_without_any_rendition_is_dropped() {
    let it = item(json!({ "mp4": { "url": "m" } }), Some("x"));
    assert!(it.to_media_item("cat").is_none());
  }

  #[test]
  fn empty_description_uses_fallback() {
    let it = item(json!({ "gif": { "url": "g" } }), Some(""));
    assert_eq!(it.to_media_item("Trending").unwrap().alt_text, "Trending");
    let it = item(json!({ "gif": { "url": "g" } }), None);
    assert_eq!(it.to_media_item("cat").unwrap().alt_text, "cat");
  }

  #[test]
  fn whitespace_description_is_kept_as_sent() {
    let it = item(json!({ "gif": { "url": "g" } }), Some("  "));
    assert_eq!(it.to_media_item("Trending").unwrap().alt_text, "  ");
  }

  #[test]
  fn null_sibling_rendition_does_not_drop_item() {
    let page = RawPage::from_value(json!({
      "results": [{ "content_description": "a", "media_formats": { "tinygif": { "url": "t" }, "webp": null } }]
    }));
    let media = page.media_items("x");
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].display_url, "t");
    assert_eq!(media[0].alt_text, "a");
  }

  #[test]
  fn ill_typed_fields_read_as_absent() {
    let page = RawPage::from_value(json!({
      "results": [{
        "content_description": 5,
        "itemurl": ["nope"],
        "media_formats": { "tinygif": { "url": 7 }, "gif": "oops", "mediumgif": { "url": "mg" } }
      }]
    }));
    let media = page.media_items("x");
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].display_url, "mg");
    assert_eq!(media[0].alt_text, "x");
    assert_eq!(media[0].item_url, None);
  }

  #[test]
  fn non_object_media_formats_yields_no_rendition() {
    let page = RawPage::from_value(json!({ "results": [{ "media_formats": null }] }));
    assert_eq!(page.raw_count, 1);
    assert_eq!(page.items.len(), 1);
    assert!(page.media_items("x").is_empty());
  }

  // --- enums ---

  #[test]
  fn mode_from_config() {
    assert_eq!(Mode::from_config("trending"), Mode::Trending);
    assert_eq!(Mode::from_config("Search"), Mode::Search);
    assert_eq!(Mode::from_config("bogus"), Mode::Search);
  }

  #[test]
  fn content_filter_cycles_both_ways() {
    assert_eq!(ContentFilter::Off.cycled(true), ContentFilter::Low);
    assert_eq!(ContentFilter::High.cycled(true), ContentFilter::Off);
    assert_eq!(ContentFilter::Off.cycled(false), ContentFilter::High);
    assert_eq!(ContentFilter::from_config("MEDIUM"), ContentFilter::Medium);
    assert_eq!(ContentFilter::from_config(""), ContentFilter::Off);
  }

  #[test]
  fn result_kind_labels_round_trip() {
    for kind in [ResultKind::Media, ResultKind::Sticker] {
      assert_eq!(ResultKind::from_config(kind.label()), kind);
    }
  }
}
