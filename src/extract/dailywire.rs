//! Daily Wire shows.
//!
//! There is no RSS feed to start from. The episode list comes from the
//! site's middleware API, and each episode's (signed, expiring) video URL is
//! read from the Next.js data endpoint, which is keyed by the build
//! identifier of the currently deployed site.

use std::collections::HashMap;

use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use url::form_urlencoded;

use super::{parse_selector, Enclosure, ExtractError, Extraction, Extractor};
use crate::feed::timestamp::{normalize_timestamp, now_timestamp};
use crate::feed::{FeedDocument, HttpClient};
use crate::util::validate_url;
use crate::xml::{link_element, text_element, Element};

pub const API_BASE: &str = "https://middleware-prod.dailywire.com";
pub const SITE_BASE: &str = "https://www.dailywire.com";
pub const REFERER: &str = SITE_BASE;

const ICON_URL: &str = "https://www.dailywire.com/favicons/apple-touch-icon-57x57.png";
const HLS_MIME_TYPE: &str = "application/x-mpegURL";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Episode {
    id: Option<Value>,
    slug: Option<String>,
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    scheduled_at: Option<String>,
    #[serde(rename = "sharingURL")]
    sharing_url: Option<String>,
}

/// Builds a show's feed and resolves a video enclosure for each episode.
///
/// [`DailyWire::build_feed`] must run first: it records the build identifier
/// and each entry's episode slug, which [`Extractor::extract`] needs.
#[derive(Debug, Clone)]
pub struct DailyWire {
    show: String,
    api_base: String,
    site_base: String,
    build_id: Option<String>,
    slugs: HashMap<String, String>,
}

impl DailyWire {
    /// `show` is the display name or the slug; "Ben After Dark" and
    /// "ben-after-dark" refer to the same show.
    pub fn new(show: impl Into<String>) -> Self {
        Self::with_bases(show, API_BASE, SITE_BASE)
    }

    /// Same as [`DailyWire::new`] with the API and site hosts replaced.
    pub fn with_bases(
        show: impl Into<String>,
        api_base: impl Into<String>,
        site_base: impl Into<String>,
    ) -> Self {
        Self {
            show: show.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            site_base: site_base.into().trim_end_matches('/').to_string(),
            build_id: None,
            slugs: HashMap::new(),
        }
    }

    /// Lowercased show name with spaces replaced by `-`.
    pub fn slug(&self) -> String {
        self.show.trim().replace(' ', "-").to_lowercase()
    }

    /// Fetches the episode list and the build identifier and returns the
    /// show as an Atom feed without enclosures.
    ///
    /// A missing or malformed episode list and an unresolvable build
    /// identifier are fatal. Episodes without a slug, title, link or
    /// timestamp are left out.
    pub async fn build_feed(&mut self, client: &HttpClient) -> Result<FeedDocument, ExtractError> {
        let slug = self.slug();
        let list_url = format!(
            "{}/middleware/v4/getShowEpisodesWeb?slug={}",
            self.api_base,
            encode(&slug)
        );
        let list: Value = client.fetch_json(&list_url).await?;
        let items = list
            .get("componentItems")
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractError::MissingField {
                field: "componentItems",
                url: list_url.clone(),
            })?;

        let show_url = format!("{}/show/{}", self.site_base, encode(&slug));
        let page = client.fetch_page(&show_url).await?;
        let build_id = find_build_id(&page).ok_or_else(|| ExtractError::MissingField {
            field: "buildId",
            url: show_url,
        })?;
        tracing::debug!(build_id = %build_id, "Resolved site build id");
        self.build_id = Some(build_id);

        let mut feed = self.feed_header();
        self.slugs.clear();
        for item in items {
            let Some(episode) = item.get("showEpisode") else {
                tracing::info!("Skipping list item without showEpisode");
                continue;
            };
            let episode = match Episode::deserialize(episode) {
                Ok(episode) => episode,
                Err(e) => {
                    tracing::info!(error = %e, "Skipping malformed episode");
                    continue;
                }
            };
            if let Some((entry, slug)) = episode_entry(episode) {
                if let Some(id) = entry.child_text("id") {
                    self.slugs.insert(id, slug);
                }
                feed.push_entry(entry);
            }
        }

        tracing::info!(show = %self.show, episodes = feed.entry_count(), "Built episode feed");
        Ok(feed)
    }

    fn feed_header(&self) -> FeedDocument {
        let name = self.show.trim();
        let mut feed = FeedDocument::new_atom();
        let root = feed.root_mut();
        root.push(text_element("title", name));
        root.push(text_element(
            "id",
            format!("{SITE_BASE}/show/{}", encode(&name.replace(' ', "-"))),
        ));
        root.push(text_element("updated", now_timestamp()));
        root.push(
            text_element("generator", env!("CARGO_PKG_NAME"))
                .with_attr("version", env!("CARGO_PKG_VERSION")),
        );
        root.push(text_element("icon", ICON_URL));
        feed
    }

    async fn video_url(&self, client: &HttpClient, slug: &str) -> Result<String, ExtractError> {
        let build_id = self.build_id.as_deref().ok_or_else(|| ExtractError::MissingField {
            field: "buildId",
            url: format!("{}/show/{}", self.site_base, encode(&self.slug())),
        })?;
        let data_url = format!(
            "{}/_next/data/{}/episode/{}.json",
            self.site_base,
            build_id,
            encode(slug)
        );
        let data: Value = client.fetch_json(&data_url).await?;
        let video = data
            .pointer("/pageProps/v4EpisodeData/videoURL")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractError::MissingField {
                field: "videoURL",
                url: data_url.clone(),
            })?
            .trim();

        if video.eq_ignore_ascii_case("access denied") {
            return Err(ExtractError::AccessDenied(slug.to_string()));
        }
        validate_url(video)
            .map(|url| url.to_string())
            .map_err(|_| ExtractError::InvalidMedia(video.to_string()))
    }
}

#[async_trait]
impl Extractor for DailyWire {
    fn name(&self) -> &str {
        "dailywire"
    }

    async fn extract(
        &self,
        client: &HttpClient,
        entry: &Element,
    ) -> Result<Extraction, ExtractError> {
        let slug = entry
            .child_text("id")
            .and_then(|id| self.slugs.get(&id))
            .ok_or_else(|| ExtractError::MissingField {
                field: "slug",
                url: self.slug(),
            })?;
        let video = self.video_url(client, slug).await?;
        Ok(Extraction {
            body: None,
            enclosure: Some(
                Enclosure::new(video)
                    .with_type(HLS_MIME_TYPE)
                    .with_title("Video"),
            ),
        })
    }
}

/// Maps an episode to `<entry>` plus its slug.
fn episode_entry(episode: Episode) -> Option<(Element, String)> {
    let label = episode.title.clone().unwrap_or_default();
    let Some(slug) = episode.slug.filter(|s| !s.trim().is_empty()) else {
        tracing::info!(episode = %label, "Skipping episode without slug");
        return None;
    };
    let title = episode.title.filter(|t| !t.trim().is_empty());
    let link = episode.sharing_url.filter(|l| !l.trim().is_empty());
    let updated = episode
        .published_at
        .or(episode.scheduled_at)
        .filter(|u| !u.trim().is_empty());
    let (Some(title), Some(link), Some(updated)) = (title, link, updated) else {
        tracing::info!(slug = %slug, "Skipping episode missing title, link or timestamp");
        return None;
    };

    let id = match episode.id {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => link.clone(),
    };

    let mut entry = Element::new("entry")
        .with_child(text_element("title", title))
        .with_child(link_element(link))
        .with_child(text_element("id", id))
        .with_child(text_element("updated", normalize_timestamp(&updated)));
    if let Some(description) = episode.description {
        entry.push(text_element("summary", description));
    }
    Some((entry, slug))
}

/// Reads the build identifier from the page's `__NEXT_DATA__` script, or
/// failing that, from the first `"buildId": "..."` pair anywhere in the text.
pub fn find_build_id(page: &str) -> Option<String> {
    next_data_build_id(page).or_else(|| scan_build_id(page))
}

fn next_data_build_id(page: &str) -> Option<String> {
    let selector = parse_selector("script#__NEXT_DATA__").ok()?;
    let document = Html::parse_document(page);
    let script = document.select(&selector).next()?;
    let text = script.text().collect::<String>();
    let data: Value = serde_json::from_str(text.trim()).ok()?;
    data.get("buildId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn scan_build_id(page: &str) -> Option<String> {
    const KEY: &str = "\"buildId\":";
    page.match_indices(KEY).find_map(|(idx, _)| {
        let rest = &page[idx + KEY.len()..];
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        let value = rest.strip_prefix('"')?;
        let end = value.find('"')?;
        Some(value[..end].to_string())
    })
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
