use crate::PreviewInfo;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Response of an oEmbed endpoint. Every field is optional in practice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OEmbedResponse {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub provider_name: Option<String>,
    pub provider_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub html: Option<String>,
}

/// What one HTML document yields: the page metadata and, if the page
/// advertises one, its oEmbed endpoint.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub info: PreviewInfo,
    pub oembed_endpoint: Option<Url>,
}

/// Metadata extractor, responsible for extracting preview information from webpage content
#[derive(Clone)]
pub struct MetadataExtractor;

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str, page_url: &Url) -> Extracted {
        let document = Html::parse_document(html);

        let info = PreviewInfo {
            kind: Some("link".to_string()),
            url: self
                .extract_canonical(&document, page_url)
                .or_else(|| Some(page_url.to_string())),
            title: self.extract_title(&document),
            description: self.extract_description(&document),
            thumbnail_url: self
                .extract_image(&document)
                .and_then(|src| absolutize(page_url, &src)),
            provider_name: self.extract_site_name(&document),
            provider_url: host_root(page_url),
            favicon_url: self
                .extract_favicon(&document)
                .and_then(|href| absolutize(page_url, &href))
                .or_else(|| page_url.join("/favicon.ico").ok().map(String::from)),
            ..Default::default()
        };
        let oembed_endpoint = self
            .extract_oembed_link(&document)
            .and_then(|href| page_url.join(&href).ok());

        debug!(
            title = ?info.title,
            oembed = ?oembed_endpoint.as_ref().map(Url::as_str),
            "Extracted page metadata"
        );
        Extracted {
            info,
            oembed_endpoint,
        }
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        let og_title_selector =
            Selector::parse("meta[property='og:title'],meta[name='twitter:title']").ok()?;
        let title_selector = Selector::parse("title").ok()?;

        let og_title = document
            .select(&og_title_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.to_string());

        // If there is no Open Graph title, try to get the regular title
        og_title
            .or_else(|| {
                document
                    .select(&title_selector)
                    .next()
                    .map(|el| el.text().collect::<String>())
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_description(&self, document: &Html) -> Option<String> {
        let og_desc_selector = Selector::parse(
            "meta[property='og:description'],meta[name='twitter:description']",
        )
        .ok()?;
        let meta_desc_selector = Selector::parse("meta[name='description']").ok()?;

        document
            .select(&og_desc_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .or_else(|| {
                document
                    .select(&meta_desc_selector)
                    .next()
                    .and_then(|el| el.value().attr("content"))
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_image(&self, document: &Html) -> Option<String> {
        let og_image_selector = Selector::parse(
            "meta[property='og:image'],meta[name='twitter:image'],meta[itemprop='image']",
        )
        .ok()?;

        document
            .select(&og_image_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
    }

    fn extract_favicon(&self, document: &Html) -> Option<String> {
        let favicon_selector =
            Selector::parse("link[rel='icon'], link[rel='shortcut icon']").ok()?;

        document
            .select(&favicon_selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|s| s.trim().to_string())
    }

    fn extract_site_name(&self, document: &Html) -> Option<String> {
        let og_site_selector = Selector::parse("meta[property='og:site_name']").ok()?;

        document
            .select(&og_site_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
    }

    fn extract_canonical(&self, document: &Html, page_url: &Url) -> Option<String> {
        let selector = Selector::parse("meta[property='og:url'],link[rel='canonical']").ok()?;

        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content").or_else(|| el.value().attr("href")))
            .and_then(|s| absolutize(page_url, s.trim()))
    }

    fn extract_oembed_link(&self, document: &Html) -> Option<String> {
        let selector = Selector::parse("link[type='application/json+oembed']").ok()?;

        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|s| s.trim().to_string())
    }

    /// Overlays oEmbed data on page metadata; oEmbed wins where it has a value.
    pub fn merge_oembed(&self, mut info: PreviewInfo, oembed: OEmbedResponse) -> PreviewInfo {
        info.kind = oembed.kind.or(info.kind);
        info.title = oembed.title.or(info.title);
        info.author_name = oembed.author_name.or(info.author_name);
        info.author_url = oembed.author_url.or(info.author_url);
        info.provider_name = oembed.provider_name.or(info.provider_name);
        info.provider_url = oembed.provider_url.or(info.provider_url);
        info.thumbnail_url = oembed.thumbnail_url.or(info.thumbnail_url);
        info.thumbnail_width = oembed.thumbnail_width.or(info.thumbnail_width);
        info.thumbnail_height = oembed.thumbnail_height.or(info.thumbnail_height);
        info.width = oembed.width.or(info.width);
        info.height = oembed.height.or(info.height);
        info.html = oembed.html.or(info.html);
        // For photos the oEmbed url is the image itself, not the page.
        if info.kind.as_deref() == Some("photo") {
            info.url = oembed.url.or(info.url);
        }
        info
    }
}

fn absolutize(base: &Url, reference: &str) -> Option<String> {
    if reference.is_empty() {
        return None;
    }
    base.join(reference).ok().map(String::from)
}

fn host_root(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("{}://{host}{port}", url.scheme()))
}
