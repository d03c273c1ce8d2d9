use crate::network::get_url_bytes;
use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use std::io::Read;
use thiserror::Error;

// region: Structs & Enums
/// Why a sitemap could not be turned into a list of site URLs.
///
/// Each kind is fatal to a run; they are kept apart so a network outage is not
/// mistaken for a broken sitemap.
#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Failed to fetch sitemap {url}: {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },

    #[error("Failed to decode sitemap {url}: {source}")]
    Decode {
        url: String,
        source: std::io::Error,
    },

    #[error("Failed to parse sitemap {url}: {source}")]
    Parse {
        url: String,
        source: quick_xml::Error,
    },
}
// endregion

// region: Functions
/// Downloads the sitemap at `sitemap_url` and returns the text of every
/// `<loc>` element in document order.
pub async fn get_sitemap_urls(
    sitemap_url: &str,
    client: &Client,
) -> Result<Vec<String>, SitemapError> {
    let bytes = get_url_bytes(sitemap_url, client)
        .await
        .map_err(|source| SitemapError::Fetch {
            url: sitemap_url.to_string(),
            source,
        })?;
    tracing::debug!(url = sitemap_url, bytes = bytes.len(), "Fetched sitemap");

    let content = decode_body(sitemap_url, &bytes).map_err(|source| SitemapError::Decode {
        url: sitemap_url.to_string(),
        source,
    })?;

    extract_sitemap_urls(&content).map_err(|source| SitemapError::Parse {
        url: sitemap_url.to_string(),
        source,
    })
}

fn decode_body(url: &str, bytes: &[u8]) -> Result<String, std::io::Error> {
    if is_gzip_content(url, bytes) {
        return decompress_gzip(bytes);
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Whether a sitemap body is gzip compressed, judged by the URL suffix or the
/// gzip magic bytes.
pub fn is_gzip_content(url: &str, bytes: &[u8]) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(".gz") || bytes.starts_with(&[0x1f, 0x8b])
}

pub fn decompress_gzip(bytes: &[u8]) -> Result<String, std::io::Error> {
    let mut decoder = GzDecoder::new(bytes);
    let mut content = String::new();
    decoder.read_to_string(&mut content)?;
    Ok(content)
}

/// Extracts the text of all `<loc>` elements from a sitemap, or any other
/// markup that happens to contain them.
///
/// The root element is not checked and end tag names are not matched, so
/// loosely written HTML pages work as well. Entities are unescaped and
/// surrounding whitespace is trimmed; text with a stray `&` or an unknown
/// entity is taken verbatim. Returns an error for markup quick-xml cannot
/// tokenize.
pub fn extract_sitemap_urls(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    let mut urls = Vec::new();
    // Text collected for the `<loc>` element currently open, if any.
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"loc" => {
                current = Some(String::new());
            }
            Event::Text(ref e) => {
                if let Some(text) = current.as_mut() {
                    // Loose HTML may carry a bare `&`; keep such text as written.
                    match e.unescape() {
                        Ok(unescaped) => text.push_str(&unescaped),
                        Err(_) => text.push_str(&String::from_utf8_lossy(e)),
                    }
                }
            }
            Event::CData(ref e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"loc" => {
                if let Some(text) = current.take() {
                    urls.push(text.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(urls)
}
// endregion
