//! Cursor pagination over list endpoints
//!
//! List responses carry their records under a resource-specific key plus an
//! optional `links.pages.next` URL. [`paginate`] walks the pages in order and
//! returns one flat, ordered sequence. No de-duplication is performed; an
//! unstable backend listing passes through as-is.

use crate::digitalocean::error::ErrorShape;
use serde_json::Value;
use std::future::Future;
use url::Url;

/// One fetched response unit.
#[derive(Debug, Clone)]
pub struct Page {
    /// Records found under the result key; empty when the key is missing or null.
    pub items: Vec<Value>,
    /// Page number parsed from `links.pages.next`; `None` on the last page.
    pub next_page: Option<u32>,
}

/// Extract items and the next-page cursor from a raw list response.
///
/// A missing, `null`, or empty result key is a valid empty page. A next link
/// without a numeric `page` query parameter is a defect in the backend's
/// pagination contract and surfaces as an error.
pub fn parse_page(response: &Value, result_key: &str) -> Result<Page, ErrorShape> {
    let items = response
        .get(result_key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let next_page = match response
        .pointer("/links/pages/next")
        .and_then(|v| v.as_str())
    {
        Some(link) => Some(next_page_number(link)?),
        None => None,
    };

    Ok(Page { items, next_page })
}

/// Parse the `page` query parameter out of a next-page link.
pub fn next_page_number(link: &str) -> Result<u32, ErrorShape> {
    let url = Url::parse(link)
        .map_err(|e| ErrorShape::malformed(format!("unparseable next-page link {link:?}: {e}")))?;

    let page = url
        .query_pairs()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            ErrorShape::malformed(format!("next-page link {link:?} has no page parameter"))
        })?;

    page.parse::<u32>().map_err(|_| {
        ErrorShape::malformed(format!(
            "next-page link {link:?} has non-numeric page parameter {page:?}"
        ))
    })
}

/// Walk a list endpoint page by page, accumulating all items in order.
///
/// `fetch_page(n)` issues the request for page `n` (page numbering starts at
/// 1). An optional `limit` stops further page requests once satisfied,
/// trimming the final page's excess.
///
/// Any failure aborts the whole walk: accumulated partial results are
/// discarded and the caller sees only the error.
pub async fn paginate<F, Fut>(
    mut fetch_page: F,
    result_key: &str,
    limit: Option<usize>,
) -> Result<Vec<Value>, ErrorShape>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Value, ErrorShape>>,
{
    let mut items: Vec<Value> = Vec::new();

    if limit == Some(0) {
        return Ok(items);
    }

    let mut page_number = 1u32;
    loop {
        let response = fetch_page(page_number).await?;
        let page = parse_page(&response, result_key)?;
        items.extend(page.items);

        if let Some(limit) = limit {
            if items.len() >= limit {
                items.truncate(limit);
                break;
            }
        }

        match page.next_page {
            Some(next) => page_number = next,
            None => break,
        }
    }

    tracing::debug!("paginated {} items from {}", items.len(), result_key);
    Ok(items)
}
