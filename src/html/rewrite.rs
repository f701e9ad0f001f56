use std::collections::HashMap;

use once_cell::sync::Lazy;
use ego_tree::NodeId;
use scraper::{Html, Node, Selector};

use crate::utils::url_validator::is_trackable_href;

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("anchor selector is valid"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector is valid"));

/// One trackable hyperlink found in a document.
///
/// `position` is dense over trackable anchors only: mailto:, tel:, relative,
/// empty and malformed hrefs never consume an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedLink {
    pub url: String,
    pub position: usize,
}

/// Walk all anchors in document order and keep the trackable ones.
///
/// Both extraction and injection go through here; the shared traversal is
/// what keeps link positions aligned between the two operations.
fn trackable_anchors(document: &Html) -> Vec<(NodeId, String)> {
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            if is_trackable_href(href) {
                Some((el.id(), href.to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// Extract every trackable hyperlink from an HTML document in document order.
///
/// Best-effort: malformed HTML never raises an error, the parser recovers
/// the way a mail client would.
pub fn extract_links(html: &str) -> Vec<TrackedLink> {
    let document = Html::parse_document(html);
    trackable_anchors(&document)
        .into_iter()
        .enumerate()
        .map(|(position, (_, url))| TrackedLink { url, position })
        .collect()
}

/// Rewrite an HTML document with tracking instrumentation.
///
/// - Anchors at positions present in `redirects` get their href replaced by
///   the mapped redirect URL. The original destination is not kept inline;
///   it is resolved server-side from the stored link at click time.
/// - When `pixel_url` is given, a 1x1 invisible image is appended as the
///   last child of `<body>` (or the document root when no body exists).
/// - The output always carries an HTML5 doctype.
///
/// With no pixel URL and an empty redirect map the input is returned
/// untouched: re-serialization is not idempotent for sloppy mail HTML, so
/// the disabled-tracking path must not go through a parse cycle.
pub fn inject_tracking(
    html: &str,
    pixel_url: Option<&str>,
    redirects: &HashMap<usize, String>,
) -> String {
    if pixel_url.is_none() && redirects.is_empty() {
        return html.to_string();
    }

    let mut document = Html::parse_document(html);
    let anchors = trackable_anchors(&document);

    for (position, (node_id, _)) in anchors.into_iter().enumerate() {
        let Some(redirect_url) = redirects.get(&position) else {
            continue;
        };
        if let Some(mut node) = document.tree.get_mut(node_id)
            && let Node::Element(el) = node.value()
        {
            for (name, value) in el.attrs.iter_mut() {
                if &*name.local == "href" {
                    *value = redirect_url.as_str().into();
                }
            }
        }
    }

    if let Some(pixel_url) = pixel_url {
        let pixel = build_pixel_node(pixel_url);
        let body_id = document
            .select(&BODY_SELECTOR)
            .next()
            .map(|el| el.id())
            .unwrap_or_else(|| document.tree.root().id());
        if let Some(mut body) = document.tree.get_mut(body_id) {
            body.append(pixel);
        }
    }

    format!("<!DOCTYPE html>{}", document.root_element().html())
}

/// Build the invisible pixel element by parsing a fragment and lifting the
/// resulting node out, so the element is constructed by the same parser that
/// built the surrounding tree.
fn build_pixel_node(pixel_url: &str) -> Node {
    let markup = format!(
        r#"<img src="{}" width="1" height="1" style="display:none;border:0;width:1px;height:1px" alt="">"#,
        escape_attr(pixel_url)
    );
    let fragment = Html::parse_fragment(&markup);
    fragment
        .tree
        .root()
        .descendants()
        .find_map(|node| match node.value() {
            Node::Element(el) if &*el.name.local == "img" => Some(node.value().clone()),
            _ => None,
        })
        .expect("pixel fragment contains an img element")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
