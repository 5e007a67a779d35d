//! Streaming-equivalent HTML parse (spec §4.6 step 4): a document-order walk
//! over a parsed DOM, maintaining an explicit open-tag stack so script/style
//! text is excluded and links are discovered alongside the text buffer.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;
use url::Url;

/// Walk `body` and return `(text, links)`: `text` is every non-script/style
/// text node joined by single spaces; `links` is every `a[href]` discovered
/// while `depth < max_depth`, resolved per the fragment/rooted/absolute
/// rules in spec §4.6.
pub fn extract(body: &str, base_url: &Url, depth: i64, max_depth: i64) -> (String, Vec<Url>) {
    let document = Html::parse_document(body);
    let mut text = String::new();
    let mut links = Vec::new();
    let mut tag_stack: Vec<String> = Vec::new();

    walk(
        document.tree.root(),
        base_url,
        depth,
        max_depth,
        &mut tag_stack,
        &mut text,
        &mut links,
    );

    (text, links)
}

fn walk(
    node: NodeRef<'_, Node>,
    base_url: &Url,
    depth: i64,
    max_depth: i64,
    tag_stack: &mut Vec<String>,
    text: &mut String,
    links: &mut Vec<Url>,
) {
    match node.value() {
        Node::Element(element) => {
            let tag_name = element.name().to_owned();

            if tag_name == "a" && depth < max_depth {
                if let Some(href) = element.attr("href") {
                    if let Some(target) = resolve_href(href, base_url) {
                        links.push(target);
                    }
                }
            }

            tag_stack.push(tag_name);
            for child in node.children() {
                walk(child, base_url, depth, max_depth, tag_stack, text, links);
            }
            tag_stack.pop();
        }
        Node::Text(text_node) => {
            let innermost = tag_stack.last().map(String::as_str);
            if innermost != Some("script") && innermost != Some("style") {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(text_node);
            }
        }
        _ => {
            for child in node.children() {
                walk(child, base_url, depth, max_depth, tag_stack, text, links);
            }
        }
    }
}

fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    if href.starts_with('#') {
        None
    } else if href.starts_with('/') {
        base_url.join(href).ok()
    } else {
        Url::parse(href).ok()
    }
}
