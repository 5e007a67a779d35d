//! URL canonicalization — the single transform applied at every ingress and
//! egress to storage (spec §4.2).
//!
//! Strips the fragment, strips userinfo, drops every query parameter whose
//! name starts with `utm_`, and re-encodes the remaining query parameters
//! sorted by key so the result is byte-for-byte idempotent.

use url::Url;

use crate::error::Result;

/// Canonicalize a URL string. `clean(clean(u)) == clean(u)` for every `u`.
pub fn clean(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    Ok(clean_url(url))
}

/// Canonicalize an already-parsed URL.
pub fn clean_url(mut url: Url) -> Url {
    url.set_fragment(None);
    let _ = url.set_username("");
    let _ = url.set_password(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        url.set_query(Some(&serializer.finish()));
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment() {
        let u = clean("http://a/page#section").unwrap();
        assert_eq!(u.fragment(), None);
        assert_eq!(u.as_str(), "http://a/page");
    }

    #[test]
    fn strips_userinfo() {
        let u = clean("http://user:pass@a/page").unwrap();
        assert_eq!(u.username(), "");
        assert_eq!(u.password(), None);
    }

    #[test]
    fn strips_utm_params() {
        let u = clean("http://a/?utm_source=x&utm_medium=y&q=1").unwrap();
        assert_eq!(u.as_str(), "http://a/?q=1");
    }

    #[test]
    fn sorts_remaining_params() {
        let u = clean("http://a/?b=2&a=1").unwrap();
        assert_eq!(u.as_str(), "http://a/?a=1&b=2");
    }

    #[test]
    fn idempotent() {
        let once = clean("http://user:pass@a/page?utm_source=x&b=2&a=1#frag").unwrap();
        let twice = clean_url(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn no_query_has_no_trailing_question_mark() {
        let u = clean("http://a/page?utm_source=x").unwrap();
        assert_eq!(u.as_str(), "http://a/page");
    }
}
