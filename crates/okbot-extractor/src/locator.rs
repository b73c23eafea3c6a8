//! Locator parsing: which `YouTube` video does a user-supplied URL point at.

use url::Url;

const MAX_ID_LEN: usize = 64;

/// Extract the video ID from a `YouTube` URL.
///
/// Accepts `watch?v=` links (including `music.` and `m.` hosts), `youtu.be`
/// short links, and `/shorts/`, `/embed/`, `/live/` paths. A missing scheme is
/// tolerated. Returns `None` for anything else.
pub fn video_id(locator: &str) -> Option<String> {
    let locator = locator.trim();
    let url = Url::parse(locator)
        .or_else(|_| Url::parse(&format!("https://{locator}")))
        .ok()?;

    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let id = match host {
        "youtu.be" => url.path_segments()?.next()?.to_string(),
        "youtube.com" | "music.youtube.com" => {
            if url.path() == "/watch" {
                url.query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())?
            } else {
                let mut segments = url.path_segments()?;
                match segments.next()? {
                    "shorts" | "embed" | "live" => segments.next()?.to_string(),
                    _ => return None,
                }
            }
        }
        _ => return None,
    };

    is_valid_id(&id).then_some(id)
}

/// Video IDs end up in file names, so only the `YouTube` ID alphabet is allowed.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
