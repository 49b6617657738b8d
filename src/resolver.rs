//! Turns a user-supplied video link into an embeddable player URL.
//!
//! Recognition is an ordered table of [`Rule`]s; the first rule whose
//! trigger matches the lowercased input decides the platform. Extraction is
//! best effort: a missing delimiter yields an empty identifier and the
//! template is still applied. Unrecognized links pass through unchanged.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static RE_VK_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)video(-?\d+)_(\d+)").expect("invalid VK video regex"));

const YOUTUBE_PARAMS: &str =
    "autoplay=1&mute=0&controls=1&modestbranding=1&rel=0&showinfo=0&fs=1&iv_load_policy=3&disablekb=1";

/// Characters that end a path segment
const SEGMENT_END: &[char] = &['?', '&', '/', '#'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    YouTube,
    TwitchChannel,
    TwitchPlayer,
    VkVideo,
    OkRu,
    Kick,
    Generic,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::YouTube => "youtube",
            Platform::TwitchChannel => "twitch",
            Platform::TwitchPlayer => "twitch-player",
            Platform::VkVideo => "vk",
            Platform::OkRu => "ok.ru",
            Platform::Kick => "kick",
            Platform::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Result of [`UrlResolver::resolve`]. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEmbed {
    pub platform: Platform,
    /// Embeddable URL with the platform's playback parameters
    pub url: String,
    /// Identifier taken from the input; `None` when the platform has none
    pub id: Option<String>,
}

/// Input seen by the rules: the raw string plus an ASCII-lowercased copy.
/// Both have identical byte offsets, so positions found in `lower` slice `raw`.
struct Link<'a> {
    raw: &'a str,
    lower: String,
}

impl<'a> Link<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_ascii_lowercase(),
        }
    }

    fn contains(&self, marker: &str) -> bool {
        self.lower.contains(marker)
    }

    /// Text following the first occurrence of `marker`
    fn after(&self, marker: &str) -> Option<&'a str> {
        self.lower
            .find(marker)
            .map(|pos| &self.raw[pos + marker.len()..])
    }

    /// Path segment directly following `marker`, or empty
    fn segment_after(&self, marker: &str) -> &'a str {
        self.after(marker).map(segment).unwrap_or("")
    }

    /// Value of query parameter `key`, or empty
    fn query_param(&self, key: &str) -> &'a str {
        let Some(start) = self.raw.find('?') else {
            return "";
        };
        let query = &self.raw[start + 1..];
        let query = query.split('#').next().unwrap_or("");
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
            .unwrap_or("")
    }
}

fn segment(rest: &str) -> &str {
    rest.split(SEGMENT_END).next().unwrap_or("")
}

struct Embed {
    url: String,
    id: Option<String>,
}

struct Rule {
    platform: Platform,
    matches: fn(&Link) -> bool,
    build: fn(&Link, &str) -> Embed,
}

/// Evaluated in order; first match wins. The Twitch player rule precedes
/// the channel rule since every player URL also contains `twitch.tv/`.
const RULES: &[Rule] = &[
    Rule {
        platform: Platform::YouTube,
        matches: |link| {
            link.contains("youtube.com/watch")
                || link.contains("youtube.com/live")
                || link.contains("youtu.be/")
        },
        build: |link, _| {
            let id = if link.contains("youtube.com/live/") {
                link.segment_after("youtube.com/live/")
            } else if link.contains("youtu.be/") && !link.contains("youtube.com/") {
                link.segment_after("youtu.be/")
            } else {
                link.query_param("v")
            };
            Embed {
                url: format!("https://www.youtube-nocookie.com/embed/{id}?{YOUTUBE_PARAMS}"),
                id: Some(id.to_string()),
            }
        },
    },
    Rule {
        platform: Platform::TwitchPlayer,
        matches: |link| link.contains("player.twitch.tv"),
        build: |link, host| {
            if link.contains("parent=") {
                return Embed {
                    url: link.raw.to_string(),
                    id: None,
                };
            }
            let sep = if link.raw.contains('?') { '&' } else { '?' };
            Embed {
                url: format!("{}{sep}parent={host}&autoplay=true&muted=false", link.raw),
                id: None,
            }
        },
    },
    Rule {
        platform: Platform::TwitchChannel,
        matches: |link| link.contains("twitch.tv/"),
        build: |link, host| {
            let channel = link.segment_after("twitch.tv/");
            Embed {
                url: format!(
                    "https://player.twitch.tv/?channel={channel}&parent={host}&autoplay=true&muted=false"
                ),
                id: Some(channel.to_string()),
            }
        },
    },
    Rule {
        platform: Platform::VkVideo,
        matches: |link| link.contains("vk.com/video") || link.contains("vk.ru/video"),
        build: |link, _| match RE_VK_VIDEO.captures(link.raw) {
            Some(caps) => {
                let oid = caps.get(1).map_or("", |m| m.as_str());
                let vid = caps.get(2).map_or("", |m| m.as_str());
                Embed {
                    url: format!("https://vk.com/video_ext.php?oid={oid}&id={vid}&hd=2&autoplay=1"),
                    id: Some(format!("{oid}_{vid}")),
                }
            }
            // No owner/video pair: keep the link as given
            None => Embed {
                url: link.raw.to_string(),
                id: None,
            },
        },
    },
    Rule {
        platform: Platform::OkRu,
        matches: |link| link.contains("ok.ru/video") || link.contains("ok.ru/live"),
        build: |link, _| {
            let path = link.raw.split(['?', '#']).next().unwrap_or("");
            let id = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
            Embed {
                url: format!("https://ok.ru/videoembed/{id}?autoplay=1"),
                id: Some(id.to_string()),
            }
        },
    },
    Rule {
        platform: Platform::Kick,
        matches: |link| link.contains("kick.com/"),
        build: |link, _| {
            let channel = link.segment_after("kick.com/");
            Embed {
                url: format!("https://player.kick.com/{channel}?autoplay=true&muted=false"),
                id: Some(channel.to_string()),
            }
        },
    },
];

/// Resolves video links for embedding on `embed_host`.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    embed_host: String,
}

impl UrlResolver {
    pub fn new(embed_host: impl Into<String>) -> Self {
        Self {
            embed_host: embed_host.into(),
        }
    }

    pub fn embed_host(&self) -> &str {
        &self.embed_host
    }

    /// Never fails; unrecognized input comes back unchanged as [`Platform::Generic`].
    pub fn resolve(&self, raw_url: &str) -> ResolvedEmbed {
        let link = Link::new(raw_url);

        let resolved = RULES
            .iter()
            .find(|rule| (rule.matches)(&link))
            .map(|rule| {
                let embed = (rule.build)(&link, &self.embed_host);
                ResolvedEmbed {
                    platform: rule.platform,
                    url: embed.url,
                    id: embed.id,
                }
            })
            .unwrap_or_else(|| ResolvedEmbed {
                platform: Platform::Generic,
                url: raw_url.to_string(),
                id: None,
            });

        tracing::debug!(
            platform = %resolved.platform,
            id = ?resolved.id,
            "resolved embed url"
        );
        resolved
    }
}
