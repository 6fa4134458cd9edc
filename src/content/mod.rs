//! Social-media text generation backed by a generative-text API.
//!
//! Generation never fails from the caller's point of view once the request
//! is valid: when the generator errors, or returns too few usable items, the
//! result is topped up from deterministic fallback content and flagged with
//! `fallback: true`.

mod clean;
mod fallback;
mod gemini;

pub use gemini::GeminiClient;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Fewer usable list items than this triggers a fallback top-up
const MIN_USABLE_ITEMS: usize = 5;
const MAX_COUNT: u32 = 50;
const MAX_TWEET_CHARS: usize = 280;

/// Prompt in, text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Youtube,
    Twitter,
    Tiktok,
}

impl Platform {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "youtube" => Ok(Platform::Youtube),
            "twitter" | "x" => Ok(Platform::Twitter),
            "tiktok" => Ok(Platform::Tiktok),
            _ => Err(Error::Validation(format!("Unsupported platform '{}'", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Tiktok => "tiktok",
        }
    }

    pub fn default_count(&self) -> u32 {
        match self {
            Platform::Instagram => 30,
            Platform::Youtube => 20,
            Platform::Twitter => 15,
            Platform::Tiktok => 25,
        }
    }

    pub fn content_kinds(&self) -> &'static [ContentKind] {
        use ContentKind::*;
        match self {
            Platform::Instagram => &[Tags, Caption, Bio, Stories],
            Platform::Youtube => &[Tags, Title, Description, Thumbnail],
            Platform::Twitter => &[Tags, Tweet, Thread, Bio],
            Platform::Tiktok => &[Tags, Caption, Hooks, Trends],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Tags,
    Caption,
    Bio,
    Stories,
    Title,
    Description,
    Thumbnail,
    Tweet,
    Thread,
    Hooks,
    Trends,
}

impl ContentKind {
    /// Parse `s` as one of `platform`'s content types.
    pub fn parse(platform: Platform, s: &str) -> Result<Self> {
        platform
            .content_kinds()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Unsupported content type '{}' for {}",
                    s, platform
                ))
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Tags => "tags",
            ContentKind::Caption => "caption",
            ContentKind::Bio => "bio",
            ContentKind::Stories => "stories",
            ContentKind::Title => "title",
            ContentKind::Description => "description",
            ContentKind::Thumbnail => "thumbnail",
            ContentKind::Tweet => "tweet",
            ContentKind::Thread => "thread",
            ContentKind::Hooks => "hooks",
            ContentKind::Trends => "trends",
        }
    }

    fn max_tokens(&self) -> u32 {
        match self {
            ContentKind::Bio => 300,
            ContentKind::Caption | ContentKind::Stories | ContentKind::Title => 500,
            ContentKind::Description | ContentKind::Thread => 800,
            _ => 600,
        }
    }
}

/// How a platform/content-type pair is parsed and rendered
#[derive(Clone, Copy, Debug, PartialEq)]
enum Shape {
    Hashtags,
    Keywords,
    List,
    Single,
}

fn shape(platform: Platform, kind: ContentKind) -> Shape {
    match (platform, kind) {
        (Platform::Youtube, ContentKind::Tags) => Shape::Keywords,
        (_, ContentKind::Tags) => Shape::Hashtags,
        (Platform::Instagram, ContentKind::Caption) => Shape::Single,
        (_, ContentKind::Bio) | (_, ContentKind::Description) => Shape::Single,
        _ => Shape::List,
    }
}

/// Generation parameters from the client
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContentRequest {
    #[serde(default)]
    pub prompt: String,
    /// `trending`, `niche`, `mixed` for tags; free-form tone otherwise
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    /// `short`, `medium`, `long`
    #[serde(default)]
    pub length: Option<String>,
    /// `yes`, `no`, `many`
    #[serde(default)]
    pub hashtags: Option<String>,
    /// `none`, `minimal`, `moderate`, `lots`
    #[serde(default)]
    pub emojis: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GeneratedContent {
    pub success: bool,
    pub platform: Platform,
    pub content_type: ContentKind,
    pub items: Vec<String>,
    pub count: usize,
    /// Items rendered for copy/paste
    pub text: String,
    /// True when any item came from the fallback generator
    pub fallback: bool,
}

pub struct ContentService {
    generator: Arc<dyn TextGenerator>,
}

impl ContentService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// # Errors
    /// `Validation` for an unknown platform/content type or an empty prompt.
    /// Generator failures are absorbed into fallback content.
    pub async fn generate(
        &self,
        platform: &str,
        content_type: &str,
        request: ContentRequest,
    ) -> Result<GeneratedContent> {
        let platform = Platform::parse(platform)?;
        let kind = ContentKind::parse(platform, content_type)?;

        let topic = request.prompt.trim();
        if topic.is_empty() {
            return Err(Error::validation("Prompt is required"));
        }

        let count = request
            .count
            .unwrap_or_else(|| platform.default_count())
            .clamp(1, MAX_COUNT) as usize;
        let shape = shape(platform, kind);
        let prompt = build_prompt(platform, kind, topic, count, &request);

        let generated = match self.generator.generate(&prompt, kind.max_tokens()).await {
            Ok(raw) => parse_items(shape, kind, &raw),
            Err(e) => {
                warn!(%platform, content_type = kind.as_str(), error = %e, "Generation failed, using fallback");
                Vec::new()
            }
        };

        let (items, used_fallback) = complete_items(platform, kind, shape, topic, generated, count);

        info!(
            %platform,
            content_type = kind.as_str(),
            count = items.len(),
            fallback = used_fallback,
            "Content generated"
        );

        Ok(GeneratedContent {
            success: true,
            platform,
            content_type: kind,
            count: items.len(),
            text: render(shape, &items),
            items,
            fallback: used_fallback,
        })
    }
}

fn parse_items(shape: Shape, kind: ContentKind, raw: &str) -> Vec<String> {
    match shape {
        Shape::Hashtags => clean::validate_hashtags(clean::extract_hashtags(raw)),
        Shape::Keywords => clean::extract_keywords(raw),
        Shape::Single => {
            let text = raw.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
        Shape::List => clean::lines(raw)
            .into_iter()
            .filter(|line| match kind {
                ContentKind::Title => (20..=100).contains(&line.chars().count()),
                ContentKind::Tweet | ContentKind::Thread => {
                    line.chars().count() <= MAX_TWEET_CHARS
                }
                _ => true,
            })
            .collect(),
    }
}

/// Top up thin results with fallback items and cap at `count`.
fn complete_items(
    platform: Platform,
    kind: ContentKind,
    shape: Shape,
    topic: &str,
    mut items: Vec<String>,
    count: usize,
) -> (Vec<String>, bool) {
    let needed = match shape {
        Shape::Single => 1,
        _ => MIN_USABLE_ITEMS.min(count),
    };

    let used_fallback = items.len() < needed;
    if used_fallback {
        items.extend(fallback::items(platform, kind, topic));
        items = clean::dedup_case_insensitive(items);
    }

    let limit = if shape == Shape::Single { 1 } else { count };
    items.truncate(limit);
    (items, used_fallback)
}

fn render(shape: Shape, items: &[String]) -> String {
    match shape {
        Shape::Hashtags => items
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" "),
        Shape::Keywords => items.join(", "),
        Shape::List | Shape::Single => items.join("\n\n"),
    }
}

fn build_prompt(
    platform: Platform,
    kind: ContentKind,
    topic: &str,
    count: usize,
    request: &ContentRequest,
) -> String {
    let style = request.style.as_deref().unwrap_or("trending");

    match (shape(platform, kind), kind) {
        (Shape::Hashtags, _) => {
            let guide = match style {
                "niche" => "specific, targeted hashtags for engaged audiences",
                "mixed" => "half popular hashtags and half niche hashtags",
                _ => "popular, widely-used hashtags for maximum reach",
            };
            format!(
                "Generate exactly {count} {platform} hashtags for: \"{topic}\"\n\
                 Use {guide}.\n\
                 One hashtag per line, no # symbol, only letters, numbers and underscores, 3-25 characters each."
            )
        }
        (Shape::Keywords, _) => format!(
            "Generate exactly {count} YouTube tags for: \"{topic}\"\n\
             Keywords only, no # symbol, 2-4 words each, SEO optimized, one per line."
        ),
        (_, ContentKind::Caption) if platform == Platform::Instagram => {
            let length = match request.length.as_deref() {
                Some("short") => "1-2 sentences, under 50 words",
                Some("long") => "6+ sentences, 100-150 words",
                _ => "3-5 sentences, 50-100 words",
            };
            let hashtags = match request.hashtags.as_deref() {
                Some("no") => "no hashtags",
                Some("many") => "8-12 relevant hashtags at the end",
                _ => "3-5 relevant hashtags at the end",
            };
            let emojis = match request.emojis.as_deref() {
                Some("none") => "no emojis",
                Some("minimal") => "1-2 emojis",
                Some("lots") => "5-8 emojis",
                _ => "2-4 emojis",
            };
            format!(
                "Write an Instagram caption about: {topic}\n\
                 Style: {style}\n\
                 Length: {length}\n\
                 Include: {emojis}, {hashtags}, and a call-to-action."
            )
        }
        (_, ContentKind::Bio) => format!(
            "Write an engaging {platform} bio for: \"{topic}\"\n\
             Under 150 characters, authentic, with a call-to-action if appropriate."
        ),
        (_, ContentKind::Description) => format!(
            "Create a YouTube video description for: \"{topic}\"\n\
             Engaging opening, what viewers will learn, a call-to-action to subscribe, \
             and relevant keywords. Under 500 words."
        ),
        (_, kind) => {
            let what = match kind {
                ContentKind::Stories => "Instagram story ideas",
                ContentKind::Title => "catchy YouTube video titles of 40-60 characters",
                ContentKind::Thumbnail => "YouTube thumbnail text ideas",
                ContentKind::Tweet => "tweets of at most 280 characters",
                ContentKind::Thread => "tweets forming one coherent thread, each at most 280 characters",
                ContentKind::Hooks => "TikTok opening hooks",
                ContentKind::Trends => "TikTok trend ideas",
                _ => "TikTok captions with hashtags",
            };
            format!(
                "Generate exactly {count} {what} for: \"{topic}\"\n\
                 One per line, no numbering."
            )
        }
    }
}
