//! Deterministic content used when the generator is unavailable.

use super::clean::dedup_case_insensitive;
use super::{ContentKind, Platform};

const STOPWORDS: &[&str] = &["the", "and", "for", "with", "this"];

const INSTAGRAM_TAGS: &[&str] = &[
    "instagram", "insta", "instadaily", "photooftheday", "beautiful", "amazing", "love", "happy",
    "style", "follow",
];
const TWITTER_TAGS: &[&str] = &[
    "twitter", "trending", "viral", "news", "update", "discussion", "opinion", "thoughts",
];
const TIKTOK_TAGS: &[&str] = &[
    "fyp", "foryou", "viral", "trending", "tiktok", "dance", "funny", "comedy", "lifestyle",
    "tutorial",
];
const YOUTUBE_KEYWORDS: &[&str] = &["tutorial", "how to", "tips", "guide", "learn", "easy", "best", "top"];

/// Lowercase alphabetic words of 3–15 letters.
fn prompt_words(prompt: &str) -> Vec<String> {
    prompt
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| (3..=15).contains(&w.len()))
        .map(str::to_ascii_lowercase)
        .collect()
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Hashtags (or YouTube keywords) for `prompt`.
pub fn tags(platform: Platform, prompt: &str) -> Vec<String> {
    let words = prompt_words(prompt);
    let tags = match platform {
        Platform::Instagram => words
            .into_iter()
            .filter(|w| !STOPWORDS.contains(&w.as_str()))
            .chain(owned(INSTAGRAM_TAGS))
            .collect(),
        Platform::Twitter => words.into_iter().chain(owned(TWITTER_TAGS)).collect(),
        Platform::Tiktok => owned(TIKTOK_TAGS).into_iter().chain(words).collect(),
        Platform::Youtube => youtube_keywords(prompt),
    };
    dedup_case_insensitive(tags)
}

fn youtube_keywords(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let singles = words.iter().filter(|w| w.chars().count() > 3).map(|w| w.to_string());
    let pairs = words
        .windows(2)
        .map(|pair| pair.join(" "))
        .filter(|pair| pair.chars().count() <= 30);

    singles.chain(pairs).chain(owned(YOUTUBE_KEYWORDS)).collect()
}

/// Ready-made items for every other content kind.
pub fn items(platform: Platform, kind: ContentKind, prompt: &str) -> Vec<String> {
    let p = prompt.trim();
    match (platform, kind) {
        (_, ContentKind::Tags) => tags(platform, prompt),
        (Platform::Instagram, ContentKind::Caption) => vec![format!(
            "Amazing {p}! ✨ What do you think about this? Let me know in the comments! 👇\n\n#amazing #photooftheday #instagood"
        )],
        (Platform::Instagram, ContentKind::Bio) => vec![format!(
            "✨ {p} enthusiast | Sharing amazing moments | Follow for daily inspiration"
        )],
        (Platform::Twitter, ContentKind::Bio) => vec![format!(
            "✨ {p} enthusiast | Sharing insights | Follow for updates"
        )],
        (_, ContentKind::Description) => vec![format!(
            "Welcome to our channel! In this video, we explore {p}.\n\n\
             🔥 What you'll learn:\n\
             • Key insights about {p}\n\
             • Practical tips and techniques\n\
             • Expert advice and recommendations\n\n\
             👍 Like, subscribe and share your thoughts in the comments!"
        )],
        (_, ContentKind::Stories) => vec![
            format!("Behind the scenes: {p} 📸"),
            format!("Q&A about {p} - Ask me anything! ❓"),
            format!("Day in the life: {p} edition ✨"),
            format!("Tips and tricks for {p} 💡"),
            format!("Celebrating {p} with you! 🎉"),
        ],
        (_, ContentKind::Title) => vec![
            format!("The Ultimate Guide to {p}"),
            format!("How to Master {p} This Year"),
            format!("Everything You Need to Know About {p}"),
            format!("Top 10 Tips for {p}"),
            format!("Why {p} is Trending Right Now"),
        ],
        (_, ContentKind::Thumbnail) => vec![
            format!("🔥 {p} - You Won't Believe This!"),
            format!("💡 {p} - The Ultimate Guide"),
            format!("⚡ {p} - Game Changer!"),
            format!("🎯 {p} - Expert Tips Revealed"),
            format!("🚀 {p} - Next Level Content"),
        ],
        (_, ContentKind::Tweet) => vec![
            format!("Just discovered something amazing about {p}! What are your thoughts? 🤔 #trending"),
            format!("Hot take: {p} is going to be huge this year. Who else agrees? 🔥"),
            format!("Can we talk about {p} for a second? This is incredible! ✨ #viral"),
            format!("Your daily reminder that {p} exists and it's awesome 💪"),
            format!("POV: You're scrolling and see this post about {p} 👀 #fyp"),
        ],
        (_, ContentKind::Thread) => vec![
            format!("Just discovered something incredible about {p}! Let me break it down for you 🧵"),
            format!("Here's what you need to know: {p} is changing everything we thought we knew 🔥"),
            format!("The future of {p} looks brighter than ever. Who else is excited? ✨"),
            format!("Key takeaway: {p} isn't just a trend, it's a revolution 💪"),
            format!("What are your thoughts on {p}? Drop a comment below! 👇"),
        ],
        (_, ContentKind::Caption) => vec![
            format!("POV: You discover {p} 😱 #fyp #viral"),
            format!("This {p} hit different 🔥 #trending #foryou"),
            format!("Tell me you love {p} without telling me 💯 #tiktok"),
            format!("When someone mentions {p}: 🤩✨ #viral #fyp"),
            format!("Rate this {p} content 1-10 🤔 #rating #foryou"),
        ],
        (_, ContentKind::Hooks) => vec![
            format!("POV: You discover {p} 😱"),
            format!("This {p} hit different 🔥"),
            format!("Tell me you love {p} without telling me 💯"),
            format!("When someone mentions {p}: 🤩✨"),
            format!("Rate this {p} content 1-10 🤔"),
        ],
        (_, ContentKind::Trends) => vec![
            format!("POV: You're scrolling and see {p} 🎭"),
            format!("Day in the life: {p} edition ✨"),
            format!("Before and after: {p} transformation 🔄"),
            format!("3 ways to master {p} 💡"),
            format!("Hidden secrets of {p} 🤫"),
        ],
        (_, ContentKind::Bio) => vec![format!("✨ {p} enthusiast | Follow for more")],
    }
}
