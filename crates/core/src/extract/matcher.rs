use std::sync::LazyLock;

use regex::Regex;

use crate::identity::resolve_display_name;
use crate::model::SubscriptionEntry;

static EMOJI_LABELED_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)📋\s*机场名称:\s*(.+)\n🔗\s*订阅链接:\s*(.+)")
        .expect("emoji label pattern is valid")
});

static LABELED_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)机场名称:\s*(.+)\n订阅链接:\s*(.+)").expect("label pattern is valid")
});

static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern is valid"));

/// One extraction tier for free-form text.
///
/// `None` means the tier found nothing and the next one should be tried.
pub trait TextMatcher: Send + Sync {
    fn label(&self) -> &str;

    fn try_match(&self, text: &str) -> Option<Vec<SubscriptionEntry>>;
}

/// A name label line directly followed by a link label line.
pub struct LabeledPairMatcher {
    label: &'static str,
    pattern: &'static Regex,
}

impl LabeledPairMatcher {
    /// `📋 机场名称: …` / `🔗 订阅链接: …`
    pub fn emoji() -> Self {
        Self {
            label: "emoji-labeled",
            pattern: &EMOJI_LABELED_PAIR,
        }
    }

    /// `机场名称: …` / `订阅链接: …`
    pub fn plain() -> Self {
        Self {
            label: "labeled",
            pattern: &LABELED_PAIR,
        }
    }
}

impl TextMatcher for LabeledPairMatcher {
    fn label(&self) -> &str {
        self.label
    }

    fn try_match(&self, text: &str) -> Option<Vec<SubscriptionEntry>> {
        let entries: Vec<_> = self
            .pattern
            .captures_iter(text)
            .map(|caps| SubscriptionEntry::new(caps[1].trim(), caps[2].trim()))
            .collect();

        (!entries.is_empty()).then_some(entries)
    }
}

/// Any `http(s)://` token, named after its host.
pub struct BareUrlMatcher;

impl TextMatcher for BareUrlMatcher {
    fn label(&self) -> &str {
        "bare-url"
    }

    fn try_match(&self, text: &str) -> Option<Vec<SubscriptionEntry>> {
        let entries: Vec<_> = BARE_URL
            .find_iter(text)
            .filter_map(|found| {
                let url = found.as_str().trim();
                let name = resolve_display_name(url);
                if name.is_empty() {
                    tracing::debug!(url, "dropping url without a usable name");
                    return None;
                }
                Some(SubscriptionEntry::inferred(name, url))
            })
            .collect();

        (!entries.is_empty()).then_some(entries)
    }
}

/// Tiers in priority order.
pub fn default_matchers() -> Vec<Box<dyn TextMatcher>> {
    vec![
        Box::new(LabeledPairMatcher::emoji()),
        Box::new(LabeledPairMatcher::plain()),
        Box::new(BareUrlMatcher),
    ]
}
