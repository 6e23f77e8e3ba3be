use chrono::{DateTime, Duration, Utc};

use super::timestamp::parse_timestamp;
use super::{entry_label, FeedDocument, FeedKind};
use crate::xml::Element;

/// Removes every entry or item with a category containing any of `needles`,
/// compared case-insensitively. Returns the number of entries removed.
///
/// Atom categories are read from `category@term`, RSS categories from the
/// element text. The document keeps its original format.
pub fn remove_by_category(doc: &mut FeedDocument, needles: &[String]) -> usize {
    let needles: Vec<String> = needles
        .iter()
        .map(|n| n.to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();
    if needles.is_empty() {
        return 0;
    }

    let kind = doc.kind();
    let matches = |article: &Element| {
        categories(article, kind).iter().any(|category| {
            let category = category.to_lowercase();
            needles.iter().any(|needle| category.contains(needle.as_str()))
        })
    };

    let removed = match kind {
        FeedKind::Atom => doc
            .root_mut()
            .retain_children(|el| el.name != "entry" || !matches(el)),
        FeedKind::Rss | FeedKind::Unknown => {
            let root = doc.root_mut();
            // RSS 1.0 keeps items beside the channel rather than inside it
            let in_channel = match root.child_mut("channel") {
                Some(channel) => channel.retain_children(|el| el.name != "item" || !matches(el)),
                None => 0,
            };
            in_channel + root.retain_children(|el| el.name != "item" || !matches(el))
        }
    };

    tracing::debug!(removed = removed, "Filtered entries by category");
    removed
}

fn categories(article: &Element, kind: FeedKind) -> Vec<String> {
    article
        .children_named("category")
        .filter_map(|category| match kind {
            FeedKind::Atom => category.attr("term").map(str::to_string),
            _ => Some(category.text()),
        })
        .filter(|value| !value.is_empty())
        .collect()
}

/// Removes Atom entries whose `updated` is more than `max_age_days` before
/// `now`. Entries with missing or unparseable timestamps are kept.
/// A limit of zero disables the cut-off, as does one reaching past the
/// earliest representable date.
pub fn remove_older_than(doc: &mut FeedDocument, max_age_days: u32, now: DateTime<Utc>) -> usize {
    if max_age_days == 0 {
        return 0;
    }
    let Some(cutoff) = Duration::try_days(i64::from(max_age_days))
        .and_then(|age| now.checked_sub_signed(age))
    else {
        tracing::debug!(max_age_days, "Age limit out of range, keeping all entries");
        return 0;
    };

    doc.root_mut().retain_children(|el| {
        if el.name != "entry" {
            return true;
        }
        let updated = el.child_text("updated").as_deref().and_then(parse_timestamp);
        match updated {
            Some(updated) if updated < cutoff => {
                tracing::debug!(entry = %entry_label(el), updated = %updated, "Dropping stale entry");
                false
            }
            _ => true,
        }
    })
}
