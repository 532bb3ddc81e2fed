// Tag substitution for container environment overrides

use super::queue::Tags;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Templates without this marker are returned untouched
pub const MARKER: &str = "##MessageDelivery";

static TAG_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"##MessageDelivery\.Tag\.(\w+)##").expect("tag placeholder pattern is valid")
});

/// Replace every `##MessageDelivery.Tag.<key>##` whose key is in `tags`.
///
/// Unknown keys leave the placeholder text in place. No nesting, no escaping.
pub fn resolve(template: &str, tags: &Tags) -> String {
    if !template.contains(MARKER) {
        return template.to_string();
    }

    TAG_PLACEHOLDER
        .replace_all(template, |caps: &Captures| match tags.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
