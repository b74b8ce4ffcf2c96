use std::sync::LazyLock;

use regex::Regex;

static LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid label pattern"));

/// Labels split into those the remote service accepts and those it would
/// reject. Both lists keep input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSplit {
    pub valid_labels: Vec<String>,
    pub invalid_labels: Vec<String>,
}

/// Splits on `,`, trims each token and drops empty ones.
pub fn split_label_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

pub fn is_valid_label(label: &str) -> bool {
    LABEL_PATTERN.is_match(label)
}

/// Splits a free-text label string and partitions the tokens.
pub fn split_labels(raw: Option<&str>) -> LabelSplit {
    match raw {
        Some(raw) => partition_labels(split_label_tokens(raw)),
        None => LabelSplit::default(),
    }
}

/// Partitions already tokenized labels by the allowed character class.
pub fn partition_labels<I, S>(labels: I) -> LabelSplit
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut split = LabelSplit::default();
    for label in labels {
        let label = label.into();
        if is_valid_label(&label) {
            split.valid_labels.push(label);
        } else {
            split.invalid_labels.push(label);
        }
    }
    split
}
