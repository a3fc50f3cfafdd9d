//! Group labels derived from identifiers. Labels need not be unique.

/// Default number of groups kept in a label.
pub const DEFAULT_MAX_LABEL_INDEX: i32 = 1;

/// Derive a label for each identifier by splitting on directory separators.
///
/// A positive `max_label_index` keeps at most that many groups from the left, a
/// negative one drops that many groups from the right.
pub fn labels_from_identifiers<'a, I>(identifiers: I, max_label_index: i32) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    identifiers
        .into_iter()
        .map(|identifier| label_from_groups(&split_into_groups(identifier), max_label_index))
        .collect()
}

/// Tokenize by slash, forward or backward.
fn split_into_groups(identifier: &str) -> Vec<&str> {
    identifier.split(['/', '\\']).collect()
}

/// `groups[0:max_label_index]` joined by `/`.
fn label_from_groups(groups: &[&str], max_label_index: i32) -> String {
    let len = groups.len() as i64;
    let index = max_label_index as i64;
    let end = if index >= 0 { index.min(len) } else { (len + index).max(0) };
    groups[..end as usize].join("/")
}

#[cfg(test)]
mod test {
    use super::labels_from_identifiers;

    fn labels(ids: &[&str], max_label_index: i32) -> Vec<String> {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        labels_from_identifiers(&ids, max_label_index)
    }

    #[test]
    fn test_positive_index() {
        let ids = ["cats/tabby/001.png", r"dogs\beagle\002.png", "plain"];
        assert_eq!(labels(&ids, 1), vec!["cats", "dogs", "plain"]);
        assert_eq!(
            labels(&ids, 2),
            vec!["cats/tabby", "dogs/beagle", "plain"]
        );
        assert_eq!(
            labels(&ids, 10),
            vec!["cats/tabby/001.png", "dogs/beagle/002.png", "plain"]
        );
    }

    #[test]
    fn test_negative_index() {
        let ids = ["cats/tabby/001.png", "plain"];
        assert_eq!(labels(&ids, -1), vec!["cats/tabby", ""]);
        assert_eq!(labels(&ids, -2), vec!["cats", ""]);
        assert_eq!(labels(&ids, -5), vec!["", ""]);
    }

    #[test]
    fn test_zero_index() {
        assert_eq!(labels(&["a/b"], 0), vec![""]);
    }
}
