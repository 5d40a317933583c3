use std::cmp::Ordering;

/// A run of text or digits. A key always alternates text, digits, text, ... starting with a
/// (possibly empty) text chunk, so chunks at the same position are always the same kind.
#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Text(String),
    Digits(&'a str),
}

fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = false;

    for (idx, ch) in name.char_indices() {
        let is_digit = ch.is_ascii_digit();
        if is_digit != in_digits {
            out.push(make_chunk(&name[start..idx], in_digits));
            start = idx;
            in_digits = is_digit;
        }
    }
    out.push(make_chunk(&name[start..], in_digits));
    out
}

fn make_chunk(raw: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(raw)
    } else {
        Chunk::Text(raw.to_lowercase())
    }
}

/// Numeric comparison of two digit runs of any length.
fn cmp_digits(lhs: &str, rhs: &str) -> Ordering {
    let lhs = lhs.trim_start_matches('0');
    let rhs = rhs.trim_start_matches('0');
    lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}

fn cmp_chunk(lhs: &Chunk<'_>, rhs: &Chunk<'_>) -> Ordering {
    match (lhs, rhs) {
        (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
        (Chunk::Digits(a), Chunk::Digits(b)) => cmp_digits(a, b),
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
    }
}

/// Compare two filenames treating embedded digit runs as integers and text case-insensitively.
/// Names with equal keys fall back to a plain byte comparison so the order is total.
pub fn natural_cmp(lhs: &str, rhs: &str) -> Ordering {
    let left = chunks(lhs);
    let right = chunks(rhs);

    for (a, b) in left.iter().zip(right.iter()) {
        let ord = cmp_chunk(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len()
        .cmp(&right.len())
        .then_with(|| lhs.cmp(rhs))
}

pub fn natural_sort(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn digit_runs_compare_numerically() {
        let mut names = vec![
            "img(10)aaaaa.png".to_string(),
            "img(2)bbbbb.png".to_string(),
            "img(1)ccccc.png".to_string(),
        ];
        natural_sort(&mut names);
        assert_eq!(
            names,
            vec!["img(1)ccccc.png", "img(2)bbbbb.png", "img(10)aaaaa.png"]
        );
    }

    #[test]
    fn text_is_case_insensitive() {
        assert_eq!(natural_cmp("Alpha", "beta"), Ordering::Less);
        assert_eq!(natural_cmp("alpha", "Beta"), Ordering::Less);
    }

    #[test]
    fn sentinel_sorts_after_numbered_images() {
        let mut names = vec![
            "solution.txt".to_string(),
            "image(3)x.png".to_string(),
            "image(12)y.png".to_string(),
        ];
        natural_sort(&mut names);
        assert_eq!(names.last().map(String::as_str), Some("solution.txt"));
    }

    #[test]
    fn leading_zeros_and_long_runs() {
        // Numerically equal keys fall back to the raw bytes.
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Less);
        assert_eq!(natural_cmp("a8", "a007"), Ordering::Greater);
        assert_eq!(
            natural_cmp("n99999999999999999999999", "n100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert_eq!(natural_cmp("img", "img1"), Ordering::Less);
    }
}
