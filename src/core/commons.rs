// src/core/commons.rs

/// Converts a dashed or snake cased name into camel case (`dry-run` -> `dryRun`).
/// Names without separators are returned unchanged.
pub fn to_camel_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if (c == '-' || c == '_') && i > 0 {
            upper_next = true;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Edit distance between two strings, used to suggest near-miss command names.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current.fill(0);
        if let Some(first) = current.first_mut() {
            *first = i + 1;
        }
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let deletion = previous.get(j + 1).copied().unwrap_or(usize::MAX) + 1;
            let insertion = current.get(j).copied().unwrap_or(usize::MAX) + 1;
            let substitution = previous.get(j).copied().unwrap_or(usize::MAX) + cost;
            if let Some(cell) = current.get_mut(j + 1) {
                *cell = deletion.min(insertion).min(substitution);
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous.last().copied().unwrap_or(0)
}

/// Returns the candidates within `max_distance` edits of `input`, closest first.
pub fn suggest_similar<'a, I>(input: &str, candidates: I, max_distance: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|candidate| (levenshtein_distance(input, candidate), candidate))
        .filter(|(distance, _)| *distance <= max_distance)
        .collect();
    scored.sort();
    scored.into_iter().map(|(_, c)| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("dry-run"), "dryRun");
        assert_eq!(to_camel_case("out_dir"), "outDir");
        assert_eq!(to_camel_case("a-b-c"), "aBC");
        assert_eq!(to_camel_case("plain"), "plain");
        assert_eq!(to_camel_case("-x"), "-x");
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("build", "build"), 0);
        assert_eq!(levenshtein_distance("buidl", "build"), 2);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_suggest_similar_orders_by_distance() {
        let suggestions = suggest_similar("dpeloy", ["deploy", "delete", "status"], 2);
        assert_eq!(suggestions, vec!["deploy"]);
    }
}
