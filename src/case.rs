//! String casing and pluralisation.
//!
//! Slugs arrive as `camelCase` (`activeAt`, `specificTeam`) and are turned
//! into `snake_case` for table/column names, `Title Case` for display names,
//! and pluralised forms for table/collection slugs.

/// Convert a `camelCase` or `PascalCase` identifier to `snake_case`.
pub fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_is_lower_or_digit = false;
    for ch in input.chars() {
        if ch.is_uppercase() {
            if prev_is_lower_or_digit {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_is_lower_or_digit = false;
        } else {
            out.push(ch);
            prev_is_lower_or_digit = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Convert a `snake_case` or space-separated identifier to `camelCase`.
pub fn to_camel_case(input: &str) -> String {
    let mut out = String::new();
    let mut capitalise_next = false;
    for (i, ch) in input.chars().enumerate() {
        if ch == '_' || ch == ' ' || ch == '-' {
            capitalise_next = true;
            continue;
        }
        if capitalise_next {
            out.extend(ch.to_uppercase());
            capitalise_next = false;
        } else if i == 0 {
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Title-case a `camelCase` slug for display (`activeAt` → `Active At`).
pub fn to_title_case(input: &str) -> String {
    let snake = to_snake_case(input);
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pluralise a camelCase slug per the fixed suffix rules:
/// consonant + `y` → `-ies`; `s`/`ch`/`sh`/`ex` → append `es`; else append `s`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return word.to_string();
    }

    let lower: Vec<char> = word.chars().collect();
    let last = lower[lower.len() - 1];

    if last == 'y' && lower.len() >= 2 && !is_vowel(lower[lower.len() - 2]) {
        let mut base: String = lower[..lower.len() - 1].iter().collect();
        base.push_str("ies");
        return base;
    }

    if word.ends_with('s')
        || word.ends_with("ch")
        || word.ends_with("sh")
        || word.ends_with("ex")
    {
        return format!("{word}es");
    }

    format!("{word}s")
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_from_camel() {
        assert_eq!(to_snake_case("activeAt"), "active_at");
        assert_eq!(to_snake_case("roninCreatedAt"), "ronin_created_at");
        assert_eq!(to_snake_case("id"), "id");
    }

    #[test]
    fn camel_case_from_snake() {
        assert_eq!(to_camel_case("active_at"), "activeAt");
        assert_eq!(to_camel_case("id"), "id");
    }

    #[test]
    fn title_case_splits_words() {
        assert_eq!(to_title_case("activeAt"), "Active At");
        assert_eq!(to_title_case("account"), "Account");
    }

    #[test]
    fn pluralize_consonant_y() {
        assert_eq!(pluralize("category"), "categories");
    }

    #[test]
    fn pluralize_vowel_y_is_regular() {
        assert_eq!(pluralize("day"), "days");
    }

    #[test]
    fn pluralize_sibilant_suffixes() {
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("batch"), "batches");
        assert_eq!(pluralize("dish"), "dishes");
        assert_eq!(pluralize("index"), "indexes");
    }

    #[test]
    fn pluralize_regular() {
        assert_eq!(pluralize("account"), "accounts");
        assert_eq!(pluralize("member"), "members");
    }
}
