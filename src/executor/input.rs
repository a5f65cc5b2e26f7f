// Key-name normalization shared by every surface backend.

/// Normalizes one key name from a model `keypress`.
///
/// Only `enter` and `space` are rewritten (case-insensitively); every other
/// name is forwarded unchanged for the surface to interpret.
pub fn normalize_key(key: &str) -> String {
    if key.eq_ignore_ascii_case("enter") {
        "Enter".to_string()
    } else if key.eq_ignore_ascii_case("space") {
        " ".to_string()
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_space_are_case_insensitive() {
        for k in ["enter", "ENTER", "Enter", "eNtEr"] {
            assert_eq!(normalize_key(k), "Enter");
        }
        for k in ["space", "SPACE", "Space"] {
            assert_eq!(normalize_key(k), " ");
        }
    }

    #[test]
    fn other_names_pass_through_unchanged() {
        for k in ["CTRL", "a", "ArrowLeft", "esc", "return", " ", "spacebar", ""] {
            assert_eq!(normalize_key(k), k);
        }
    }
}
