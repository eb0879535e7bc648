use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Check if the key event matches any of the bindings in the list
pub fn matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| matches_single(event, b))
}

/// Check if the key event matches a single binding string
pub fn matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Ctrl/Alt/Super combinations are not bindable
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    let name = trimmed.to_ascii_lowercase();
    match name.as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        _ => {
            if let Some(n) = function_key(&name) {
                return event.code == KeyCode::F(n);
            }
            // Single character: case-sensitive (m != M)
            let mut chars = trimmed.chars();
            match (chars.next(), chars.next()) {
                (Some(first), None) => matches!(event.code, KeyCode::Char(c) if c == first),
                _ => false,
            }
        }
    }
}

/// `"f1"`..`"f12"` -> 1..12
fn function_key(name: &str) -> Option<u8> {
    let n: u8 = name.strip_prefix('f')?.parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}

/// Ctrl+C always aborts, whatever the bindings say.
pub fn is_interrupt(event: &KeyEvent) -> bool {
    event.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(event.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_named_keys() {
        assert!(matches_single(&key(KeyCode::Enter), "Enter"));
        assert!(matches_single(&key(KeyCode::Esc), "ESC"));
        assert!(matches_single(&key(KeyCode::Esc), "escape"));
        assert!(matches_single(&key(KeyCode::BackTab), "shift+tab"));
        assert!(matches_single(&key(KeyCode::F(5)), "F5"));
        assert!(!matches_single(&key(KeyCode::F(5)), "F13"));
        assert!(!matches_single(&key(KeyCode::Up), "down"));
    }

    #[test]
    fn test_single_chars_are_case_sensitive() {
        assert!(matches_single(&key(KeyCode::Char('k')), "k"));
        assert!(!matches_single(&key(KeyCode::Char('K')), "k"));
        assert!(!matches_single(&key(KeyCode::Char('k')), "kk"));
        assert!(!matches_single(&key(KeyCode::Char('k')), "  "));
    }

    #[test]
    fn test_modifiers_never_match() {
        let ctrl_k = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::CONTROL);
        assert!(!matches_single(&ctrl_k, "k"));
        let alt_enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT);
        assert!(!matches_single(&alt_enter, "Enter"));
        // Shift alone is fine
        let shift_k = KeyEvent::new(KeyCode::Char('K'), KeyModifiers::SHIFT);
        assert!(matches_single(&shift_k, "K"));
    }

    #[test]
    fn test_matches_any_and_interrupt() {
        let bindings = vec!["Down".to_string(), "Tab".to_string()];
        assert!(matches_any(&key(KeyCode::Tab), &bindings));
        assert!(!matches_any(&key(KeyCode::Up), &bindings));
        assert!(!matches_any(&key(KeyCode::Up), &[]));

        assert!(is_interrupt(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&key(KeyCode::Char('c'))));
    }
}
