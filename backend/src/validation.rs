pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// Options that survive a commit: everything that is non-empty after trimming.
/// Kept verbatim, the trim only decides membership.
pub fn valid_options(options: &[String]) -> Vec<String> {
    options
        .iter()
        .filter(|o| !o.trim().is_empty())
        .cloned()
        .collect()
}

pub fn is_question_valid(question_text: &str, options: &[String], correct_answer: &str) -> bool {
    if question_text.trim().is_empty() || correct_answer.is_empty() {
        return false;
    }
    let mut count = 0;
    let mut contains_answer = false;
    for option in options.iter().filter(|o| !o.trim().is_empty()) {
        count += 1;
        if option == correct_answer {
            contains_answer = true;
        }
    }
    count >= MIN_OPTIONS && contains_answer
}

pub fn can_add_option(current_len: usize) -> bool {
    current_len < MAX_OPTIONS
}

pub fn can_remove_option(current_len: usize) -> bool {
    current_len > MIN_OPTIONS
}

/// Display label for an option slot: 0 -> "A", 1 -> "B", ...
pub fn option_label(index: usize) -> String {
    match u8::try_from(index).ok().and_then(|i| b'A'.checked_add(i)) {
        Some(b) if b <= b'Z' => char::from(b).to_string(),
        _ => (index + 1).to_string(),
    }
}
