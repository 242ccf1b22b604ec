// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

/// Maximum number of characters kept for slave names and AL status texts.
pub const MAX_LABEL_LEN: usize = 30;

/// Cut `input` down to at most [`MAX_LABEL_LEN`] characters.
///
/// Longer labels are truncated silently.
pub(crate) fn truncate_label(input: &str) -> &str {
    match input.char_indices().nth(MAX_LABEL_LEN) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}

#[test]
fn test_truncate_label() {
    assert_eq!(truncate_label(""), "");
    assert_eq!(truncate_label("EK1100"), "EK1100");

    let exact = "a".repeat(MAX_LABEL_LEN);
    assert_eq!(truncate_label(&exact), exact);

    let name = "EL7047 Stepper motor terminal 48 V DC, 5 A";
    assert_eq!(truncate_label(name), "EL7047 Stepper motor terminal ");
    assert_eq!(truncate_label(name).chars().count(), MAX_LABEL_LEN);

    let name = "\u{2665}".repeat(40);
    let cut = truncate_label(&name);
    assert_eq!(cut.chars().count(), MAX_LABEL_LEN);
    assert_eq!(cut, "\u{2665}".repeat(MAX_LABEL_LEN));
}
