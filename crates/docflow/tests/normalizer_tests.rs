//! Normalizer behavior on realistic extraction output.

use docflow::normalize;

const LETTER: &str = "INVOICE\n\nDear Ms Smith ,\nplease find attached the statement for\nthe quarter ending March.Payment is due\nwithin thirty days of receipt.\n\n\n\n\nContact us at billing @ acme . co . nz or visit\nwww . acme . co . nz for details.\n";

#[test]
fn test_letter_paragraphs() {
    let out = normalize(LETTER);

    let texts: Vec<&str> = out.paragraphs.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "INVOICE",
            "Dear Ms Smith, please find attached the statement for the quarter ending March. Payment is due within thirty days of receipt.",
            "Contact us at billing@acme.co.nz or visit www.acme.co.nz for details.",
        ]
    );
    assert_eq!(out.paragraphs[1].line_count, 1);
    assert_eq!(out.stats.paragraph_count, 3);
}

#[test]
fn test_formatted_text_shape() {
    let out = normalize(LETTER);

    assert!(!out.formatted_text.contains("\n\n\n"));
    assert_eq!(out.formatted_text, out.formatted_text.trim());
    assert_eq!(
        out.formatted_text.split("\n\n").count(),
        out.stats.paragraph_count
    );
    assert_eq!(out.stats.original_chars, LETTER.chars().count());
    assert_eq!(out.stats.cleaned_chars, out.formatted_text.chars().count());
    assert!(out.stats.reduction_percent > 0);
    assert!(out.stats.reduction_percent <= 100);
}

#[test]
fn test_same_input_same_output() {
    let first = normalize(LETTER);
    for _ in 0..5 {
        assert_eq!(normalize(LETTER), first);
    }
}

#[test]
fn test_whitespace_only_input() {
    let out = normalize(" \n\t\n  ");
    assert_eq!(out.formatted_text, "");
    assert!(out.paragraphs.is_empty());
    assert_eq!(out.stats.original_chars, 6);
    assert_eq!(out.stats.cleaned_chars, 0);
    assert_eq!(out.stats.reduction_percent, 100);

    assert_eq!(normalize("").stats.original_chars, 0);
    assert_eq!(normalize("").stats.reduction_percent, 0);
}

#[test]
fn test_sentence_break_preserved() {
    let out = normalize("They told us. me too");
    assert_eq!(out.formatted_text, "They told us. me too");
}
