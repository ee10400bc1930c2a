use spamguard::config::{MAX_SEQUENCE_LENGTH, OOV_INDEX, PAD_INDEX};
use spamguard::tokenizer::{normalize, parse_word_counts, Tokenizer, Vocabulary};

fn counts(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
    pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect()
}

#[test]
fn vocabulary_orders_by_frequency_and_pins_oov() {
    let vocab = Vocabulary::from_word_counts(counts(&[("win", 80), ("<OOV>", 5), ("free", 100)]));

    assert_eq!(vocab.get("<OOV>"), Some(OOV_INDEX));
    assert_eq!(vocab.get("free"), Some(2));
    assert_eq!(vocab.get("win"), Some(3));
    assert_eq!(vocab.index_of("unknown"), OOV_INDEX);
    assert_eq!(vocab.len(), 3);
}

#[test]
fn vocabulary_ties_keep_descriptor_order() {
    let vocab = Vocabulary::from_word_counts(counts(&[("beta", 3), ("alpha", 3), ("gamma", 9)]));

    assert_eq!(vocab.get("gamma"), Some(2));
    assert_eq!(vocab.get("beta"), Some(3));
    assert_eq!(vocab.get("alpha"), Some(4));
}

#[test]
fn keras_descriptor_with_string_word_counts() {
    let descriptor = r#"{
        "class_name": "Tokenizer",
        "config": {
            "num_words": null,
            "oov_token": "<OOV>",
            "word_counts": "{\"free\": 100, \"win\": 80, \"<OOV>\": 5}"
        }
    }"#;

    let parsed = parse_word_counts(descriptor).expect("parse descriptor");
    assert_eq!(parsed, counts(&[("free", 100), ("win", 80), ("<OOV>", 5)]));

    let vocab = Vocabulary::from_word_counts(parsed);
    assert_eq!(vocab.get("free"), Some(2));
    assert_eq!(vocab.get("win"), Some(3));
}

#[test]
fn bare_object_descriptor_is_accepted() {
    let parsed = parse_word_counts(r#"{"merhaba": 4, "kazandınız": 7}"#).expect("parse");
    assert_eq!(parsed, counts(&[("merhaba", 4), ("kazandınız", 7)]));
}

#[test]
fn descriptor_with_non_numeric_count_is_rejected() {
    assert!(parse_word_counts(r#"{"free": "lots"}"#).is_err());
    assert!(parse_word_counts(r#"["free"]"#).is_err());
}

fn tokenizer() -> Tokenizer {
    let vocab = Vocabulary::from_word_counts(counts(&[
        ("free", 100),
        ("win", 80),
        ("prize", 60),
        ("ödül", 10),
    ]));
    Tokenizer::new(vocab, MAX_SEQUENCE_LENGTH)
}

#[test]
fn short_text_is_padded_with_zeros() {
    let tokens = tokenizer().tokenize("FREE prize!!! zzz");

    assert_eq!(tokens.len(), 51);
    assert_eq!(&tokens[..3], &[2, 4, OOV_INDEX]);
    assert!(tokens[3..].iter().all(|t| *t == PAD_INDEX));
}

#[test]
fn long_text_keeps_the_first_words() {
    let text = (0..60)
        .map(|i| if i % 2 == 0 { "win" } else { "free" })
        .collect::<Vec<_>>()
        .join(" ");
    let tokens = tokenizer().tokenize(&text);

    assert_eq!(tokens.len(), 51);
    assert_eq!(tokens[0], 3);
    assert_eq!(tokens[1], 2);
    assert_eq!(tokens[50], 3);
}

#[test]
fn links_and_symbols_do_not_produce_tokens() {
    let tokens = tokenizer().tokenize("Win https://spam.example/x?y=1 ÖDÜL $$$");

    assert_eq!(&tokens[..2], &[3, 5]);
    assert!(tokens[2..].iter().all(|t| *t == PAD_INDEX));
}

#[test]
fn empty_and_symbol_only_text_is_all_padding() {
    let tok = tokenizer();
    assert!(tok.tokenize("").iter().all(|t| *t == PAD_INDEX));
    assert!(tok.tokenize("!!! ??? ***").iter().all(|t| *t == PAD_INDEX));
    assert_eq!(normalize("   "), "");
}

#[test]
fn tokenization_is_deterministic() {
    let tok = tokenizer();
    let text = "Tebrikler! Free ödül kazandınız, hemen tıklayın: http://x.y";
    assert_eq!(tok.tokenize(text), tok.tokenize(text));
}
