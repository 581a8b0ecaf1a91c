//! Mixed Chinese/English word counting.

/// Count words in mixed Chinese and Latin text.
///
/// Every CJK unified ideograph in `U+4E00..=U+9FA5` counts as one word and
/// every maximal run of ASCII letters counts as one word. Digits,
/// punctuation, whitespace, and other scripts are not counted.
///
/// ```rust
/// use novel_muse_core::words::count_words;
///
/// assert_eq!(count_words("这是一个测试文本"), 8);
/// assert_eq!(count_words("Hello world 你好世界"), 6);
/// assert_eq!(count_words(""), 0);
/// ```
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    let mut in_latin_run = false;

    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            if !in_latin_run {
                count += 1;
                in_latin_run = true;
            }
            continue;
        }
        in_latin_run = false;
        if ('\u{4e00}'..='\u{9fa5}').contains(&ch) {
            count += 1;
        }
    }

    count
}
