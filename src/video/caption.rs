use std::path::Path;

/// 按字符宽度折行，超长单词强制截断
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        while chars.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            lines.push(chars.drain(..width).collect());
        }
        if chars.is_empty() {
            continue;
        }

        if current_len > 0 && current_len + 1 + chars.len() > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars.iter());
        current_len += chars.len();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// 转义 FFmpeg 滤镜参数：先做选项级转义，再做滤镜图级转义
pub fn escape_filter_value(value: &str) -> String {
    let option_level = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// drawtext 滤镜：白字，半透明黑底，位于画面下方；字幕文本按原样绘制，不展开 `%{...}`
pub fn drawtext_filter(text_file: &Path, font_file: Option<&Path>, font_size: u32) -> String {
    let mut filter = format!(
        "drawtext=textfile={}:fontsize={}:fontcolor=white:line_spacing=10:x=(w-text_w)/2:y=h-text_h-h/8:box=1:boxcolor=black@0.5:boxborderw=20:expansion=none",
        escape_filter_value(&text_file.to_string_lossy()),
        font_size
    );
    if let Some(font) = font_file {
        filter.push_str(&format!(
            ":fontfile={}",
            escape_filter_value(&font.to_string_lossy())
        ));
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::path::PathBuf;

    #[test]
    fn test_wrap_basic() {
        let lines = wrap_text("The mystery of the deep ocean begins now.", 16);
        assert_eq!(lines, vec!["The mystery of", "the deep ocean", "begins now."]);
    }

    #[test]
    fn test_long_word_is_split() {
        let lines = wrap_text("a supercalifragilistic b", 5);
        assert_eq!(lines, vec!["a", "super", "calif", "ragil", "istic", "b"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn test_no_line_exceeds_width() {
        let mut rng = rand::thread_rng();
        let alphabet: Vec<char> = "abcdefghij深海😀".chars().collect();
        for _ in 0..300 {
            let width = rng.gen_range(1..40);
            let words: Vec<String> = (0..rng.gen_range(0..30))
                .map(|_| {
                    (0..rng.gen_range(1..60))
                        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                        .collect()
                })
                .collect();
            let text = words.join(" ");
            let lines = wrap_text(&text, width);
            assert!(lines.iter().all(|l| l.chars().count() <= width && !l.is_empty()));
            // 去掉空白后内容不丢失
            let original: String = text.split_whitespace().collect();
            let wrapped: String = lines.concat().split_whitespace().collect();
            assert_eq!(original, wrapped);
        }
    }

    #[test]
    fn test_escape_covers_both_levels() {
        assert_eq!(escape_filter_value("/tmp/plain/caption_01.txt"), "/tmp/plain/caption_01.txt");
        assert_eq!(escape_filter_value("a:b"), "a\\\\:b");
        assert_eq!(escape_filter_value("a,b"), "a\\,b");
        assert_eq!(escape_filter_value("C:\\fonts"), "C\\\\:\\\\\\\\fonts");
        assert_eq!(escape_filter_value("it's"), "it\\\\\\'s");
    }

    #[test]
    fn test_drawtext_escapes_paths() {
        let filter = drawtext_filter(
            &PathBuf::from("/tmp/a:b/caption_01.txt"),
            Some(&PathBuf::from("/fonts/Bold.ttf")),
            48,
        );
        assert!(filter.starts_with("drawtext=textfile=/tmp/a\\\\:b/caption_01.txt:"));
        assert!(filter.contains("boxcolor=black@0.5"));
        assert!(filter.ends_with(":fontfile=/fonts/Bold.ttf"));
    }

    #[test]
    fn test_caption_text_is_not_expanded() {
        let filter = drawtext_filter(&PathBuf::from("/tmp/caption_01.txt"), None, 48);
        assert!(filter.contains(":expansion=none"));
    }
}
