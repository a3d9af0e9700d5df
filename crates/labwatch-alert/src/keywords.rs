/// 大小写不敏感的整词/短语匹配
///
/// 调用方需保证 `text` 与 `keyword` 都已转为小写。关键字前方必须是词边界；
/// 后方允许直接是词边界，或复数后缀 `s`/`es` 再接词边界。
/// 因此 `critical value` 命中 `critical values`，而 `stat` 不会命中 `status`。
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }

    text.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before = text[..start].chars().next_back();
        !before.is_some_and(char::is_alphanumeric) && ends_word(&text[end..])
    })
}

const PLURAL_SUFFIXES: [&str; 3] = ["", "s", "es"];

fn ends_word(rest: &str) -> bool {
    PLURAL_SUFFIXES.iter().any(|suffix| {
        rest.strip_prefix(*suffix)
            .is_some_and(|tail| !tail.chars().next().is_some_and(char::is_alphanumeric))
    })
}

/// 归一化关键字列表
pub(crate) fn normalize(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundaries() {
        assert!(contains_keyword("need stat coverage", "stat"));
        assert!(contains_keyword("stat!", "stat"));
        assert!(contains_keyword("(stat)", "stat"));
        assert!(!contains_keyword("qc status pending", "stat"));
        assert!(!contains_keyword("thermostat broken", "stat"));
    }

    #[test]
    fn test_phrases() {
        assert!(contains_keyword("possible wrong blood in tube", "wrong blood"));
        assert!(!contains_keyword("wrong bloodwork", "wrong blood"));
    }

    #[test]
    fn test_repeated_occurrence_after_partial_hit() {
        // 第一次出现在单词内部，第二次是独立单词
        assert!(contains_keyword("status check: stat", "stat"));
    }

    #[test]
    fn test_plural_forms() {
        assert!(contains_keyword("critical values pending callbacks", "critical value"));
        assert!(contains_keyword("two analyzers offline", "analyzer"));
        assert!(contains_keyword("shifts uncovered tonight", "shift"));
        assert!(contains_keyword("all centrifuge boxes jammed", "box"));
        assert!(!contains_keyword("analyzersx offline", "analyzer"));
        assert!(!contains_keyword("stationary", "stat"));
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        assert!(!contains_keyword("anything", ""));
    }
}
