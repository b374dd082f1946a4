//! slug 随机生成。

use rand::{Rng, distributions::Alphanumeric};

/// 默认 slug 长度：62^6 ≈ 5.7e10 种取值。
pub(crate) const DEFAULT_SLUG_LEN: usize = 6;
/// 允许配置的最短 slug。
pub(crate) const MIN_SLUG_LEN: usize = 4;
/// 允许配置的最长 slug。
pub(crate) const MAX_SLUG_LEN: usize = 64;

/// 从 `[A-Za-z0-9]` 中等概率抽样生成定长 slug。
pub(crate) fn generate_slug(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// 判断字符串是否可能是本服务签发的 slug。
pub(crate) fn is_slug_alphabet(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{DEFAULT_SLUG_LEN, generate_slug, is_slug_alphabet};

    #[test]
    fn slugs_match_length_and_alphabet() {
        for length in [4, DEFAULT_SLUG_LEN, 32] {
            let slug = generate_slug(length);
            assert_eq!(slug.len(), length);
            assert!(is_slug_alphabet(&slug), "unexpected char in {slug}");
        }
    }

    #[test]
    fn samples_cover_letters_and_digits() {
        let pooled: String = (0..200).map(|_| generate_slug(DEFAULT_SLUG_LEN)).collect();
        assert!(pooled.bytes().any(|b| b.is_ascii_uppercase()));
        assert!(pooled.bytes().any(|b| b.is_ascii_lowercase()));
        assert!(pooled.bytes().any(|b| b.is_ascii_digit()));

        let distinct: HashSet<String> = (0..200).map(|_| generate_slug(DEFAULT_SLUG_LEN)).collect();
        assert!(distinct.len() > 190);
    }

    #[test]
    fn alphabet_check_rejects_separators() {
        assert!(!is_slug_alphabet(""));
        assert!(!is_slug_alphabet("ab/cd"));
        assert!(!is_slug_alphabet("ab-cd"));
        assert!(is_slug_alphabet("Ab3Cd9"));
    }
}
