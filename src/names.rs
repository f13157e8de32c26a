use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters that are not allowed in file or folder names on common filesystems
const ILLEGAL_CHARS: &str = r#"[\\/*?:"<>|]"#;

/// Institutional prefix on course names ("DEE - ...")
const COURSE_PREFIX: &str = r"(?i)^\s*DEE\s*-\s*";

/// Trailing semester designator ("... - 1º Semestre 2025/2026")
const COURSE_SUFFIX: &str = r"(?i)\s*-\s*\d+.*Semestre\s*[\d/]*\s*$";

fn illegal_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ILLEGAL_CHARS).expect("Invalid sanitize regex"))
}

fn course_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COURSE_PREFIX).expect("Invalid course prefix regex"))
}

fn course_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COURSE_SUFFIX).expect("Invalid course suffix regex"))
}

/// Remove `\ / * ? : " < > |` and leave everything else untouched.
pub fn sanitize(name: &str) -> String {
    illegal_chars().replace_all(name, "").into_owned()
}

/// Diacritic-insensitive lowercase form used for keyword matching.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Turn a Moodle course fullname into a folder name.
///
/// Strips the institutional prefix, then the semester suffix, trims and
/// sanitizes. The steps only ever remove characters, so they are repeated
/// until nothing changes; this keeps the result stable when sanitizing
/// uncovers a prefix that was hidden behind an illegal character.
pub fn clean_course_name(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_once(name: &str) -> String {
    let without_prefix = course_prefix().replace(name, "");
    let without_suffix = course_suffix().replace(&without_prefix, "");
    sanitize(without_suffix.trim()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_illegal_characters() {
        assert_eq!(sanitize("Report: Final?.pdf"), "Report Final.pdf");
        assert_eq!(sanitize(r#"a\b/c*d?e:f"g<h>i|j"#), "abcdefghij");
    }

    #[test]
    fn sanitize_keeps_everything_else() {
        let name = "Álgebra Linear (2ª parte) - ficha #3 [v2].pdf";
        assert_eq!(sanitize(name), name);
    }

    #[test]
    fn normalize_drops_diacritics_and_case() {
        assert_eq!(normalize("Aulas Práticas"), "aulas praticas");
        assert_eq!(normalize("GUIÃO Laboratório"), "guiao laboratorio");
        assert_eq!(normalize("Sumário"), "sumario");
    }

    #[test]
    fn cleans_prefix_and_semester_suffix() {
        assert_eq!(
            clean_course_name("DEE - Álgebra - 1º Semestre 2025/2026"),
            "Álgebra"
        );
        assert_eq!(
            clean_course_name("dee - Sistemas Digitais - 2º Semestre 2024/2025"),
            "Sistemas Digitais"
        );
    }

    #[test]
    fn leaves_plain_names_alone() {
        assert_eq!(clean_course_name("Física Aplicada"), "Física Aplicada");
        assert_eq!(clean_course_name("  Redes  "), "Redes");
    }

    #[test]
    fn sanitizes_after_stripping() {
        assert_eq!(
            clean_course_name("DEE - Programação: Avançada - 1º Semestre 2025"),
            "Programação Avançada"
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let samples = [
            "DEE - Álgebra - 1º Semestre 2025/2026",
            "DEE - DEE - Eletrónica - 2º Semestre 2025",
            "DEE :- Circuitos",
            "Matemática?",
            "",
            "   ",
            "Projeto - 1º Semestre",
        ];
        for sample in samples {
            let once = clean_course_name(sample);
            assert_eq!(clean_course_name(&once), once, "not idempotent for {sample:?}");
        }
    }
}
