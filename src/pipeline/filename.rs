//! Filename derivation for section PDFs.
//!
//! `{stem}_{nn}_{a}-{b}.pdf`, where `stem` comes from the section title (or
//! `{original_stem}_section_{n}` for placeholder metadata), `nn` is the
//! zero-padded section number and `a-b` the 1-indexed page range.
//!
//! Locale letters are folded through a fixed lookup table, then everything
//! outside `[A-Za-z0-9_-]` is dropped. Both steps are idempotent.

use crate::output::{AnalysisResult, AnalyzedSection};
use std::collections::HashSet;

/// Longest stem kept before the section number and page range.
pub const MAX_STEM_CHARS: usize = 80;

/// Letter → ASCII letter. Turkish first, then common Western-European accents.
const TRANSLITERATION: &[(char, char)] = &[
    ('ç', 'c'), ('Ç', 'C'), ('ğ', 'g'), ('Ğ', 'G'), ('ı', 'i'), ('İ', 'I'),
    ('ö', 'o'), ('Ö', 'O'), ('ş', 's'), ('Ş', 'S'), ('ü', 'u'), ('Ü', 'U'),
    ('â', 'a'), ('Â', 'A'), ('î', 'i'), ('Î', 'I'), ('û', 'u'), ('Û', 'U'),
    ('à', 'a'), ('á', 'a'), ('ä', 'a'), ('ã', 'a'), ('å', 'a'),
    ('À', 'A'), ('Á', 'A'), ('Ä', 'A'), ('Ã', 'A'), ('Å', 'A'),
    ('è', 'e'), ('é', 'e'), ('ê', 'e'), ('ë', 'e'),
    ('È', 'E'), ('É', 'E'), ('Ê', 'E'), ('Ë', 'E'),
    ('ì', 'i'), ('í', 'i'), ('ï', 'i'), ('Ì', 'I'), ('Í', 'I'), ('Ï', 'I'),
    ('ò', 'o'), ('ó', 'o'), ('ô', 'o'), ('õ', 'o'), ('ø', 'o'),
    ('Ò', 'O'), ('Ó', 'O'), ('Ô', 'O'), ('Õ', 'O'), ('Ø', 'O'),
    ('ù', 'u'), ('ú', 'u'), ('Ù', 'U'), ('Ú', 'U'),
    ('ñ', 'n'), ('Ñ', 'N'), ('ý', 'y'), ('ÿ', 'y'), ('Ý', 'Y'),
];

/// Replace table letters with their ASCII counterparts; other characters pass through.
pub fn transliterate(text: &str) -> String {
    text.chars()
        .map(|c| {
            TRANSLITERATION
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Reduce `text` to `[A-Za-z0-9_-]`: whitespace and path separators become
/// `_`, everything else is dropped, `_` runs collapse, ends are trimmed and
/// the result is capped at [`MAX_STEM_CHARS`].
pub fn sanitize_stem(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let mapped = match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' => Some(c),
            '_' | '/' | '\\' => Some('_'),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        };
        if let Some(m) = mapped {
            if m == '_' && out.ends_with('_') {
                continue;
            }
            out.push(m);
        }
    }
    let capped: String = out.chars().take(MAX_STEM_CHARS).collect();
    capped.trim_matches(|c| c == '_' || c == '-').to_string()
}

/// Transliterate then sanitize; empty results become `section`.
pub fn filename_stem(text: &str) -> String {
    let stem = sanitize_stem(&transliterate(text));
    if stem.is_empty() {
        "section".to_string()
    } else {
        stem
    }
}

/// File name for one section, before collision handling.
pub fn section_filename(section: &AnalyzedSection, source_stem: &str) -> String {
    let stem = if section.metadata.fallback || section.metadata.title.trim().is_empty() {
        filename_stem(&format!("{source_stem}_section_{}", section.index))
    } else {
        filename_stem(&section.metadata.title)
    };
    format!(
        "{stem}_{:02}_{}.pdf",
        section.index,
        section.plan.label()
    )
}

/// File names for every section in order, unique case-insensitively.
pub fn derive_filenames(analysis: &AnalysisResult) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    analysis
        .sections
        .iter()
        .map(|section| {
            let base = section_filename(section, &analysis.source.name);
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.to_lowercase()) {
                let stem = base.trim_end_matches(".pdf");
                candidate = format!("{stem}_{n}.pdf");
                n += 1;
            }
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanStrategy;
    use crate::output::{
        AnalysisStats, SectionMetadata, SectionPlan, SourceInfo, ANALYSIS_SCHEMA_VERSION,
    };

    fn section(index: usize, start: usize, end: usize, title: &str, fallback: bool) -> AnalyzedSection {
        let plan = SectionPlan::fixed(start, end);
        AnalyzedSection {
            index,
            metadata: SectionMetadata {
                title: title.to_string(),
                description: String::new(),
                keywords: vec![],
                reasoning: String::new(),
                fallback,
            },
            plan,
            warnings: vec![],
        }
    }

    #[test]
    fn turkish_letters_are_folded() {
        assert_eq!(
            transliterate("Çalışma Süresi ve Ücretler İŞĞÖ"),
            "Calisma Suresi ve Ucretler ISGO"
        );
    }

    #[test]
    fn transliteration_is_idempotent_and_safe() {
        let samples = [
            "Sosyal Güvenlik Kurumu: Genelge 2024/5 <taslak>",
            "Ünvan — İşçi \"hakları\" \t\n yönetmeliği",
            "Résumé: naïve façade ñandú",
            "../../etc/passwd",
            "   ",
            "日本語のタイトル",
        ];
        for s in samples {
            let once = filename_stem(s);
            assert_eq!(filename_stem(&once), once, "not idempotent for {s:?}");
            assert_eq!(transliterate(&transliterate(s)), transliterate(s));
            assert!(
                once.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "unsafe char in {once:?}"
            );
        }
    }

    #[test]
    fn sanitize_examples() {
        assert_eq!(
            filename_stem("Sosyal Güvenlik: Genelge 2024/5"),
            "Sosyal_Guvenlik_Genelge_2024_5"
        );
        assert_eq!(filename_stem("../../etc/passwd"), "etc_passwd");
        assert_eq!(filename_stem("日本語"), "section");
        assert_eq!(filename_stem(&"a".repeat(200)).len(), MAX_STEM_CHARS);
    }

    #[test]
    fn filename_layout() {
        let s = section(3, 9, 14, "Prim Borcu Yapılandırması", false);
        assert_eq!(
            section_filename(&s, "mevzuat"),
            "Prim_Borcu_Yapilandirmasi_03_10-15.pdf"
        );
    }

    #[test]
    fn colliding_names_get_numeric_suffixes() {
        // derive_filenames is public and may see an unvalidated analysis.
        let sections = vec![
            section(1, 0, 2, "Genel", false),
            section(1, 0, 2, "GENEL", false),
            section(1, 0, 2, "Genel", false),
        ];
        let analysis = AnalysisResult {
            schema_version: ANALYSIS_SCHEMA_VERSION,
            source: SourceInfo {
                name: "mevzuat".into(),
                byte_size: 0,
            },
            document_title: None,
            advisory: None,
            stats: AnalysisStats {
                page_count: 3,
                section_count: 3,
                strategy: PlanStrategy::Fixed,
                strategy_used: PlanStrategy::Fixed,
                fixed_params: None,
                generated_sections: 3,
                fallback_sections: 0,
                ocr_pages: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                duration_ms: 0,
            },
            sections,
            warnings: vec![],
        };
        assert_eq!(
            derive_filenames(&analysis),
            vec![
                "Genel_01_1-3.pdf",
                "GENEL_01_1-3_2.pdf",
                "Genel_01_1-3_3.pdf",
            ]
        );
    }

    #[test]
    fn fallback_sections_use_source_stem() {
        let s = section(2, 4, 6, "Pages 5-7", true);
        assert_eq!(
            section_filename(&s, "Şirket raporu"),
            "Sirket_raporu_section_2_02_5-7.pdf"
        );
    }
}
