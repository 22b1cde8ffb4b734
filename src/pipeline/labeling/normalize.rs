// Normalize raw report text before it reaches the model.
// Unifies line endings, drops everything after the resident-preliminary-read
// disclaimer, and trims.

/// Boilerplate appended to preliminary readings by residents. Content after it
/// is provisional and must not be classified.
pub const DISCLAIMER_MARKER: &str =
    "영상의학과 전공의 응급판독입니다. 정식 판독시 내용이 바뀔수 있으니 반드시 확인하시기 바랍니다.";

/// Escaped carriage return left behind by spreadsheet exports.
const ESCAPED_CR: &str = "_x000D_";

/// Normalize a report cell. A missing cell becomes an empty string.
pub fn normalize(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let unified = raw
        .replace(ESCAPED_CR, "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let kept = match unified.find(DISCLAIMER_MARKER) {
        Some(pos) => &unified[..pos],
        None => unified.as_str(),
    };

    kept.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cell_is_empty() {
        assert_eq!(normalize(None), "");
    }

    #[test]
    fn unifies_line_endings() {
        let input = "a\r\nb\rc_x000D_d\ne";
        assert_eq!(normalize(Some(input)), "a\nb\nc\nd\ne");
    }

    #[test]
    fn escaped_cr_before_lf_becomes_blank_line() {
        assert_eq!(normalize(Some("a_x000D_\nb")), "a\n\nb");
    }

    #[test]
    fn truncates_at_disclaimer() {
        let input = format!("A{DISCLAIMER_MARKER}B");
        assert_eq!(normalize(Some(input.as_str())), "A");
    }

    #[test]
    fn truncation_ignores_suffix_content() {
        let input = format!(
            "  L4/5 moderate stenosis.\n{DISCLAIMER_MARKER}\nL1/2 severe stenosis {DISCLAIMER_MARKER}"
        );
        assert_eq!(normalize(Some(input.as_str())), "L4/5 moderate stenosis.");
    }

    #[test]
    fn marker_only_yields_empty() {
        assert_eq!(normalize(Some(DISCLAIMER_MARKER)), "");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(normalize(Some("\n\t  Findings: normal.  \r\n")), "Findings: normal.");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "  x\r\ny  ",
            "plain",
            "",
            "a_x000D_b\r",
            "Mild L3/4 stenosis. 영상의학과 전공의 응급판독입니다. 정식 판독시 내용이 바뀔수 있으니 반드시 확인하시기 바랍니다. tail",
        ];
        for s in samples {
            let once = normalize(Some(s));
            assert_eq!(normalize(Some(once.as_str())), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn preserves_korean_text() {
        let input = "요추 4-5번 척추관 협착증 (moderate stenosis)";
        assert_eq!(normalize(Some(input)), input);
    }
}
