use super::types::ChatMessage;

pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"
You are a radiology report classifier specializing in lumbar spine stenosis detection.
For each lumbar level (L1/2, L2/3, L3/4, L4/5, L5/S1), determine the presence of central, foramen, and subarticular stenosis.

**CRITICAL DISTINCTION - READ CAREFULLY:**
- **STENOSIS** = narrowing of the spinal canal, neural foramen, or lateral recess/subarticular space
- **DISC CONDITIONS** (protrusion, extrusion, herniation, bulging) are NOT stenosis unless they explicitly cause stenosis
- **COMPROMISE** = pressure or impingement, but NOT necessarily stenosis

**What counts as STENOSIS (True):**
- "central canal stenosis"
- "neural foraminal stenosis" / "foraminal stenosis" / "neural foramen narrowing"
- "lateral recess stenosis" / "subarticular stenosis" / "subarticular recess stenosis"
- Severity: "moderate", "severe", "degenerative" stenosis = True
- Grading: Grade 2, Grade 3 stenosis = True

**What does NOT count as stenosis (False):**
- "disc protrusion", "disc extrusion", "disc herniation", "disc bulging" (unless explicitly causing stenosis)
- "compromise", "compression", "impingement" (unless explicitly called stenosis)
- "mild" stenosis = False
- Grade 0, Grade 1 stenosis = False
- **Facet arthrosis/arthropathy/osteoarthritis alone does NOT imply stenosis.**

**Response Format - STRICT JSON (return JSON only; no extra text):**
{
"L1/2": bool,
"L2/3": bool,
"L3/4": bool,
"L4/5": bool,
"L5/S1": bool,
"need_check": bool
}

**Additional Rules:**
1. IGNORE any text after "영상의학과 전공의 응급판독입니다. 정식 판독시 내용이 바뀔수 있으니 반드시 확인하시기 바랍니다."
2. If stenosis is mentioned but NO specific lumbar level is given, set "need_check" = true and all levels = false.
3. When severity conflicts, prioritize the mention WITH severity information.
4. Think step-by-step before outputting JSON, but output ONLY the JSON object.
"#;

const OUTPUT_CONTRACT: &str = "Return STRICT JSON only with the exact keys and boolean values. \
If unsure about level mapping, set need_check=true and all levels=false. \
No explanations or markdown.";

/// Build the per-report user message.
pub fn build_user_prompt(normalized_text: &str) -> String {
    format!("Report:\n{normalized_text}\n\n{OUTPUT_CONTRACT}")
}

/// The full conversation for one report: system policy, then the report.
pub fn build_messages(normalized_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(CLASSIFICATION_SYSTEM_PROMPT),
        ChatMessage::user(build_user_prompt(normalized_text)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::labeling::types::Role;

    #[test]
    fn builds_system_then_user() {
        let messages = build_messages("L4/5 moderate stenosis.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[0].content, CLASSIFICATION_SYSTEM_PROMPT);
    }

    #[test]
    fn user_message_embeds_report() {
        let prompt = build_user_prompt("Mild L3/4 spinal stenosis noted.");
        assert!(prompt.starts_with("Report:\nMild L3/4 spinal stenosis noted.\n\n"));
        assert!(prompt.contains("STRICT JSON"));
        assert!(prompt.contains("need_check=true"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(build_messages("same"), build_messages("same"));
    }

    #[test]
    fn system_prompt_encodes_policy() {
        for needle in [
            "\"L1/2\": bool",
            "\"L5/S1\": bool",
            "\"need_check\": bool",
            "\"mild\" stenosis = False",
            "Grade 0, Grade 1 stenosis = False",
            "Facet arthrosis/arthropathy/osteoarthritis alone does NOT imply stenosis",
            "NO specific lumbar level",
            "prioritize the mention WITH severity",
        ] {
            assert!(
                CLASSIFICATION_SYSTEM_PROMPT.contains(needle),
                "system prompt missing {needle:?}"
            );
        }
    }

    #[test]
    fn system_prompt_names_disclaimer_marker() {
        assert!(CLASSIFICATION_SYSTEM_PROMPT
            .contains(crate::pipeline::labeling::normalize::DISCLAIMER_MARKER));
    }
}
