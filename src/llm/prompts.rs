//! Prompt assembly for the policy-document fallback path.

use crate::types::ChatTurn;

/// System prompt for answers grounded on retrieved policy paragraphs.
pub const POLICY_SYSTEM_PROMPT: &str = "\
당신은 영우랩스의 도우미 어시스턴트입니다. 다음과 같은 역할을 수행합니다:
1. 주어진 컨텍스트를 바탕으로 정확하고 간결한 답변을 제공합니다
2. 직원 정보에 대한 질문이면 관련된 상세 정보에 초점을 맞춥니다
3. 회사 절차에 대한 질문이면 단계별 안내를 제공합니다
4. 확실하지 않은 내용이 있다면, 그 한계를 인정하고 대안적인 정보 획득 방법을 제안합니다
5. 항상 전문적이고 친근한 톤을 유지합니다
6. 컨텍스트에 충분한 정보가 없다면, 그 사실을 말하고 추가 정보를 찾을 수 있는 방법을 제안합니다

다음 사항을 기억하세요:
- 답변은 구체적이고 명확해야 합니다
- 여러 항목이 있는 경우 글머리 기호를 사용합니다
- 관련 링크나 참조가 있다면 포함합니다
- 회사 용어를 일관되게 사용합니다
- 질문이 모호하다면 명확히 해달라고 요청합니다
- 컨텍스트가 질문과 완전히 일치하지 않는다면, 어떤 정보가 있는지 설명합니다

답변 형식 규칙:
- 컨텍스트에 있는 내용만 바탕으로 답변하고, 내용을 새로 지어내지 않습니다
- 목록과 표를 한 답변에서 섞어 쓰지 않습니다. 항목 나열은 글머리 기호 목록으로, 항목별 속성 비교는 표로 작성합니다
- 표는 다음 형식을 그대로 따릅니다:
  | 항목 | 내용 |
  | --- | --- |
  | 연차 일수 | 15일 |
- 컨텍스트에 없는 보충 설명이 필요한 경우, 답변 본문과 빈 줄로 구분하여 '참고:'로 시작하는 별도 단락에 작성합니다";

/// User prompt: retrieved context, then recent conversation, then the
/// question, with an instruction to admit gaps instead of inventing.
pub fn build_policy_user_prompt(question: &str, context: &[String], history: &[ChatTurn]) -> String {
    let mut prompt = String::new();

    prompt.push_str("컨텍스트:\n");
    for (i, passage) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, passage));
    }

    if !history.is_empty() {
        prompt.push_str("\n이전 대화:\n");
        for turn in history {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
    }

    prompt.push_str(&format!("\n질문: {question}\n\n"));
    prompt.push_str(
        "컨텍스트를 바탕으로 도움이 되는 답변을 제공해주세요. \
         컨텍스트가 질문을 완전히 다루지 못한다면, 그 사실을 인정하고 가능한 최선의 답변을 제공해주세요. \
         확실하지 않은 부분이 있다면 그렇게 말씀해주세요.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_numbers_context_passages() {
        let context = vec!["1조 총칙".to_string(), "2조 근태".to_string()];
        let prompt = build_policy_user_prompt("근태 규정 알려줘", &context, &[]);
        assert!(prompt.contains("[1] 1조 총칙"));
        assert!(prompt.contains("[2] 2조 근태"));
        assert!(prompt.contains("질문: 근태 규정 알려줘"));
        assert!(!prompt.contains("이전 대화"));
    }

    #[test]
    fn user_prompt_includes_history_when_present() {
        let history = vec![ChatTurn {
            role: "user".into(),
            content: "연차는 며칠인가요?".into(),
        }];
        let prompt = build_policy_user_prompt("이월도 되나요?", &[], &history);
        assert!(prompt.contains("이전 대화"));
        assert!(prompt.contains("user: 연차는 며칠인가요?"));
    }
}
