//! Prompt templates for the copilot.
//!
//! Every template quotes user text verbatim; the model is asked to return
//! only the resulting text so answers can be dropped straight into the draft.

/// One-click rewrites offered by the copilot panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CannedAction {
    Formal,
    Friendly,
    Translate,
    Grammar,
    Rephrase,
    Concise,
    Expand,
    Summary,
}

impl CannedAction {
    pub const ALL: [CannedAction; 8] = [
        CannedAction::Formal,
        CannedAction::Friendly,
        CannedAction::Translate,
        CannedAction::Grammar,
        CannedAction::Rephrase,
        CannedAction::Concise,
        CannedAction::Expand,
        CannedAction::Summary,
    ];

    pub fn id(self) -> &'static str {
        match self {
            CannedAction::Formal => "formal",
            CannedAction::Friendly => "friendly",
            CannedAction::Translate => "translate",
            CannedAction::Grammar => "grammar",
            CannedAction::Rephrase => "rephrase",
            CannedAction::Concise => "concise",
            CannedAction::Expand => "expand",
            CannedAction::Summary => "summary",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            CannedAction::Formal => "Make Formal",
            CannedAction::Friendly => "Make Friendly",
            CannedAction::Translate => "Translate",
            CannedAction::Grammar => "Fix Grammar",
            CannedAction::Rephrase => "Rephrase",
            CannedAction::Concise => "Make Concise",
            CannedAction::Expand => "Expand",
            CannedAction::Summary => "Summarize",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CannedAction::Formal => "Convert to professional tone",
            CannedAction::Friendly => "Convert to casual, friendly tone",
            CannedAction::Translate => "Translate to different languages",
            CannedAction::Grammar => "Correct grammar and spelling",
            CannedAction::Rephrase => "Rewrite with better clarity",
            CannedAction::Concise => "Shorten while keeping meaning",
            CannedAction::Expand => "Add more detail and context",
            CannedAction::Summary => "Create instant summary",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            CannedAction::Formal => "🎯",
            CannedAction::Friendly => "😊",
            CannedAction::Translate => "🌐",
            CannedAction::Grammar => "✅",
            CannedAction::Rephrase => "✍️",
            CannedAction::Concise => "✂️",
            CannedAction::Expand => "📝",
            CannedAction::Summary => "📋",
        }
    }

    /// Summary is the only action that works without a selection.
    pub fn needs_selection(self) -> bool {
        self != CannedAction::Summary
    }
}

/// Quick picks shown by the translate prompt.
pub const QUICK_LANGUAGES: [&str; 8] = [
    "Spanish", "French", "German", "Chinese", "Japanese", "Hindi", "Arabic", "Russian",
];

fn with_context(mut prompt: String, context: &str) -> String {
    if !context.trim().is_empty() {
        prompt.push_str("\n\nConversation context: ");
        prompt.push_str(context);
    }
    prompt
}

/// Prompt for a canned action. `Translate` without a language falls back to
/// the Spanish/English toggle.
pub fn action_prompt(action: CannedAction, text: &str, context: &str) -> String {
    let prompt = match action {
        CannedAction::Formal => format!(
            "Convert this text to a formal, professional tone while maintaining the original meaning: \"{text}\""
        ),
        CannedAction::Friendly => format!(
            "Convert this text to a friendly, casual tone while keeping the core message: \"{text}\""
        ),
        CannedAction::Translate => format!(
            "Translate this text to Spanish (if it's in English) or English (if it's in another language): \"{text}\""
        ),
        CannedAction::Grammar => format!(
            "Fix all grammar, spelling, and punctuation errors in this text while preserving the original meaning: \"{text}\""
        ),
        CannedAction::Rephrase => format!(
            "Rephrase this text to be clearer and more engaging while keeping the same meaning: \"{text}\""
        ),
        CannedAction::Concise => format!(
            "Make this text more concise and to the point while preserving all important information: \"{text}\""
        ),
        CannedAction::Expand => format!(
            "Expand this text with more detail, examples, and context to make it more comprehensive: \"{text}\""
        ),
        CannedAction::Summary => format!(
            "Create a clear, concise summary of this text highlighting the main points: \"{text}\""
        ),
    };
    with_context(prompt, context)
}

pub fn translate_prompt(text: &str, language: &str, context: &str) -> String {
    with_context(
        format!(
            "Translate this text to {language}. Return only the translation, without any explanations: \"{text}\""
        ),
        context,
    )
}

pub fn instructions_prompt(text: &str, instructions: &str) -> String {
    format!(
        "I have the following text:\n\"{text}\"\n\nApply these changes to it:\n\"{instructions}\"\n\nReturn only the modified text, without any explanations or additional content."
    )
}

/// Completion for the draft, given the last five history lines.
pub fn suggestion_prompt(history: &[String], input: &str) -> String {
    let context = last(history, 5).join("\n");
    format!(
        "Based on this conversation context:\n{context}\n\nThe user is writing: \"{input}\"\n\nSuggest a natural completion or improvement for their message. Make it sound conversational and contextually appropriate. Only return the suggested text, nothing else. Keep it under 100 words."
    )
}

pub fn selection_suggestion_prompt(selected: &str, instructions: &str) -> String {
    format!(
        "I have the following text:\n\"{selected}\"\n\nBased on these instructions or message idea:\n\"{instructions}\"\n\nSuggest an improved version of the selected text. Return only the modified text without any explanations."
    )
}

pub fn analysis_prompt(history: &[String]) -> String {
    let conversation = last(history, 10).join("\n");
    format!(
        "Analyze this conversation and provide helpful insights:\n{conversation}\n\nProvide a brief analysis focusing on:\n1. Main topics discussed\n2. Overall tone and sentiment\n3. Communication style\n4. Any helpful suggestions for better engagement\n\nKeep the analysis under 150 words and make it actionable."
    )
}

/// Copilot chat turn. `transcript` is the already-formatted `role: content`
/// lines that precede `message`.
pub fn chat_prompt(transcript: &str, message: &str) -> String {
    let mut prompt = String::from(
        "You are an AI assistant built into a chat app. Answer questions about the app or anything else the user asks. Be concise and friendly.\n",
    );
    if !transcript.trim().is_empty() {
        prompt.push_str("\nPrevious messages:\n");
        prompt.push_str(transcript);
        prompt.push('\n');
    }
    prompt.push_str(&format!("\nuser: {message}\nassistant:"));
    prompt
}

/// The trailing `n` items of `items`.
pub fn last<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("m{i}")).collect()
    }

    #[test]
    fn test_action_ids_round_trip() {
        for action in CannedAction::ALL {
            assert_eq!(CannedAction::from_id(action.id()), Some(action));
        }
        assert_eq!(CannedAction::from_id("shout"), None);
    }

    #[test]
    fn test_only_summary_works_without_selection() {
        let free: Vec<_> = CannedAction::ALL
            .into_iter()
            .filter(|a| !a.needs_selection())
            .collect();
        assert_eq!(free, vec![CannedAction::Summary]);
    }

    #[test]
    fn test_action_prompt_quotes_text_and_appends_context() {
        let prompt = action_prompt(CannedAction::Formal, "hey there", "a\nb");
        assert_eq!(
            prompt,
            "Convert this text to a formal, professional tone while maintaining the original meaning: \"hey there\"\n\nConversation context: a\nb"
        );
    }

    #[test]
    fn test_action_prompt_without_context() {
        let prompt = action_prompt(CannedAction::Grammar, "teh", "  ");
        assert!(prompt.ends_with("\"teh\""));
    }

    #[test]
    fn test_translate_prompt_names_language() {
        let prompt = translate_prompt("hola", "Hindi", "");
        assert!(prompt.contains("to Hindi"));
        assert!(prompt.contains("\"hola\""));
    }

    #[test]
    fn test_suggestion_uses_last_five_lines() {
        let prompt = suggestion_prompt(&history(8), "so what about");
        assert!(prompt.starts_with("Based on this conversation context:\nm4\nm5\nm6\nm7\nm8\n\n"));
        assert!(!prompt.contains("m3"));
        assert!(prompt.contains("The user is writing: \"so what about\""));
    }

    #[test]
    fn test_analysis_uses_last_ten_lines() {
        let prompt = analysis_prompt(&history(12));
        assert!(!prompt.contains("m2\n"));
        assert!(prompt.contains("m3\nm4"));
        assert!(prompt.contains("m12"));
    }

    #[test]
    fn test_chat_prompt_includes_transcript() {
        let prompt = chat_prompt("user: hi\nassistant: hello", "what can you do?");
        assert!(prompt.contains("Previous messages:\nuser: hi\nassistant: hello\n"));
        assert!(prompt.ends_with("user: what can you do?\nassistant:"));
        assert!(!chat_prompt("", "x").contains("Previous messages"));
    }

    #[test]
    fn test_last_handles_short_slices() {
        assert_eq!(last(&[1, 2], 5), &[1, 2]);
        assert_eq!(last(&[1, 2, 3], 2), &[2, 3]);
        assert!(last::<u8>(&[], 3).is_empty());
    }
}
