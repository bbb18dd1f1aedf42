//! Final prompt assembly

/// Build the prompt sent to the inference model.
///
/// A blank context yields the bare user message. Otherwise the context and
/// the question go into two labeled sections, context first; downstream
/// models are sensitive to this framing so the labels must not change.
pub fn build_prompt(context: &str, user_message: &str) -> String {
    if context.trim().is_empty() {
        return user_message.to_string();
    }

    format!(
        "Conversation context:\n{}\n\nCurrent question: {}\n",
        context, user_message
    )
}
