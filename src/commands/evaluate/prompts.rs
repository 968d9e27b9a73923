pub const INCORRECT_ANSWER_EXPLANATION: &str = "Answer was incorrect; not evaluated.";

pub const ANSWER_CHECK_SYSTEM_PROMPT: &str = "You judge multiple-choice answers. Decide whether the \
generated answer means the same thing as the correct answer. Ignore any leading option letter such as \
\"A.\" or \"C.\"; the letters may differ. Accept differences in wording that keep the essential facts, \
but reject any difference in a key fact such as a colour, a count, an instrument or a position. Reply \
with a single JSON object with one boolean key, \"is_correct\".";

pub const FACTUAL_SYSTEM_PROMPT: &str = "You check facts. Break the ground-truth reasoning and the \
generated reasoning into atomic facts (subject, object, attribute, action, location), compare them \
fact by fact, and score the fraction of ground-truth facts that the generated reasoning states \
correctly. Reply with a single JSON object with \"factual_consistency_score\" (a number from 0.0 to \
1.0) and \"explanation\" (a string listing matched, mismatched and missing facts).";

pub const SANITIZER_SYSTEM_PROMPT: &str = "You abstract reasoning into its core inferential claim. \
Remove every concrete detail (who, where, which colour, which object or instrument) unless that detail \
is the whole point, and restate the remaining logical relationship with generic placeholders such as \
\"the subject\", \"an attribute\", \"the setting\" or \"an instrument\". Keep the relationship itself: \
possession of an attribute, a causal link or a comparison. Reply with a single JSON object with one \
string key, \"sanitized_reasoning\".";

pub fn answer_check_prompt(generated: &str, correct: &str) -> String {
    format!(
        "Generated answer:\n\"{generated}\"\n\nCorrect answer:\n\"{correct}\"\n\n\
         Is the generated answer semantically equivalent to the correct answer?"
    )
}

pub fn factual_prompt(generated: &str, gold: &str) -> String {
    format!(
        "Generated reasoning:\n\"{generated}\"\n\nGround-truth reasoning:\n\"{gold}\"\n\n\
         Return the factual consistency score and explanation as a JSON object."
    )
}

pub fn sanitizer_prompt(reasoning: &str) -> String {
    format!(
        "Reasoning statement:\n\"{reasoning}\"\n\n\
         Return the sanitized core inferential claim as a JSON object."
    )
}
