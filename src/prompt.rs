//! Instruction text sent to the generation model.
//!
//! The template fixes the hard constraints of the transformation. User text is
//! appended verbatim as an additional-instructions suffix when present. The
//! output depends on nothing but the input.

/// Fixed transformation instructions.
pub const SYSTEM_TEMPLATE: &str = "\
Transform the person(s) in this image into a warm Christmas/holiday scene while preserving all faces exactly as in the original (no changes to facial features, expressions, or identity) and keeping their original poses.

GUIDELINES:
Add warm, ambient Christmas lighting (soft, 2700-3200K).

- Background: If the background is visible and defined, DO NOT replace it. Instead, decorate the existing environment by naturally integrating Christmas elements such as garlands on walls, hanging Christmas lights, ornaments on visible surfaces, stockings on fireplaces (if present), candles, or small festive decorations that complement the original space. Only if the background is unclear, blurred, or undefined, then replace it with an appropriate Christmas scene.

- Dressing: Dress the people in festive Christmas attire (Santa hat, Christmas sweater, plaid scarf, red/green holiday clothing) ensuring the outfits appear natural. Maintain original composition and proportions; avoid altering facial structure. The final result should show the original space enhanced with Christmas decorations rather than completely transformed.

- Eyes: The eyes must remain EXACTLY identical to the original photo.
";

/// Label introducing the caller's free text.
pub const USER_PROMPT_LABEL: &str = "Additional user prompt: ";

/// Build the instruction text for `user_prompt`.
///
/// An empty prompt adds nothing; any other text is appended as given.
pub fn compose(user_prompt: &str) -> String {
    if user_prompt.is_empty() {
        return SYSTEM_TEMPLATE.to_string();
    }

    let mut text = String::from(SYSTEM_TEMPLATE);
    text.push('\n');
    text.push_str(USER_PROMPT_LABEL);
    text.push_str(user_prompt);
    text.push('\n');
    text
}
