/// Presentation-time HTML cleaning of user-supplied text
///
/// Review text and book descriptions are stored as entered. They are turned
/// into HTML only when rendered, and every rendering goes through ammonia.

/// Render plain user text as safe HTML
///
/// Blank lines separate paragraphs, single newlines become `<br>`. Any
/// markup in the input survives only if ammonia's allow-list permits it.
pub fn render_safe(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");

    let html: String = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| format!("<p>{}</p>", paragraph.replace('\n', "<br>")))
        .collect();

    ammonia::clean(&html)
}
