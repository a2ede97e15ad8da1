use crate::store::entities::Observation;

/// Fixed instruction sent with every classification request. It pins both the
/// allowed categories and the exact JSON reply schema.
pub const SYSTEM_INSTRUCTION: &str = r#"You are an assistant that analyzes user activity data to determine what the user is currently doing.

You have access to multiple data sources:
- Active Window: The currently active application
- Focused Text: Text from the focused element
- Clipboard: Content in the clipboard
- Screen OCR: Text extracted from screen capture

Analyze this data and classify the user's activity into one of these categories:
- coding: Writing, editing, or reviewing code
- researching: Reading articles, papers, documentation, or searching for information
- browsing: General web browsing, social media, or casual internet use
- emailing: Composing, reading, or managing emails
- messaging: Using chat applications, messaging apps, or communication tools
- gaming: Playing video games or game-related activities
- watching: Watching videos, streams, or multimedia content
- writing: Writing documents, notes, or creative content
- designing: Working on design, graphics, or creative projects
- working: General work activities not covered by other categories
- unknown: Unable to determine the activity

Consider the following patterns:
- Coding: Look for code syntax, function definitions, imports, IDE elements
- Messaging: Look for chat interfaces, message bubbles, contact names
- Researching: Look for articles, documentation, search results
- Browsing: Look for web browser elements, URLs, navigation

Return your response in valid JSON format with these fields:
- activity: The classified activity (string)
- confidence: Confidence level 0.0-1.0 (float)
- description: Brief description of what you observed (string)
- details: Additional context or specific tools/applications detected (string)
- data_sources: Which data sources were most useful for classification (string)
- timestamp: Current timestamp (float)

Example response:
{
    "activity": "coding",
    "confidence": 0.85,
    "description": "User appears to be writing Rust code in a terminal editor",
    "details": "Detected Rust syntax, cargo output, and an editor window title",
    "data_sources": "Screen OCR and active window",
    "timestamp": 1234567890.123
}

Only return valid JSON, no additional text."#;

/// Concatenates the four capture fields into the prompt body.
pub fn prompt_body(observation: &Observation) -> String {
    format!(
        "Active Window: {}\nFocused Text: {}\nClipboard: {}\nScreen OCR: {}",
        observation.active_window,
        observation.focused_text,
        observation.clipboard,
        observation.ocr_text,
    )
}

/// Removes an optional markdown code fence wrapper, with or without a
/// language tag, from a model reply. Anything else is returned trimmed.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Skip a language tag on the opening fence line.
    rest.strip_prefix("json").unwrap_or(rest).trim()
}
