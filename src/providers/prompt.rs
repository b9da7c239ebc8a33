//! Prompt templates with `{name}` placeholders.

use std::collections::HashMap;

/// Built-in prompt for scene scripts.
pub const SCRIPT_PROMPT: &str = r#"You write narration for vertical first-person POV short videos.

Topic: {topic}
Setting: {environment}
Theme: everything happens in {theme} times.

Write exactly {scene_count} scenes that follow one continuous day in the life of the viewer.
Each scene has:
- "narration": one or two sentences in second person, spoken aloud, at most 30 words.
- "image_prompt": a hyper-realistic first-person GoPro-style shot description of the scene,
  showing the viewer's hands interacting with the environment, at most 60 words,
  never containing double quotes.

Skip waking up, getting dressed and walking. Prefer striking, unusual moments.

Respond with JSON only, in the form:
{"title": "...", "scenes": [{"narration": "...", "image_prompt": "..."}]}"#;

/// Built-in prompt for new queue ideas.
pub const IDEAS_PROMPT: &str = r#"You generate viral POV (point of view) short video ideas as tab-separated rows.

Output exactly {count} rows and nothing else: no headings, no Markdown, no quotes, no numbering beyond the Id field.
Each row has exactly 7 fields separated by TAB characters:
Id	Idea	Hashtag	Caption	Production	Environment_Prompt	Publishing

- Id: starts at 1 and increments by 1.
- Idea: starts with "POV:" followed by an immersive scenario of at most 13 words.
- Hashtag: 3 to 5 relevant hashtags, for example #POV #History.
- Caption: short and catchy.
- Production: always exactly "for production".
- Environment_Prompt: at most 20 words describing place, period and atmosphere.
- Publishing: always exactly "pending".

Every idea must be about {theme} characters, scenarios or experiences."#;

/// Variables substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    vars: HashMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Replace every known `{name}` in one pass.
    ///
    /// Unknown placeholders and other braces (such as JSON examples) are
    /// copied through unchanged, and substituted values are never expanded
    /// again.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            match (self.vars.get(name), after[name_len..].starts_with('}')) {
                (Some(value), true) if !name.is_empty() => {
                    out.push_str(value);
                    rest = &after[name_len + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
