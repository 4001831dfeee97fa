//! Provider families
//!
//! The gateway fronts several providers behind one endpoint, and each provider family diverges
//! from the Chat Completions contract in its own way. A family is picked by a case-insensitive
//! substring test on the model identifier.

use std::fmt;

/// A provider-specific behavior profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Speaks the Responses protocol; requests are fully converted
    Codex,
    Gemini,
    Claude,
    Codestral,
    ChatGpt,
}

impl Family {
    /// All families, in precedence order
    pub const ALL: [Family; 5] = [
        Family::Codex,
        Family::Gemini,
        Family::Claude,
        Family::Codestral,
        Family::ChatGpt,
    ];

    /// The lowercase marker searched for in model identifiers
    pub fn marker(self) -> &'static str {
        match self {
            Family::Codex => "codex",
            Family::Gemini => "gemini",
            Family::Claude => "claude",
            Family::Codestral => "codestral",
            Family::ChatGpt => "gpt",
        }
    }

    pub fn matches(self, model: &str) -> bool {
        model.to_lowercase().contains(self.marker())
    }

    /// The highest-precedence family of a model, if any
    pub fn classify(model: Option<&str>) -> Option<Family> {
        Self::matching(model).next()
    }

    /// Every family whose marker appears in the model identifier
    pub fn matching(model: Option<&str>) -> impl Iterator<Item = Family> {
        Self::ALL
            .into_iter()
            .filter(move |family| model.is_some_and(|model| family.matches(model)))
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// How an upstream response must be post-processed, decided once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFix {
    /// Forward the response untouched
    #[default]
    None,
    /// Patch Gemini finish reasons and thinking blocks in the stream
    Gemini,
    /// Patch Claude finish reasons and cached-token accounting in the stream
    Claude,
    /// Convert the Responses protocol back into Chat Completions
    Codex,
    /// Apply both the Gemini and the Claude stream patches
    Composite,
}

impl ResponseFix {
    /// Decide the fix from the matched families and whether the request carried a thinking block.
    pub fn decide(families: &[Family], had_thinking: bool) -> Self {
        if families.contains(&Family::Codex) {
            return ResponseFix::Codex;
        }
        let gemini = families.contains(&Family::Gemini);
        let claude = families.contains(&Family::Claude);
        match (gemini, claude) {
            (true, true) => ResponseFix::Composite,
            (true, false) => ResponseFix::Gemini,
            (false, true) => ResponseFix::Claude,
            (false, false) if had_thinking => ResponseFix::Composite,
            (false, false) => ResponseFix::None,
        }
    }

    pub fn patches_gemini(self) -> bool {
        matches!(self, ResponseFix::Gemini | ResponseFix::Composite)
    }

    pub fn patches_claude(self) -> bool {
        matches!(self, ResponseFix::Claude | ResponseFix::Composite)
    }
}
