use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Loose length target given to the model, in words.
const TARGET_WORDS: u32 = 180;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// A rewritten article: French title and French body.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Rewritten {
    pub title: String,
    pub body: String,
}

pub struct Rewriter {
    client: Client,
    api_key: String,
    model: String,
}

impl Rewriter {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            model,
        }
    }

    /// One rewrite attempt. The caller decides whether to retry based on
    /// its own language check.
    pub async fn rewrite(&self, title: &str, text: &str) -> Result<Rewritten> {
        let system_prompt = format!(
            "Tu es un journaliste francophone. Réécris l'article fourni en français, \
             de façon claire et factuelle, en {} mots environ. \
             Réponds STRICTEMENT en JSON: {{\"title\": \"...\", \"body\": \"...\"}} \
             sans aucun autre texte.",
            TARGET_WORDS
        );

        let content = truncate_chars(text, 10_000);
        let user_message = format!("Titre: {}\n\nArticle:\n{}", title, content);

        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.4,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt,
                },
                Message {
                    role: "user".to_string(),
                    content: user_message,
                },
            ],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Api(format!("API error: {}", error_text)));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Api("empty completion".to_string()))?;

        Ok(parse_rewrite(&content, title))
    }
}

/// Parse the model output permissively: strict JSON first (tolerating code
/// fences), then "first line is the title, the rest is the body". Models
/// drift from output contracts, so this never fails.
pub fn parse_rewrite(content: &str, orig_title: &str) -> Rewritten {
    let trimmed = strip_fences(content.trim());

    if let Ok(parsed) = serde_json::from_str::<Rewritten>(trimmed) {
        if !parsed.body.is_empty() {
            return parsed;
        }
    }

    let mut lines = trimmed.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next().unwrap_or_default().trim();
    let rest = lines.collect::<Vec<_>>().join("\n");

    if rest.is_empty() {
        Rewritten {
            title: orig_title.to_string(),
            body: first.to_string(),
        }
    } else {
        Rewritten {
            title: first
                .trim_start_matches("Titre:")
                .trim_start_matches("Titre :")
                .trim()
                .to_string(),
            body: rest,
        }
    }
}

fn strip_fences(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// No API key: keep the original text, truncated, flagged for manual
/// translation.
pub fn fallback_rewrite(title: &str, text: &str) -> Rewritten {
    Rewritten {
        title: format!("(à traduire) {}", title),
        body: truncate_chars(text, 1200),
    }
}

const FRENCH_FUNCTION_WORDS: &[&str] = &[
    "le", "la", "les", "des", "une", "un", "et", "est", "sont", "dans", "pour", "avec", "sur",
    "qui", "que", "pas", "par", "du", "au", "aux", "cette", "mais",
];

/// Weak French detector: counts common function words in the first 800
/// characters. A proxy for "the model actually translated", nothing more;
/// the importer treats it as a pluggable check.
pub fn looks_french(text: &str) -> bool {
    let sample = truncate_chars(text, 800).to_lowercase();
    let hits = sample
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| FRENCH_FUNCTION_WORDS.contains(w))
        .count();
    hits >= 2
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let out = parse_rewrite(
            r#"{"title": "Un titre", "body": "Le corps du texte."}"#,
            "orig",
        );
        assert_eq!(out.title, "Un titre");
        assert_eq!(out.body, "Le corps du texte.");
    }

    #[test]
    fn parses_fenced_json() {
        let out = parse_rewrite(
            "```json\n{\"title\": \"Un titre\", \"body\": \"Texte.\"}\n```",
            "orig",
        );
        assert_eq!(out.title, "Un titre");
        assert_eq!(out.body, "Texte.");
    }

    #[test]
    fn falls_back_to_first_line_title() {
        let out = parse_rewrite("Titre: Nouvelles du jour\nLe corps.\nSuite du corps.", "orig");
        assert_eq!(out.title, "Nouvelles du jour");
        assert_eq!(out.body, "Le corps.\nSuite du corps.");
    }

    #[test]
    fn single_line_keeps_original_title() {
        let out = parse_rewrite("Juste une phrase.", "Titre d'origine");
        assert_eq!(out.title, "Titre d'origine");
        assert_eq!(out.body, "Juste une phrase.");
    }

    #[test]
    fn looks_french_accepts_french() {
        assert!(looks_french(
            "Le gouvernement a annoncé une réforme qui entrera en vigueur dans les prochains mois."
        ));
    }

    #[test]
    fn looks_french_rejects_english() {
        assert!(!looks_french(
            "The government announced a reform that will come into effect in the coming months."
        ));
    }

    #[test]
    fn fallback_flags_untranslated_text() {
        let out = fallback_rewrite("Breaking News", &"mot ".repeat(1000));
        assert!(out.title.starts_with("(à traduire) "));
        assert!(out.body.chars().count() <= 1200);
    }
}
