use serde::Deserialize;
use tracing::warn;
use wayfinder_core::{detect_language, LanguageGuess, TranslationResult, TravelError};

use crate::llm::{ChatCompletionsClient, CompletionRequest, LlmMessage};
use crate::{ChatModel, Translator};

const DETECT_PROMPT: &str = "You detect the language of short texts. Reply with a JSON object \
holding `language` (ISO 639-1 code) and `confidence` (0-1).";
const TRANSLATE_PROMPT: &str = "You translate assistant replies for travellers. Keep meaning, \
tone, numbering and links intact. Reply with the translated text only.";

/// Language detection and translation. Without a model it detects by
/// script and never rewrites text.
#[derive(Debug, Clone)]
pub struct LanguageService<M = ChatCompletionsClient> {
    model: Option<M>,
    debug_language: bool,
}

#[derive(Debug, Deserialize)]
struct DetectionPayload {
    language: Option<String>,
    confidence: Option<f64>,
}

impl<M: ChatModel> LanguageService<M> {
    pub fn new(model: Option<M>, debug_language: bool) -> Self {
        Self {
            model,
            debug_language,
        }
    }

    pub async fn detect(&self, text: &str) -> LanguageGuess {
        if text.trim().is_empty() {
            return detect_language("");
        }
        let Some(model) = self.model.as_ref() else {
            return detect_language(text);
        };

        let request = CompletionRequest {
            messages: vec![LlmMessage::system(DETECT_PROMPT), LlmMessage::user(text)],
            temperature: 0.0,
            json_object: true,
        };
        match model.complete(request).await.and_then(|raw| parse_detection(&raw)) {
            Ok(guess) => guess,
            Err(err) => {
                warn!(error = %err, "language detection fell back to script heuristic");
                detect_language(text)
            }
        }
    }

    /// `target` of `None` or `"auto"` means the text's own language.
    pub async fn translate(
        &self,
        text: &str,
        target: Option<&str>,
        source: Option<&str>,
    ) -> TranslationResult {
        let detection = self.detect(text).await;
        let source = source.unwrap_or(detection.language.as_str()).to_string();
        let target = match target.map(str::trim) {
            None | Some("") | Some("auto") => detection.language.clone(),
            Some(explicit) => explicit.to_string(),
        };

        let unchanged = |source: String, target: String| TranslationResult {
            translated_text: text.to_string(),
            source_language: source,
            target_language: target,
            confidence: detection.confidence,
            needs_translation: false,
        };

        if source == target {
            return unchanged(source, target);
        }
        let Some(model) = self.model.as_ref() else {
            return unchanged(source, target);
        };

        let request = CompletionRequest {
            messages: vec![
                LlmMessage::system(TRANSLATE_PROMPT),
                LlmMessage::user(format!(
                    "Source language: {source}\nTarget language: {target}\nText: {text}"
                )),
            ],
            temperature: 0.1,
            json_object: false,
        };
        let translated = match model.complete(request).await {
            Ok(translated) => translated.trim().to_string(),
            Err(err) => {
                warn!(error = %err, source = %source, target = %target, "translation failed");
                text.to_string()
            }
        };

        let needs_translation = translated.trim() != text.trim();
        TranslationResult {
            translated_text: translated,
            source_language: source,
            target_language: target,
            confidence: detection.confidence,
            needs_translation,
        }
    }

    /// Makes `response` match the language of `user_text`, or of
    /// `preferred` when the caller already knows it.
    pub async fn consistent_with(
        &self,
        user_text: &str,
        response: &str,
        preferred: Option<&str>,
    ) -> TranslationResult {
        let user_language = match preferred {
            Some(language) => language.to_string(),
            None => self.detect(user_text).await.language,
        };

        let mut translation = self.translate(response, Some(&user_language), None).await;
        if self.debug_language {
            translation.translated_text.push_str(&format!(
                "\n\n[debug] user_language={user_language} target={} needs_translation={}",
                translation.target_language, translation.needs_translation
            ));
        }
        translation
    }
}

impl<M: ChatModel> Translator for LanguageService<M> {
    async fn ensure_language_consistency(
        &self,
        user_text: &str,
        response: &str,
    ) -> Result<TranslationResult, TravelError> {
        Ok(self.consistent_with(user_text, response, None).await)
    }
}

fn parse_detection(raw: &str) -> Result<LanguageGuess, TravelError> {
    let payload: DetectionPayload =
        serde_json::from_str(raw.trim()).map_err(|e| TravelError::parse("language detection", e))?;
    Ok(LanguageGuess {
        language: payload
            .language
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "en".to_string()),
        confidence: payload.confidence.unwrap_or(0.5).clamp(0.0, 1.0) as f32,
    })
}
