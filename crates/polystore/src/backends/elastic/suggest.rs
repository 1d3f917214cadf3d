//! Spell-correction suggesters (term and phrase).

use serde_json::{json, Value as Json};

use crate::error::StoreResult;
use crate::schema::{EntityDescriptor, Field};

use super::client::Elastic;

/// Which suggester runs on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuggestKind {
    Term,
    Phrase,
}

/// Builds and executes a suggest request against one entity's index.
///
/// Term suggestions correct single words, phrase suggestions correct whole
/// inputs and can collate candidates against the live index so that only
/// phrases with actual matches survive.
#[derive(Debug, Clone)]
pub struct SuggestBuilder {
    kind: SuggestKind,
    field: Field,
    text: String,
    size: usize,
    suggest_mode: Option<String>,
    highlight: Option<(String, String)>,
    collate: Option<(Json, bool)>,
}

impl SuggestBuilder {
    /// Starts a term suggester on the given field.
    pub fn term(field: Field) -> Self {
        Self::new(SuggestKind::Term, field)
    }

    /// Starts a phrase suggester on the given field.
    pub fn phrase(field: Field) -> Self {
        Self::new(SuggestKind::Phrase, field)
    }

    fn new(kind: SuggestKind, field: Field) -> Self {
        SuggestBuilder {
            kind,
            field,
            text: String::new(),
            size: 5,
            suggest_mode: None,
            highlight: None,
            collate: None,
        }
    }

    /// The input text to correct.
    pub fn on(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Maximum number of suggestions (default 5).
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Suggest mode for term suggesters (`missing`, `popular`, `always`).
    pub fn suggest_mode(mut self, mode: impl Into<String>) -> Self {
        self.suggest_mode = Some(mode.into());
        self
    }

    /// Wraps changed tokens of phrase suggestions in the given tags.
    pub fn highlight(mut self, pre_tag: impl Into<String>, post_tag: impl Into<String>) -> Self {
        self.highlight = Some((pre_tag.into(), post_tag.into()));
        self
    }

    /// Collates phrase candidates against the index with the given query
    /// template (`{{suggestion}}` is substituted per candidate). With `prune`
    /// set, non-matching candidates are dropped from the response.
    pub fn collate(mut self, query: Json, prune: bool) -> Self {
        self.collate = Some((query, prune));
        self
    }

    /// Runs the suggester against the entity's index.
    pub async fn execute(
        self,
        elastic: &Elastic,
        descriptor: &EntityDescriptor,
    ) -> StoreResult<Vec<SuggestOption>> {
        let index = elastic.index_name(descriptor.relation_name());
        let body = json!({
            "size": 0,
            "suggest": { "suggestions": self.build() }
        });

        let response = elastic.search(&index, body).await?;
        let mut options = Vec::new();
        if let Some(entries) = response["suggest"]["suggestions"].as_array() {
            for entry in entries {
                if let Some(raw) = entry["options"].as_array() {
                    for option in raw {
                        options.push(SuggestOption::from_json(option));
                    }
                }
            }
        }
        Ok(options)
    }

    /// The suggester body, without the surrounding suggest name.
    fn build(&self) -> Json {
        let mut inner = json!({
            "field": self.field.to_string(),
            "size": self.size
        });
        match self.kind {
            SuggestKind::Term => {
                if let Some(mode) = &self.suggest_mode {
                    inner["suggest_mode"] = json!(mode);
                }
                json!({ "text": self.text, "term": inner })
            }
            SuggestKind::Phrase => {
                if let Some((pre, post)) = &self.highlight {
                    inner["highlight"] = json!({ "pre_tag": pre, "post_tag": post });
                }
                if let Some((query, prune)) = &self.collate {
                    inner["collate"] = json!({
                        "query": { "source": query },
                        "prune": prune
                    });
                }
                json!({ "text": self.text, "phrase": inner })
            }
        }
    }
}

/// One suggestion candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestOption {
    /// The suggested text.
    pub text: String,
    /// Suggester score, higher is better.
    pub score: f64,
    /// Document frequency of the suggestion (term suggesters only).
    pub freq: Option<u64>,
    /// Highlighted rendition, when highlighting was requested.
    pub highlighted: Option<String>,
    /// Whether the collate query matched, when collation without pruning was
    /// requested.
    pub collate_match: Option<bool>,
}

impl SuggestOption {
    fn from_json(option: &Json) -> Self {
        SuggestOption {
            text: option["text"].as_str().unwrap_or_default().to_string(),
            score: option["score"].as_f64().unwrap_or_default(),
            freq: option["freq"].as_u64(),
            highlighted: option["highlighted"].as_str().map(str::to_string),
            collate_match: option["collate_match"].as_bool(),
        }
    }
}
