use super::{GenerationOptions, GenerationRequest, LLMConfig, LLM};
use crate::models::SourceKind;
use crate::places::{PlaceInfo, PlaceSearch};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Value of the first `LABEL: value` line, ignoring markdown emphasis and
/// unfilled `[placeholder]` answers.
fn line_value(label: &str, text: &str) -> Option<String> {
    text.lines()
        .map(|line| line.trim().trim_start_matches('*'))
        .find_map(|line| {
            let (head, rest) = line.split_once(':')?;
            head.trim_end_matches('*')
                .eq_ignore_ascii_case(label)
                .then(|| rest.trim().trim_start_matches('*').trim().to_string())
        })
        .filter(|value| !value.is_empty() && !value.starts_with('['))
}

/// Place lookup answered by the generative model with map and search grounding.
pub struct GroundedPlaceSearch {
    llm: Arc<dyn LLM>,
    config: LLMConfig,
}

impl GroundedPlaceSearch {
    pub fn new(llm: Arc<dyn LLM>, config: LLMConfig) -> Self {
        Self { llm, config }
    }
}

/// Build a place record from a grounded answer and its citations.
pub fn parse_grounded_answer(content: &str, sources: Vec<crate::models::GroundingSource>) -> PlaceInfo {
    let maps_url = sources
        .iter()
        .find(|source| source.kind == SourceKind::Maps)
        .map(|source| source.uri.clone());

    PlaceInfo {
        address: line_value("ADDRESS", content),
        website: line_value("WEBSITE", content),
        maps_url,
        grounding_sources: sources,
        ..PlaceInfo::default()
    }
}

#[async_trait]
impl PlaceSearch for GroundedPlaceSearch {
    async fn text_search(&self, query: &str) -> Result<PlaceInfo> {
        let request = GenerationRequest {
            system_instruction: None,
            user_text: format!(
                "Find detailed information for the place called \"{}\".\n\n\
                 Answer with exactly these lines:\n\
                 ADDRESS: [Address]\n\
                 WEBSITE: [URL]",
                query
            ),
            options: GenerationOptions::from_config(&self.config).grounded(),
        };

        let response = self.llm.generate(request).await?;
        Ok(parse_grounded_answer(&response.content, response.grounding_sources))
    }

    fn backend_name(&self) -> &'static str {
        "grounded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMProvider, LLMResponse};
    use crate::models::GroundingSource;

    #[test]
    fn test_parse_lines_and_sources() {
        let content = "Here is what I found.\nADDRESS: 68 Fukakusa Yabunouchicho, Kyoto\n**WEBSITE:** https://inari.jp\n";
        let sources = vec![
            GroundingSource { title: "Web".into(), uri: "https://example.com".into(), kind: SourceKind::Search },
            GroundingSource { title: "Google Maps".into(), uri: "https://maps.google.com/?cid=9".into(), kind: SourceKind::Maps },
        ];
        let info = parse_grounded_answer(content, sources);
        assert_eq!(info.address.as_deref(), Some("68 Fukakusa Yabunouchicho, Kyoto"));
        assert_eq!(info.website.as_deref(), Some("https://inari.jp"));
        assert_eq!(info.maps_url.as_deref(), Some("https://maps.google.com/?cid=9"));
        assert_eq!(info.grounding_sources.len(), 2);
        assert_eq!(info.lat, None);
    }

    #[test]
    fn test_placeholder_lines_are_ignored() {
        let info = parse_grounded_answer("ADDRESS: [Address]\nWEBSITE: [URL]", vec![]);
        assert!(info.is_empty());
    }

    struct Grounded;

    #[async_trait]
    impl LLM for Grounded {
        async fn generate(&self, request: GenerationRequest) -> crate::llm::Result<LLMResponse> {
            assert!(request.options.grounding);
            assert!(request.user_text.contains("\"Nishiki Market\""));
            Ok(LLMResponse {
                content: "ADDRESS: Nakagyo Ward, Kyoto".into(),
                ..Default::default()
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::Gemini
        }
    }

    #[tokio::test]
    async fn test_grounded_search() {
        let search = GroundedPlaceSearch::new(Arc::new(Grounded), LLMConfig::default());
        let info = search.text_search("Nishiki Market").await.unwrap();
        assert_eq!(info.address.as_deref(), Some("Nakagyo Ward, Kyoto"));
        assert_eq!(search.backend_name(), "grounded");
    }
}
