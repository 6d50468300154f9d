use std::sync::Arc;

use tracing::debug;

use crate::completion::{CompletionRequest, CompletionService, Message, Part, Sampling};
use crate::document::{PAGE_IMAGE_MIME, PageImage};
use crate::error::{DescriptionServiceError, ServiceError};

/// System instruction enforcing the `<title>: <content>` convention.
pub const SLIDE_EXTRACTOR_INSTRUCTION: &str = "You are a ppt slide extractor. You will be given a ppt slide and you will need to extract all the information from the slide.
Do not miss any information from the slide and do not add anything that is not visible on it.
Always provide a response as a text formatted as below.
<Slide_Title>: <Information about the slide>";

/// Per-page request accompanying the image.
pub const EXTRACT_QUERY: &str = "Extract all the information from the slide.";

/// Turns a page image into a text description via a vision completion call.
#[derive(Clone)]
pub struct PageDescriber {
    service: Arc<dyn CompletionService>,
    model: String,
}

impl PageDescriber {
    pub fn new(service: Arc<dyn CompletionService>, model: &str) -> Self {
        Self {
            service,
            model: model.to_string(),
        }
    }

    /// Describe one page. Sampling is deterministic and tools are disabled.
    pub async fn describe(
        &self,
        image: &PageImage,
        instruction: &str,
    ) -> Result<String, DescriptionServiceError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            system_instruction: Some(SLIDE_EXTRACTOR_INSTRUCTION.to_string()),
            messages: vec![Message::user(vec![
                Part::Text("slide image".to_string()),
                Part::InlineImage {
                    mime_type: PAGE_IMAGE_MIME.to_string(),
                    data: image.to_base64(),
                },
                Part::Text(instruction.to_string()),
            ])],
            tools: Vec::new(),
            sampling: Sampling::deterministic(),
        };

        let page = image.page_index;
        let response = self
            .service
            .complete(&request)
            .await
            .map_err(|source| DescriptionServiceError { page, source })?;
        let text = response.joined_text();
        if text.trim().is_empty() {
            return Err(DescriptionServiceError {
                page,
                source: ServiceError::Malformed("empty page description".to_string()),
            });
        }
        debug!(page, chars = text.len(), "Described page");
        Ok(normalize_description(page, &text))
    }
}

/// Trim the description and make sure it starts with a `title:` prefix.
/// Descriptions lacking one get `Slide <n>: ` with a one-based page number.
pub fn normalize_description(page_index: usize, text: &str) -> String {
    let text = text.trim();
    let has_title = text
        .lines()
        .next()
        .and_then(|line| line.split_once(':'))
        .is_some_and(|(title, _)| {
            let title = title.trim();
            !title.is_empty() && title.len() <= 120
        });
    if has_title {
        text.to_string()
    } else {
        format!("Slide {}: {text}", page_index + 1)
    }
}
