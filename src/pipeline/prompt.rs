//! Prompt builder — format templates and the extraction instruction.
//!
//! Templates use the two-character sequence `\n` (backslash, `n`) rather than
//! real newlines; the generator is told to reproduce them verbatim so that
//! preview truncation can split on them.

use std::time::Duration;

use crate::llm::{ChatMessage, CompletionRequest, LlmConfig};
use crate::tasks::OutputFormat;

/// Literal newline escape used in templates and replies.
pub const ESCAPED_NEWLINE: &str = "\\n";

/// Data type that switches a request to the image-aware profile.
pub const IMAGE_DATA_TYPE: &str = "Image URL";

/// Timeout for the primary extraction call.
pub const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(80);

const SYSTEM_PROMPT: &str = "You are a datascraper that formats data with explicit \\n characters \
                             for newlines. Never remove these characters.";

/// Number of template objects in a JSON template.
const JSON_TEMPLATE_OBJECTS: usize = 3;

/// Model, budget and match count for one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationProfile {
    pub model: String,
    pub max_tokens: u32,
    pub target_count: u32,
}

/// The fully assembled extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionPrompt {
    pub format_template: String,
    pub profile: GenerationProfile,
    pub system: String,
    pub user: String,
}

impl ExtractionPrompt {
    pub fn into_request(self) -> CompletionRequest {
        CompletionRequest::new(vec![
            ChatMessage::system(self.system),
            ChatMessage::user(self.user),
        ])
        .with_model(self.profile.model)
        .with_max_tokens(self.profile.max_tokens)
        .with_timeout(EXTRACTION_TIMEOUT)
    }
}

/// Input to the prompt builder.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub task_name: &'a str,
    pub keywords: &'a [String],
    pub data_types: &'a [String],
    pub output_format: OutputFormat,
    pub cleaned_text: &'a str,
    pub images: &'a [String],
}

/// Builds format templates and extraction instructions.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    primary_model: String,
    light_model: String,
}

impl PromptBuilder {
    pub fn new(primary_model: impl Into<String>, light_model: impl Into<String>) -> Self {
        Self {
            primary_model: primary_model.into(),
            light_model: light_model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(&config.primary_model, &config.light_model)
    }

    /// Image-aware requests get the stronger model, more tokens and fewer matches.
    pub fn profile(&self, data_types: &[String]) -> GenerationProfile {
        if wants_images(data_types) {
            GenerationProfile {
                model: self.primary_model.clone(),
                max_tokens: 8000,
                target_count: 7,
            }
        } else {
            GenerationProfile {
                model: self.light_model.clone(),
                max_tokens: 6000,
                target_count: 20,
            }
        }
    }

    pub fn build(&self, input: PromptInput<'_>) -> ExtractionPrompt {
        let format_template = format_template(input.output_format, input.keywords);
        let profile = self.profile(input.data_types);
        let format = input.output_format.name();

        let mut user = format!(
            "Task Name: {task_name}\n\
             The task name is chosen by the user and may be unrelated to the keywords and data.\n\
             From the data below, extract {count} matches for keywords: {keywords:?} in matching {data_types:?} order.\n\
             Format the output exactly as shown below, including all \\n characters for newlines:\n\n\
             {format_template}\n\n\
             Use the {format} format and include all \\n characters exactly as shown.\n\
             In your response, do not include any other text, including the word \"{format}:\" and '''.\n\
             Only if there is no relevant data, return 'No data found'.\n\
             Data: {data}",
            task_name = input.task_name,
            count = profile.target_count,
            keywords = input.keywords,
            data_types = input.data_types,
            data = input.cleaned_text,
        );

        if wants_images(input.data_types) {
            user.push_str("\nImage URLs: ");
            user.push_str(&input.images.join("\n"));
        }

        ExtractionPrompt {
            format_template,
            profile,
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }
}

fn wants_images(data_types: &[String]) -> bool {
    data_types.iter().any(|t| t == IMAGE_DATA_TYPE)
}

/// The reply shape the generator is asked to reproduce.
pub fn format_template(format: OutputFormat, keywords: &[String]) -> String {
    let nl = ESCAPED_NEWLINE;
    match format {
        OutputFormat::Json => {
            let objects: Vec<String> = (1..=JSON_TEMPLATE_OBJECTS)
                .map(|i| {
                    let fields: Vec<String> = keywords
                        .iter()
                        .map(|kw| format!("        \"{kw}\": \"[value{i}]\""))
                        .collect();
                    format!("    {{{nl}{}{nl}    }}", fields.join(&format!(",{nl}")))
                })
                .collect();
            format!("{{{nl}{}{nl}}}", objects.join(&format!(",{nl}")))
        }
        OutputFormat::Csv => {
            format!("{}{nl}{}{nl}", keywords.join(","), placeholders(keywords.len()).join(","))
        }
        OutputFormat::Markdown => format!(
            "| {} |{nl}{}|{nl}| {} |{nl}",
            keywords.join(" | "),
            "|------".repeat(keywords.len()),
            placeholders(keywords.len()).join(" | "),
        ),
    }
}

fn placeholders(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("[value{i}]")).collect()
}
