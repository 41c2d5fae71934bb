//! Prompts for the chunk relevance judge.

/// Collection of prompts used by the judge.
pub struct Prompts;

impl Prompts {
    /// System prompt describing the grading scale.
    ///
    /// The scale is inverted: 1 is the best score and 100 the worst.
    pub fn chunk_assessor_system() -> &'static str {
        r#"You are an expert in evaluating retrieval quality for RAG (Retrieval-Augmented Generation) systems.

Your task is to rate how useful each text fragment is for answering the user's query.

SCORING SCALE (1-100, LOWER IS BETTER):
- 1-20: Highly relevant - contains the direct answer or the key information needed
- 21-40: Relevant - provides useful context or supporting information
- 41-60: Partially relevant - indirectly related, may provide general background
- 61-80: Marginally relevant - barely related to the query
- 81-100: Irrelevant - useless or unrelated to answering the query

GUIDELINES:
1. Do NOT answer the query; only assess the quality of the retrieved information
2. Consider: does the fragment help answer the query? How directly? How completely?
3. Grade all fragments consistently against each other
4. Give a short, specific justification (1-2 sentences) for each score
5. Lower scores are better (1 is the best, 100 is the worst)"#
    }

    /// User prompt template. Placeholders: `{query}`, `{chunks}`.
    pub fn chunk_assessor_user() -> &'static str {
        r#"User query: {query}

Text fragments to assess:

{chunks}

Assess every fragment. Respond in this JSON format:
{
    "scores": [
        {
            "config_name": "<configuration name exactly as given>",
            "score": <integer 1-100, lower is better>,
            "reasoning": "<1-2 sentences, at most 1000 characters>"
        }
    ]
}

Include every configuration exactly once. Respond with only the JSON, no other text."#
    }

    /// Substitute `{name}` placeholders in one pass. Substituted values are
    /// never scanned again, so a value containing a placeholder stays as is.
    pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        loop {
            let next = values
                .iter()
                .filter(|(placeholder, _)| !placeholder.is_empty())
                .filter_map(|(placeholder, value)| {
                    rest.find(placeholder).map(|at| (at, *placeholder, *value))
                })
                .min_by_key(|(at, _, _)| *at);

            match next {
                Some((at, placeholder, value)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}
