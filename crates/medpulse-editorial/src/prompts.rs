//! Instruction text for the curation and authoring calls.

use std::fmt::Write;

use medpulse_common::{Candidate, Category};

pub const CURATOR_SYSTEM: &str = "You are the editor-in-chief of a popular-science health site. \
Your goal is to find the medical research most likely to get readers talking.";

pub const AUTHOR_SYSTEM: &str = "You are a science writer who turns complex medical research \
into engaging, accurate stories for a general audience. You always answer with strict JSON.";

/// Lists every candidate with an index and asks for the `k` best indices.
pub fn curation_prompt(candidates: &[Candidate], k: usize, excerpt_chars: usize) -> String {
    let mut listing = String::new();
    for (index, c) in candidates.iter().enumerate() {
        let _ = write!(
            listing,
            "[Index: {index}] [Source: {}] [Citations: {}] Title: {}\nAbstract: {}...\n\n",
            c.source.as_str(),
            c.citation_count,
            c.title,
            excerpt(&c.abstract_text, excerpt_chars),
        );
    }

    format!(
        "From the candidate papers below, choose the {k} that are the most interesting, the \
most relevant to everyday life and the most likely to spark discussion.\n\n\
The list mixes PubMed (newest publications) and Semantic Scholar (highly cited) papers. \
Pay particular attention to papers with higher citation counts: the field has already \
noticed them and they are usually more newsworthy.\n\n\
Selection rules:\n\
1. Everyday relevance (high priority): address readers' pain points such as sleep, \
ageing, mood and diet.\n\
2. Impact and novelty: prefer highly cited breakthroughs or findings that overturn \
common beliefs.\n\
3. Avoid: topics that are overly technical or purely mechanistic.\n\n\
Candidates:\n{listing}\
Reply with ONLY a JSON array of the {k} chosen indices, for example [0, 5, 12]. No other text."
    )
}

/// Writing-style rules plus the paper itself.
pub fn authoring_prompt(candidate: &Candidate, forced: Option<Category>) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| format!("{}/{}", c.as_str(), c.label_zh()))
        .collect::<Vec<_>>()
        .join(", ");

    let category_rule = match forced {
        Some(cat) => format!(
            "Use the category \"{}\" (category_zh \"{}\").",
            cat.as_str(),
            cat.label_zh()
        ),
        None => format!("Choose exactly one category from [{categories}]."),
    };

    format!(
        "Write an engaging news report based on the paper below.\n\n\
Paper:\n\
Source: {source}\n\
Citations: {citations}\n\
Title: {title}\n\
Abstract: {abstract_text}\n\n\
Writing rules:\n\
1. title_zh: a catchy Traditional Chinese headline, no academic tone. Use a question, a \
strong contrast or the surprising finding. title_en: the same headline in English.\n\
2. summary: 2-3 sentences in Traditional Chinese giving the core idea, like a movie trailer.\n\
3. key_points: 3-4 practical takeaways as an array of strings.\n\
4. content_zh: the Traditional Chinese body in Markdown. Structure: everyday pain point -> \
research findings -> core conclusion -> outlook. Professional but friendly. You MUST mark \
the key facts with Markdown bold (**text**). content_en: the English body with the same \
structure and bold highlights.\n\
5. {category_rule}\n\n\
Return strict JSON with exactly these fields: title_zh, title_en, summary, key_points \
(array), content_zh (Markdown), content_en (Markdown), category, category_zh, disclaimer.",
        source = candidate.source.as_str(),
        citations = candidate.citation_count,
        title = candidate.title,
        abstract_text = candidate.abstract_text,
    )
}

/// The first `max_chars` characters, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
