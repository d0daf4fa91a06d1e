//! FAQ lookup.
//!
//! A FAQ matches when the message contains its whole question, or at least
//! one of its keywords. Whole-question matches win; otherwise the FAQ with
//! the most keyword hits wins, ties going to the lower id.

use crate::content::Faq;
use crate::helpers::normalize;

#[derive(Debug, Clone, PartialEq)]
pub struct FaqMatch<'a> {
    pub faq: &'a Faq,
    pub matched_keywords: Vec<String>,
    pub question_match: bool,
}

impl FaqMatch<'_> {
    fn score(&self) -> (bool, usize) {
        (self.question_match, self.matched_keywords.len())
    }
}

/// Best active FAQ for `message`, if any
pub fn match_faq<'a>(message: &str, faqs: &'a [Faq]) -> Option<FaqMatch<'a>> {
    let text = normalize(message);
    let mut best: Option<FaqMatch<'a>> = None;

    for faq in faqs.iter().filter(|f| f.is_active) {
        let question = normalize(&faq.question);
        let question_match = !question.is_empty() && text.contains(&question);
        let matched_keywords: Vec<String> = faq
            .keywords
            .iter()
            .filter(|kw| {
                let kw = normalize(kw);
                !kw.is_empty() && text.contains(&kw)
            })
            .cloned()
            .collect();

        if !question_match && matched_keywords.is_empty() {
            continue;
        }

        let candidate = FaqMatch {
            faq,
            matched_keywords,
            question_match,
        };
        let better = match &best {
            None => true,
            Some(current) => {
                candidate.score() > current.score()
                    || (candidate.score() == current.score() && faq.id < current.faq.id)
            }
        };
        if better {
            best = Some(candidate);
        }
    }

    best
}
